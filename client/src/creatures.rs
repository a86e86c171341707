//! Fetch controllers for the creature views of the dashboard.

use payloads::responses::{
    Creature, CreatureList, CreatureStats, CreatureSummary,
};
use payloads::{CreatureId, FETCH_ALL_PAGE_SIZE, GameClient, OwnerKey};
use std::time::Duration;

use crate::paged::{Collection, Page, fetch_all_pages};
use crate::poll::{FetchRequest, PollingFetch};
use crate::time::TimeSource;

pub const CREATURE_REFRESH_INTERVAL: Duration = Duration::from_secs(60);
pub const COLLECTION_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub type CreatureCollection = Collection<Creature, CreatureSummary>;

impl From<CreatureList> for Page<Creature, CreatureSummary> {
    fn from(list: CreatureList) -> Self {
        Page {
            items: list.creatures,
            summary: list.summary,
            has_next_page: list.pagination.has_next_page,
            total: Some(list.pagination.total),
        }
    }
}

/// A single creature, keyed by creature id.
pub fn creature_detail(
    client: GameClient,
    time_source: TimeSource,
) -> PollingFetch<Creature> {
    PollingFetch::builder(move |request: FetchRequest| {
        let client = client.clone();
        async move {
            client
                .creature(&CreatureId(request.key))
                .await
                .map_err(|e| e.to_string())
        }
    })
    .every(CREATURE_REFRESH_INTERVAL)
    .fallback_error("Failed to load creature")
    .time_source(time_source)
    .build()
}

/// Alive/dead counters for an owner, keyed by owner key.
pub fn owner_stats(
    client: GameClient,
    time_source: TimeSource,
) -> PollingFetch<CreatureStats> {
    PollingFetch::builder(move |request: FetchRequest| {
        let client = client.clone();
        async move {
            client
                .creature_stats(&OwnerKey(request.key))
                .await
                .map_err(|e| e.to_string())
        }
    })
    .every(CREATURE_REFRESH_INTERVAL)
    .fallback_error("Failed to load creature stats")
    .time_source(time_source)
    .build()
}

/// One page of an owner's creatures, keyed by owner key.
///
/// Pagination controls change pages by building a new controller; there is
/// no background refresh.
pub fn creature_page(
    client: GameClient,
    time_source: TimeSource,
    page: u32,
    limit: u32,
) -> PollingFetch<CreatureList> {
    PollingFetch::builder(move |request: FetchRequest| {
        let client = client.clone();
        async move {
            client
                .list_creatures(&OwnerKey(request.key), page.max(1), limit)
                .await
                .map_err(|e| e.to_string())
        }
    })
    .fallback_error("Failed to load creatures")
    .time_source(time_source)
    .build()
}

/// Every creature an owner has, keyed by owner key.
pub fn collection_creatures(
    client: GameClient,
    time_source: TimeSource,
) -> PollingFetch<CreatureCollection> {
    PollingFetch::builder(move |request: FetchRequest| {
        let client = client.clone();
        async move {
            let owner_key = OwnerKey(request.key);
            let (client, owner_key) = (&client, &owner_key);
            fetch_all_pages(
                &request.liveness,
                FETCH_ALL_PAGE_SIZE,
                |page, limit| async move {
                    client
                        .list_creatures(owner_key, page, limit)
                        .await
                        .map(Page::<Creature, CreatureSummary>::from)
                },
            )
            .await
            .map_err(|e| e.to_string())
        }
    })
    .every(COLLECTION_REFRESH_INTERVAL)
    .fallback_error("Failed to load collection")
    .time_source(time_source)
    .build()
}
