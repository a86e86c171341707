use client::creatures::{
    COLLECTION_REFRESH_INTERVAL, CREATURE_REFRESH_INTERVAL,
    collection_creatures, creature_detail, creature_page, owner_stats,
};
use client::time::TimeSource;
use payloads::GameClient;
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn creature_json(n: usize) -> Value {
    json!({
        "id": format!("c-{n}"),
        "name": format!("creature {n}"),
        "owner_key": "owner-1",
        "status": if n % 10 == 0 { "dead" } else { "alive" },
        "level": 1
    })
}

/// Page `page` of a 250-creature listing.
fn listing_page(page: usize) -> Value {
    let start = (page - 1) * 100;
    let end = (start + 100).min(250);
    json!({
        "creatures": (start..end).map(creature_json).collect::<Vec<_>>(),
        "pagination": {
            "page": page,
            "limit": 100,
            "total": 250,
            "has_next_page": end < 250
        },
        "summary": {"total": 250, "alive": 225, "dead": 25}
    })
}

#[tokio::test]
async fn collection_fetches_every_page() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    for page in 1..=3 {
        Mock::given(method("GET"))
            .and(path("/creatures"))
            .and(query_param("owner_key", "owner-1"))
            .and(query_param("page", page.to_string()))
            .and(query_param("limit", "100"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(listing_page(page)),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let mut fetch =
        collection_creatures(GameClient::new(server.uri()), TimeSource::new());
    assert_eq!(fetch.interval(), Some(COLLECTION_REFRESH_INTERVAL));
    let mut rx = fetch.subscribe();

    fetch.activate(Some("owner-1"));
    let state = rx.wait_for(|s| !s.is_in_flight()).await?.clone();

    let collection = state.data.expect("collection loaded");
    assert_eq!(collection.items.len(), 250);
    assert_eq!(collection.items[0].id.0, "c-0");
    assert_eq!(collection.items[249].id.0, "c-249");
    assert_eq!(collection.summary.total, 250);
    assert_eq!(state.error, None);
    Ok(())
}

#[tokio::test]
async fn failed_page_reports_collection_error() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/creatures"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_page(1)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/creatures"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut fetch =
        collection_creatures(GameClient::new(server.uri()), TimeSource::new());
    let mut rx = fetch.subscribe();

    fetch.activate(Some("owner-1"));
    let state = rx.wait_for(|s| !s.is_in_flight()).await?.clone();

    // an empty 500 body carries no message of its own
    assert_eq!(state.error.as_deref(), Some("Failed to load collection"));
    assert_eq!(state.data, None);
    Ok(())
}

#[tokio::test]
async fn detail_and_stats_refresh_every_minute() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/creatures/c-7"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(creature_json(7)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/creatures/stats"))
        .and(query_param("owner_key", "owner-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "alive": 5, "dead": 1, "total": 6
        })))
        .mount(&server)
        .await;

    let client = GameClient::new(server.uri());
    let mut detail = creature_detail(client.clone(), TimeSource::new());
    let mut stats = owner_stats(client, TimeSource::new());
    assert_eq!(detail.interval(), Some(CREATURE_REFRESH_INTERVAL));
    assert_eq!(stats.interval(), Some(CREATURE_REFRESH_INTERVAL));

    let mut detail_rx = detail.subscribe();
    let mut stats_rx = stats.subscribe();
    detail.activate(Some("c-7"));
    stats.activate(Some("owner-1"));

    let creature = detail_rx
        .wait_for(|s| s.data.is_some())
        .await?
        .data
        .clone()
        .unwrap();
    assert_eq!(creature.name, "creature 7");
    assert!(creature.is_alive());

    let counters = stats_rx
        .wait_for(|s| s.data.is_some())
        .await?
        .data
        .unwrap();
    assert_eq!(counters.alive, 5);
    assert_eq!(counters.total, 6);
    Ok(())
}

#[tokio::test]
async fn missing_creature_keeps_api_message() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/creatures/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not found"))
        .mount(&server)
        .await;

    let mut detail =
        creature_detail(GameClient::new(server.uri()), TimeSource::new());
    let mut rx = detail.subscribe();
    detail.activate(Some("gone"));

    let state = rx.wait_for(|s| s.error.is_some()).await?.clone();
    assert_eq!(state.error.as_deref(), Some("Not found"));
    assert!(!state.is_in_flight());
    Ok(())
}

#[tokio::test]
async fn page_fetch_has_no_background_refresh() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/creatures"))
        .and(query_param("page", "2"))
        .and(query_param("limit", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "creatures": [creature_json(25)],
            "pagination": {
                "page": 2, "limit": 25, "total": 26, "has_next_page": false
            }
        })))
        .expect(2)
        .mount(&server)
        .await;

    let mut page =
        creature_page(GameClient::new(server.uri()), TimeSource::new(), 2, 25);
    assert_eq!(page.interval(), None);
    let mut rx = page.subscribe();

    page.activate(Some("owner-1"));
    rx.wait_for(|s| s.data.is_some()).await?;
    assert!(page.refetch());
    rx.wait_for(|s| !s.is_in_flight()).await?;

    let list = page.state().data.unwrap();
    assert_eq!(list.creatures.len(), 1);
    assert_eq!(list.summary.total, 0);
    Ok(())
}
