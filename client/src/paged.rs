//! Accumulating every page of a paginated list endpoint.

use std::fmt::Display;
use std::future::Future;

use crate::liveness::Liveness;

/// One page as returned by a list endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T, S> {
    pub items: Vec<T>,
    pub summary: S,
    pub has_next_page: bool,
    /// Size of the whole listing, when the endpoint reports one.
    pub total: Option<u64>,
}

/// Every item of a listing, with the summary reported by its first page.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<T, S> {
    pub items: Vec<T>,
    pub summary: S,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchAllError<E: Display> {
    /// The consumer went away between pages.
    #[error("Fetch cancelled")]
    Cancelled,
    #[error("{error}")]
    Page { page: u32, error: E },
}

/// Request pages `1, 2, ...` of `page_size` items until one reports no next
/// page. An empty page, or reaching the total the first page reported, also
/// ends the listing, so a server that always claims another page cannot
/// keep the loop going.
///
/// The liveness is checked before every request, so a consumer torn down
/// mid-loop stops further requests. Any failed page fails the whole call and
/// the pages fetched so far are dropped.
pub async fn fetch_all_pages<T, S, E, F, Fut>(
    liveness: &Liveness,
    page_size: u32,
    mut fetch_page: F,
) -> Result<Collection<T, S>, FetchAllError<E>>
where
    E: Display,
    F: FnMut(u32, u32) -> Fut,
    Fut: Future<Output = Result<Page<T, S>, E>>,
{
    let first = fetch_one(liveness, &mut fetch_page, 1, page_size).await?;
    // later pages repeat or only partially report the summary
    let summary = first.summary;
    let total = first.total;
    let short_of_total =
        |count: usize| total.is_none_or(|total| (count as u64) < total);
    let mut items = first.items;
    let mut has_next_page = first.has_next_page && !items.is_empty();
    let mut page = 1;

    while has_next_page && short_of_total(items.len()) {
        page += 1;
        let fetched =
            fetch_one(liveness, &mut fetch_page, page, page_size).await?;
        has_next_page = fetched.has_next_page && !fetched.items.is_empty();
        items.extend(fetched.items);
    }

    Ok(Collection { items, summary })
}

async fn fetch_one<T, S, E, F, Fut>(
    liveness: &Liveness,
    fetch_page: &mut F,
    page: u32,
    page_size: u32,
) -> Result<Page<T, S>, FetchAllError<E>>
where
    E: Display,
    F: FnMut(u32, u32) -> Fut,
    Fut: Future<Output = Result<Page<T, S>, E>>,
{
    if !liveness.is_alive() {
        tracing::debug!(page, "fetch-all cancelled");
        return Err(FetchAllError::Cancelled);
    }
    let fetched = fetch_page(page, page_size)
        .await
        .map_err(|error| FetchAllError::Page { page, error })?;
    tracing::debug!(page, count = fetched.items.len(), "fetched page");
    Ok(fetched)
}
