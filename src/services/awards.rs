// src/services/awards.rs
use log::{error, info};

use crate::error::FetchError;
use crate::models::Award;
use crate::services::usaspending::{SearchFilters, SpendingApi};

/// Largest page the award search accepts.
pub const PAGE_SIZE: u32 = 100;

/// Walk the award search page by page until a short or empty page.
///
/// A failed page ends the walk; pages already fetched are kept and returned.
pub async fn fetch_all_awards(api: &dyn SpendingApi, filters: &SearchFilters) -> Vec<Award> {
    paginate(api, filters, 1, Vec::new()).await
}

/// Like `fetch_all_awards`, but a failure on the first page is an error
/// instead of an empty list.
pub async fn fetch_all_awards_strict(
    api: &dyn SpendingApi,
    filters: &SearchFilters,
) -> Result<Vec<Award>, FetchError> {
    let first = api.awards_page(filters, 1, PAGE_SIZE).await?.results;
    info!("Awards page 1: {} awards", first.len());
    if first.len() < PAGE_SIZE as usize {
        return Ok(first);
    }
    Ok(paginate(api, filters, 2, first).await)
}

async fn paginate(
    api: &dyn SpendingApi,
    filters: &SearchFilters,
    mut page: u32,
    mut awards: Vec<Award>,
) -> Vec<Award> {
    loop {
        match api.awards_page(filters, page, PAGE_SIZE).await {
            Ok(response) => {
                let count = response.results.len();
                awards.extend(response.results);
                info!("Awards page {}: {} awards, {} total", page, count, awards.len());

                if count < PAGE_SIZE as usize {
                    break;
                }
                page += 1;
            }
            Err(e) => {
                error!(
                    "Failed to fetch awards page {}, keeping {} awards: {}",
                    page,
                    awards.len(),
                    e
                );
                break;
            }
        }
    }

    awards
}
