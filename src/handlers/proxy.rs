// src/handlers/proxy.rs
use log::{error, info};
use serde_json::Value;
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use super::error::ApiError;
use crate::services::usaspending::{
    award_details_path, is_valid_award_id, SearchEndpoint, UsaSpendingClient,
};

fn search_endpoint(name: &str) -> Option<SearchEndpoint> {
    match name {
        "timeline" => Some(SearchEndpoint::Timeline),
        "agencies" => Some(SearchEndpoint::Agencies),
        "awards" => Some(SearchEndpoint::Awards),
        _ => None,
    }
}

/// Pass a search body through to the matching upstream endpoint.
pub async fn post_search(
    name: String,
    body: Value,
    client: Arc<UsaSpendingClient>,
) -> Result<Json, Rejection> {
    let endpoint = search_endpoint(&name).ok_or_else(|| {
        warp::reject::custom(ApiError::not_found(format!("unknown search endpoint '{}'", name)))
    })?;
    info!("Proxying {} search", name);

    match client.forward(endpoint.path(), Some(&body)).await {
        Ok(response) => Ok(warp::reply::json(&response)),
        Err(e) => {
            error!("Upstream {} search failed: {}", name, e);
            Err(warp::reject::custom(ApiError::upstream(&e)))
        }
    }
}

pub async fn get_award_details(
    id: String,
    client: Arc<UsaSpendingClient>,
) -> Result<Json, Rejection> {
    if !is_valid_award_id(&id) {
        return Err(warp::reject::custom(ApiError::bad_request(format!(
            "invalid award id '{}'",
            id
        ))));
    }
    info!("Proxying award details for {}", id);

    match client.forward(&award_details_path(&id), None).await {
        Ok(response) => Ok(warp::reply::json(&response)),
        Err(e) => {
            error!("Award details for {} failed: {}", id, e);
            Err(warp::reject::custom(ApiError::upstream(&e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_names_map_to_endpoints() {
        assert_eq!(search_endpoint("agencies"), Some(SearchEndpoint::Agencies));
        assert_eq!(search_endpoint("recipients"), None);
    }
}
