// src/routes.rs
use std::sync::Arc;
use warp::reject::Rejection;
use crate::handlers::market::{get_funding_offices, get_market_overview, get_markets, MarketParams};
use crate::handlers::proxy::{get_award_details, post_search};
use crate::services::dashboard::DashboardService;
use crate::services::usaspending::UsaSpendingClient;
use log::info;

use std::convert::Infallible;
use warp::http::StatusCode;
use warp::{Filter, Reply};
use crate::handlers::error::ApiError;

const MAX_SEARCH_BODY: u64 = 64 * 1024;

// Render every rejection as {"error": message}
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message: String;

    if err.is_not_found() {
        code = StatusCode::NOT_FOUND;
        message = "Not Found".to_string();
    } else if let Some(api_error) = err.find::<ApiError>() {
        code = api_error.status;
        message = api_error.message.clone();
    } else if let Some(invalid) = err.find::<warp::reject::InvalidQuery>() {
        code = StatusCode::BAD_REQUEST;
        message = invalid.to_string();
    } else if let Some(invalid) = err.find::<warp::filters::body::BodyDeserializeError>() {
        code = StatusCode::BAD_REQUEST;
        message = invalid.to_string();
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        code = StatusCode::PAYLOAD_TOO_LARGE;
        message = "Payload Too Large".to_string();
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        code = StatusCode::METHOD_NOT_ALLOWED;
        message = "Method Not Allowed".to_string();
    } else {
        code = StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal Server Error".to_string();
    }

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": message,
        })),
        code,
    ))
}

pub fn routes(
    service: Arc<DashboardService>,
    client: Arc<UsaSpendingClient>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    info!("Configuring routes...");

    let service_filter = warp::any().map(move || service.clone());
    let client_filter = warp::any().map(move || client.clone());

    let markets_route = warp::path!("api" / "v1" / "markets")
        .and(warp::get())
        .and(service_filter.clone())
        .and_then(get_markets);

    let overview_route = warp::path!("api" / "v1" / "overview")
        .and(warp::get())
        .and(warp::query::<MarketParams>())
        .and(service_filter.clone())
        .and_then(get_market_overview);

    let funding_offices_route = warp::path!("api" / "v1" / "funding-offices")
        .and(warp::get())
        .and(warp::query::<MarketParams>())
        .and(service_filter.clone())
        .and_then(get_funding_offices);

    let search_route = warp::path!("api" / "usaspending" / String)
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_SEARCH_BODY))
        .and(warp::body::json())
        .and(client_filter.clone())
        .and_then(post_search);

    let award_details_route = warp::path!("api" / "usaspending" / "award-details" / String)
        .and(warp::get())
        .and(client_filter.clone())
        .and_then(get_award_details);

    info!("All routes configured successfully.");

    markets_route
        .or(overview_route)
        .or(funding_offices_route)
        .or(search_route)
        .or(award_details_route)
        .recover(handle_rejection)
}
