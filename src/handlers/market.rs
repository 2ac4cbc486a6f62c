// src/handlers/market.rs
use chrono::NaiveDate;
use log::{error, info};
use serde::Deserialize;
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use super::error::ApiError;
use crate::models::{DateRange, SelectionMode};
use crate::services::dashboard::DashboardService;
use crate::services::fiscal::{federal_today, QuickRange};

/// Query string shared by the overview and funding office endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketParams {
    pub market: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub mode: Option<SelectionMode>,
    pub preset: Option<QuickRange>,
}

impl MarketParams {
    /// A preset wins over explicit dates; with neither, the last five years.
    pub fn window(&self, today: NaiveDate) -> Result<(DateRange, SelectionMode), ApiError> {
        let preset = match (self.preset, self.start_date, self.end_date) {
            (Some(preset), _, _) => preset,
            (None, Some(start), Some(end)) => {
                if start > end {
                    return Err(ApiError::bad_request(format!(
                        "start_date {} is after end_date {}",
                        start, end
                    )));
                }
                let mode = self.mode.unwrap_or(SelectionMode::Custom);
                return Ok((DateRange::new(start, end), mode));
            }
            (None, None, None) => QuickRange::Last5Years,
            (None, _, _) => {
                return Err(ApiError::bad_request(
                    "start_date and end_date must be given together",
                ))
            }
        };

        let range = preset
            .date_range(today)
            .ok_or_else(|| ApiError::bad_request("preset is out of range"))?;
        Ok((range, self.mode.unwrap_or(SelectionMode::Quick)))
    }
}

pub async fn get_markets(service: Arc<DashboardService>) -> Result<Json, Rejection> {
    info!("Handling request to list markets.");
    Ok(warp::reply::json(&service.markets()))
}

pub async fn get_market_overview(
    params: MarketParams,
    service: Arc<DashboardService>,
) -> Result<Json, Rejection> {
    info!("Handling request for market overview: {}", params.market);
    let (range, mode) = params.window(federal_today()).map_err(warp::reject::custom)?;

    match service.market_overview(&params.market, range, mode).await {
        Ok(overview) => Ok(warp::reply::json(&overview)),
        Err(e) => {
            error!("Failed to build market overview for {}: {}", params.market, e);
            Err(warp::reject::custom(ApiError::from(e)))
        }
    }
}

pub async fn get_funding_offices(
    params: MarketParams,
    service: Arc<DashboardService>,
) -> Result<Json, Rejection> {
    info!("Handling request for funding offices: {}", params.market);
    let (range, mode) = params.window(federal_today()).map_err(warp::reject::custom)?;

    match service.funding_office_analysis(&params.market, range, mode).await {
        Ok(analysis) => Ok(warp::reply::json(&analysis)),
        Err(e) => {
            error!("Failed to build funding office analysis for {}: {}", params.market, e);
            Err(warp::reject::custom(ApiError::from(e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp::http::StatusCode;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn params(start: Option<NaiveDate>, end: Option<NaiveDate>, preset: Option<QuickRange>) -> MarketParams {
        MarketParams {
            market: "Cybersecurity".to_string(),
            start_date: start,
            end_date: end,
            mode: None,
            preset,
        }
    }

    #[test]
    fn no_dates_means_last_five_years() {
        let (range, mode) = params(None, None, None).window(date(2024, 6, 1)).unwrap();
        assert_eq!(range, DateRange::new(date(2019, 10, 1), date(2025, 9, 30)));
        assert_eq!(mode, SelectionMode::Quick);
    }

    #[test]
    fn explicit_dates_default_to_custom() {
        let (range, mode) = params(Some(date(2023, 2, 1)), Some(date(2023, 5, 1)), None)
            .window(date(2024, 6, 1))
            .unwrap();
        assert_eq!(range.start_date, date(2023, 2, 1));
        assert_eq!(mode, SelectionMode::Custom);
    }

    #[test]
    fn lone_or_inverted_dates_are_rejected() {
        let today = date(2024, 6, 1);
        let lone = params(Some(date(2023, 2, 1)), None, None).window(today).unwrap_err();
        assert_eq!(lone.status, StatusCode::BAD_REQUEST);
        let inverted = params(Some(date(2023, 5, 1)), Some(date(2023, 2, 1)), None)
            .window(today)
            .unwrap_err();
        assert_eq!(inverted.status, StatusCode::BAD_REQUEST);
    }
}
