// src/error.rs
use chrono::NaiveDate;
use thiserror::Error;

/// Failure talking to the upstream spending API.
///
/// `Clone` so a single in-flight request can hand the same outcome to every
/// caller that joined it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to decode upstream response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReconcileError {
    #[error("award {award_id} has a non-finite amount")]
    NonFiniteAmount { award_id: String },
}

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("unknown market: {0}")]
    UnknownMarket(String),

    #[error("invalid market definition: {0}")]
    InvalidMarket(String),

    #[error("invalid date range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error(transparent)]
    Fetch(#[from] FetchError),
}
