// src/handlers/error.rs
use std::fmt;
use warp::http::StatusCode;
use warp::reject::Reject;

use crate::error::{DashboardError, FetchError};

#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Carry the upstream status through when it is a real HTTP error, else 502.
    pub fn upstream(err: &FetchError) -> Self {
        let status = match err {
            FetchError::Status { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            _ => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, err.to_string())
    }
}

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        match &err {
            DashboardError::UnknownMarket(_) => ApiError::not_found(err.to_string()),
            DashboardError::InvalidRange { .. } | DashboardError::InvalidMarket(_) => {
                ApiError::bad_request(err.to_string())
            }
            DashboardError::Fetch(fetch) => ApiError::upstream(fetch),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}
impl Reject for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_status_is_preserved() {
        let err = FetchError::Status { status: 422, body: "bad filter".into() };
        assert_eq!(ApiError::upstream(&err).status, StatusCode::UNPROCESSABLE_ENTITY);
        let err = FetchError::Network("refused".into());
        assert_eq!(ApiError::upstream(&err).status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn dashboard_errors_map_to_client_statuses() {
        let err: ApiError = DashboardError::UnknownMarket("Nope".into()).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
