// src/config.rs
use anyhow::{Context, Result};
use chrono::Duration;
use log::{info, warn};
use std::env;
use std::str::FromStr;

use crate::services::dashboard::ServiceSettings;
use crate::services::overview::AssemblySettings;
use crate::services::usaspending::DEFAULT_BASE_URL;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub port: u16,
    pub api_url: String,
    pub overview_cache_ttl_secs: i64,
    pub request_cache_ttl_secs: i64,
    pub detail_lookup_concurrency: usize,
    pub agency_limit: usize,
    pub fallback_enabled: bool,
}

impl AppConfig {
    /// Read settings from the process environment (after `.env` is loaded).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_url = lookup("USASPENDING_API_URL").unwrap_or_else(|| {
            info!("USASPENDING_API_URL not set, using {}", DEFAULT_BASE_URL);
            DEFAULT_BASE_URL.to_string()
        });

        let config = AppConfig {
            port: setting(&lookup, "PORT", 3030)?,
            api_url,
            overview_cache_ttl_secs: setting(&lookup, "OVERVIEW_CACHE_TTL_SECS", 86_400)?,
            request_cache_ttl_secs: setting(&lookup, "REQUEST_CACHE_TTL_SECS", 5)?,
            detail_lookup_concurrency: setting(&lookup, "DETAIL_LOOKUP_CONCURRENCY", 1)?,
            agency_limit: setting(&lookup, "AGENCY_LIMIT", 10)?,
            fallback_enabled: setting(&lookup, "FALLBACK_ENABLED", true)?,
        };

        if config.detail_lookup_concurrency == 0 {
            anyhow::bail!("DETAIL_LOOKUP_CONCURRENCY must be at least 1");
        }
        Ok(config)
    }

    pub fn request_ttl(&self) -> Duration {
        Duration::seconds(self.request_cache_ttl_secs)
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            overview_ttl: Duration::seconds(self.overview_cache_ttl_secs),
            assembly: AssemblySettings {
                agency_limit: self.agency_limit,
                detail_concurrency: self.detail_lookup_concurrency,
            },
            fallback_enabled: self.fallback_enabled,
        }
    }
}

fn setting<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr + std::fmt::Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has invalid value '{}'", key, raw)),
        None => {
            warn!("${} not set, defaulting to {}", key, default);
            Ok(default)
        }
    }
}
