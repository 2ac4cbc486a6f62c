// src/services/dashboard.rs
use chrono::Duration;
use log::{debug, error, info, warn};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{DashboardError, FetchError};
use crate::models::{DateRange, FundingOfficeAnalysis, MarketOverview, SelectionMode};
use crate::services::cache::{Clock, TtlCache};
use crate::services::fallback::{example_funding_office_analysis, example_overview};
use crate::services::markets::{MarketRegistry, MarketSummary, PscCode};
use crate::services::overview::{
    assemble_funding_office_analysis, assemble_market_overview, AssemblySettings, MarketQuery,
};
use crate::services::usaspending::SpendingApi;

const OVERVIEW_PREFIX: &str = "market_overview";
const ANALYSIS_PREFIX: &str = "funding_office";

#[derive(Debug, Clone, Copy)]
pub struct ServiceSettings {
    pub overview_ttl: Duration,
    pub assembly: AssemblySettings,
    /// Serve the example bundle when live assembly fails.
    pub fallback_enabled: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        ServiceSettings {
            overview_ttl: Duration::hours(24),
            assembly: AssemblySettings::default(),
            fallback_enabled: true,
        }
    }
}

/// Caching and fallback policy in front of the assembly pipeline.
pub struct DashboardService {
    api: Arc<dyn SpendingApi>,
    registry: RwLock<MarketRegistry>,
    overviews: TtlCache<MarketOverview>,
    analyses: TtlCache<FundingOfficeAnalysis>,
    settings: ServiceSettings,
}

impl DashboardService {
    pub fn new(
        api: Arc<dyn SpendingApi>,
        registry: MarketRegistry,
        settings: ServiceSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        DashboardService {
            api,
            registry: RwLock::new(registry),
            overviews: TtlCache::new(settings.overview_ttl, clock.clone()),
            analyses: TtlCache::new(settings.overview_ttl, clock),
            settings,
        }
    }

    fn registry(&self) -> RwLockReadGuard<'_, MarketRegistry> {
        self.registry.read().unwrap_or_else(|e| e.into_inner())
    }

    fn registry_mut(&self) -> RwLockWriteGuard<'_, MarketRegistry> {
        self.registry.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn markets(&self) -> Vec<MarketSummary> {
        self.registry().summaries()
    }

    /// Define or redefine a market. Bundles cached under its name are dropped.
    pub fn add_market(&self, name: &str, codes: Vec<PscCode>) -> Result<(), DashboardError> {
        self.registry_mut()
            .add_market(name, codes)
            .map_err(DashboardError::InvalidMarket)?;
        self.invalidate(name);
        Ok(())
    }

    /// Replace the codes of an existing market; false when it is unknown.
    pub fn update_market(&self, name: &str, codes: Vec<PscCode>) -> Result<bool, DashboardError> {
        let updated = self
            .registry_mut()
            .update_market(name, codes)
            .map_err(DashboardError::InvalidMarket)?;
        if updated {
            self.invalidate(name);
        }
        Ok(updated)
    }

    pub fn remove_market(&self, name: &str) -> bool {
        let removed = self.registry_mut().remove_market(name);
        if removed {
            self.invalidate(name);
        }
        removed
    }

    fn invalidate(&self, market: &str) {
        let overview_prefix = format!("{}_{}_", OVERVIEW_PREFIX, market);
        let analysis_prefix = format!("{}_{}_", ANALYSIS_PREFIX, market);
        let dropped = self.overviews.remove_matching(|key| key.starts_with(&overview_prefix))
            + self.analyses.remove_matching(|key| key.starts_with(&analysis_prefix));
        info!("Market {} changed, dropped {} cached bundles", market, dropped);
    }

    /// Number of bundles currently held, live or not yet swept.
    pub fn cached_bundles(&self) -> usize {
        self.overviews.len() + self.analyses.len()
    }

    pub async fn market_overview(
        &self,
        market: &str,
        range: DateRange,
        mode: SelectionMode,
    ) -> Result<MarketOverview, DashboardError> {
        let psc_codes = self.validate(market, range)?;
        let query = MarketQuery {
            market,
            psc_codes: &psc_codes,
            range,
            mode,
        };
        let key = cache_key(OVERVIEW_PREFIX, &query);

        if let Some(cached) = self.overviews.get(&key) {
            info!("Serving cached market overview: {}", key);
            return Ok(cached);
        }

        match assemble_market_overview(self.api.as_ref(), &query, &self.settings.assembly).await {
            Ok(overview) => {
                let swept = self.overviews.purge_expired();
                if swept > 0 {
                    debug!("Swept {} expired market overviews", swept);
                }
                self.overviews.set(key, overview.clone());
                Ok(overview)
            }
            Err(e) => {
                self.fall_back(market, e)?;
                Ok(example_overview(market, range, mode))
            }
        }
    }

    pub async fn funding_office_analysis(
        &self,
        market: &str,
        range: DateRange,
        mode: SelectionMode,
    ) -> Result<FundingOfficeAnalysis, DashboardError> {
        let psc_codes = self.validate(market, range)?;
        let query = MarketQuery {
            market,
            psc_codes: &psc_codes,
            range,
            mode,
        };
        let key = cache_key(ANALYSIS_PREFIX, &query);

        if let Some(cached) = self.analyses.get(&key) {
            info!("Serving cached funding office analysis: {}", key);
            return Ok(cached);
        }

        match assemble_funding_office_analysis(self.api.as_ref(), &query, &self.settings.assembly)
            .await
        {
            Ok(analysis) => {
                let swept = self.analyses.purge_expired();
                if swept > 0 {
                    debug!("Swept {} expired funding office analyses", swept);
                }
                self.analyses.set(key, analysis.clone());
                Ok(analysis)
            }
            Err(e) => {
                self.fall_back(market, e)?;
                Ok(example_funding_office_analysis(market))
            }
        }
    }

    /// The market's PSC codes, copied out so no lock is held across the fetch.
    fn validate(&self, market: &str, range: DateRange) -> Result<Vec<PscCode>, DashboardError> {
        if range.start_date > range.end_date {
            return Err(DashboardError::InvalidRange {
                start: range.start_date,
                end: range.end_date,
            });
        }
        self.registry()
            .psc_codes(market)
            .map(<[PscCode]>::to_vec)
            .ok_or_else(|| DashboardError::UnknownMarket(market.to_string()))
    }

    /// Ok when the caller should serve example data instead of `err`.
    fn fall_back(&self, market: &str, err: FetchError) -> Result<(), DashboardError> {
        if !self.settings.fallback_enabled {
            error!("Live data unavailable for {}: {}", market, err);
            return Err(err.into());
        }
        warn!("Live data unavailable for {}, serving example data: {}", market, err);
        Ok(())
    }
}

fn cache_key(prefix: &str, query: &MarketQuery<'_>) -> String {
    format!(
        "{}_{}_{}_{}_{}",
        prefix,
        query.market,
        query.range.start_date,
        query.range.end_date,
        query.mode.as_str()
    )
}
