// src/services/usaspending.rs
use async_trait::async_trait;
use chrono::Duration;
use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, error, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::FetchError;
use crate::models::{null_as_default, Agency, Award, TimelineDataPoint};
use crate::services::cache::{Clock, TtlCache};
use crate::services::fiscal::QueryPeriod;
use crate::services::markets::PscCode;

pub const DEFAULT_BASE_URL: &str = "https://api.usaspending.gov/api/v2";

/// Contracts only: definitive contracts, purchase orders, delivery orders, BPA calls.
pub const AWARD_TYPE_CODES: [&str; 4] = ["A", "B", "C", "D"];

pub const AWARD_FIELDS: [&str; 9] = [
    "Award ID",
    "Recipient Name",
    "Award Amount",
    "Description",
    "Start Date",
    "End Date",
    "Awarding Agency",
    "Funding Agency",
    "generated_internal_id",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PscFilter {
    pub require: Vec<PscCode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchFilters {
    pub time_period: Vec<QueryPeriod>,
    pub award_type_codes: Vec<String>,
    pub psc_codes: PscFilter,
}

impl SearchFilters {
    pub fn new(psc_codes: Vec<PscCode>, time_period: Vec<QueryPeriod>) -> Self {
        SearchFilters {
            time_period,
            award_type_codes: AWARD_TYPE_CODES.iter().map(|c| c.to_string()).collect(),
            psc_codes: PscFilter { require: psc_codes },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub group: String,
    #[serde(default)]
    pub results: Vec<TimelineDataPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgencyBreakdownResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(default)]
    pub results: Vec<Agency>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    #[serde(default)]
    pub page: u32,
    #[serde(rename = "hasNext", default)]
    pub has_next: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AwardsPage {
    #[serde(default)]
    pub results: Vec<Award>,
    #[serde(default)]
    pub page_metadata: Option<PageMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AgencyRef {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FundingAgencyDetail {
    #[serde(default)]
    pub office_agency_name: Option<String>,
    #[serde(default)]
    pub subtier_agency: Option<AgencyRef>,
    #[serde(default)]
    pub toptier_agency: Option<AgencyRef>,
}

/// The slice of the award detail record used for funding-office resolution.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AwardDetails {
    #[serde(default)]
    pub total_obligation: Option<f64>,
    #[serde(default)]
    pub funding_agency: Option<FundingAgencyDetail>,
}

#[async_trait]
pub trait SpendingApi: Send + Sync {
    /// Quarter-grouped spending totals; the baseline timeline.
    async fn timeline(&self, filters: &SearchFilters) -> Result<TimelineResponse, FetchError>;

    async fn agency_breakdown(
        &self,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<AgencyBreakdownResponse, FetchError>;

    async fn awards_page(
        &self,
        filters: &SearchFilters,
        page: u32,
        limit: u32,
    ) -> Result<AwardsPage, FetchError>;

    async fn award_details(&self, generated_internal_id: &str) -> Result<AwardDetails, FetchError>;
}

/// Raw pass-through endpoints exposed to browser clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchEndpoint {
    Timeline,
    Agencies,
    Awards,
}

impl SearchEndpoint {
    pub fn path(self) -> &'static str {
        match self {
            SearchEndpoint::Timeline => "search/spending_over_time/",
            SearchEndpoint::Agencies => "search/spending_by_category/awarding_agency/",
            SearchEndpoint::Awards => "search/spending_by_award/",
        }
    }
}

pub fn award_details_path(generated_internal_id: &str) -> String {
    format!("awards/{}/", generated_internal_id)
}

/// Internal award ids look like `CONT_AWD_W91ZLK24P0063_9700_-NONE-_-NONE-`.
pub fn is_valid_award_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

type SharedResponse = Shared<BoxFuture<'static, Result<Value, FetchError>>>;

pub struct UsaSpendingClient {
    http: Client,
    base_url: String,
    recent: TtlCache<SharedResponse>,
}

impl UsaSpendingClient {
    /// `request_ttl` is how long an identical request is served from the
    /// previous response; it only needs to cover near-simultaneous duplicates.
    pub fn new(
        base_url: impl Into<String>,
        request_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent("federal-market-dashboard/0.1")
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(UsaSpendingClient {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            recent: TtlCache::new(request_ttl, clock),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request upstream, POSTing `body` when given and GETting otherwise.
    ///
    /// Identical requests inside the TTL share one in-flight future. Failed
    /// requests are evicted so the next caller retries.
    pub async fn forward(&self, path: &str, body: Option<&Value>) -> Result<Value, FetchError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let key = match body {
            Some(body) => format!("{}_{}", url, body),
            None => url.clone(),
        };

        self.recent.purge_expired();
        let (response, reused) = self.recent.get_or_insert_with(&key, || {
            send(self.http.clone(), url.clone(), body.cloned())
                .boxed()
                .shared()
        });

        if reused {
            debug!("Joining recent request to {}", url);
        } else {
            info!("Sending upstream request to {}", url);
        }

        let result = response.await;
        if result.is_err() {
            self.recent.remove(&key);
        }
        result
    }

    async fn post_search<T>(&self, endpoint: SearchEndpoint, body: Value) -> Result<T, FetchError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let value = self.forward(endpoint.path(), Some(&body)).await?;
        Ok(serde_json::from_value(value)?)
    }
}

async fn send(http: Client, url: String, body: Option<Value>) -> Result<Value, FetchError> {
    let request = match &body {
        Some(body) => http.post(&url).json(body),
        None => http.get(&url),
    };
    let response = request.send().await?;
    let status = response.status();

    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        error!("USAspending API error {} from {}: {}", status, url, text);
        return Err(FetchError::Status {
            status: status.as_u16(),
            body: text,
        });
    }

    Ok(response.json::<Value>().await?)
}

#[async_trait]
impl SpendingApi for UsaSpendingClient {
    async fn timeline(&self, filters: &SearchFilters) -> Result<TimelineResponse, FetchError> {
        let body = json!({
            "group": "quarter",
            "filters": filters,
            "subawards": false,
        });
        let response: TimelineResponse = self.post_search(SearchEndpoint::Timeline, body).await?;
        info!("Timeline response: {} data points", response.results.len());
        Ok(response)
    }

    async fn agency_breakdown(
        &self,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<AgencyBreakdownResponse, FetchError> {
        let body = json!({
            "filters": filters,
            "limit": limit,
        });
        let response: AgencyBreakdownResponse =
            self.post_search(SearchEndpoint::Agencies, body).await?;
        info!("Agency breakdown response: {} agencies", response.results.len());
        Ok(response)
    }

    async fn awards_page(
        &self,
        filters: &SearchFilters,
        page: u32,
        limit: u32,
    ) -> Result<AwardsPage, FetchError> {
        let body = json!({
            "filters": filters,
            "fields": AWARD_FIELDS,
            "page": page,
            "limit": limit,
            "sort": "Award Amount",
            "order": "desc",
        });
        self.post_search(SearchEndpoint::Awards, body).await
    }

    async fn award_details(&self, generated_internal_id: &str) -> Result<AwardDetails, FetchError> {
        let value = self
            .forward(&award_details_path(generated_internal_id), None)
            .await?;
        Ok(serde_json::from_value(value)?)
    }
}
