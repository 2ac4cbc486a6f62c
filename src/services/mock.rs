// src/services/mock.rs
//! In-memory `SpendingApi` with call counters, for exercising the pipeline
//! without the network.
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::FetchError;
use crate::models::{Agency, Award, TimePeriod, TimelineDataPoint};
use crate::services::usaspending::{
    AgencyBreakdownResponse, AgencyRef, AwardDetails, AwardsPage, FundingAgencyDetail,
    SearchFilters, SpendingApi, TimelineResponse,
};

#[derive(Debug, Default)]
pub struct CallCounts {
    pub timeline: AtomicUsize,
    pub agencies: AtomicUsize,
    pub pages: AtomicUsize,
    pub details: AtomicUsize,
    in_flight_details: AtomicUsize,
    pub max_in_flight_details: AtomicUsize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.timeline.load(Ordering::SeqCst)
            + self.agencies.load(Ordering::SeqCst)
            + self.pages.load(Ordering::SeqCst)
            + self.details.load(Ordering::SeqCst)
    }
}

pub struct MockSpendingApi {
    timeline: Result<TimelineResponse, FetchError>,
    agencies: Result<AgencyBreakdownResponse, FetchError>,
    /// Page `n` is `pages[n - 1]`; pages past the end are empty.
    pages: Vec<Result<Vec<Award>, FetchError>>,
    details: HashMap<String, Result<AwardDetails, FetchError>>,
    pub calls: CallCounts,
}

impl Default for MockSpendingApi {
    fn default() -> Self {
        MockSpendingApi {
            timeline: Ok(TimelineResponse {
                group: "quarter".to_string(),
                results: Vec::new(),
            }),
            agencies: Ok(AgencyBreakdownResponse {
                category: "awarding_agency".to_string(),
                results: Vec::new(),
            }),
            pages: Vec::new(),
            details: HashMap::new(),
            calls: CallCounts::default(),
        }
    }
}

impl MockSpendingApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeline(mut self, results: Vec<TimelineDataPoint>) -> Self {
        self.timeline = Ok(TimelineResponse {
            group: "quarter".to_string(),
            results,
        });
        self
    }

    pub fn failing_timeline(mut self, err: FetchError) -> Self {
        self.timeline = Err(err);
        self
    }

    pub fn with_agencies(mut self, results: Vec<Agency>) -> Self {
        self.agencies = Ok(AgencyBreakdownResponse {
            category: "awarding_agency".to_string(),
            results,
        });
        self
    }

    pub fn failing_agencies(mut self, err: FetchError) -> Self {
        self.agencies = Err(err);
        self
    }

    /// Serve `awards` in pages of `page_size`.
    pub fn with_awards(mut self, awards: Vec<Award>, page_size: usize) -> Self {
        self.pages = awards
            .chunks(page_size.max(1))
            .map(|chunk| Ok(chunk.to_vec()))
            .collect();
        self
    }

    pub fn with_pages(mut self, pages: Vec<Result<Vec<Award>, FetchError>>) -> Self {
        self.pages = pages;
        self
    }

    pub fn with_details(mut self, generated_internal_id: &str, details: AwardDetails) -> Self {
        self.details
            .insert(generated_internal_id.to_string(), Ok(details));
        self
    }

    pub fn failing_details(mut self, generated_internal_id: &str, err: FetchError) -> Self {
        self.details
            .insert(generated_internal_id.to_string(), Err(err));
        self
    }
}

#[async_trait]
impl SpendingApi for MockSpendingApi {
    async fn timeline(&self, _filters: &SearchFilters) -> Result<TimelineResponse, FetchError> {
        self.calls.timeline.fetch_add(1, Ordering::SeqCst);
        self.timeline.clone()
    }

    async fn agency_breakdown(
        &self,
        _filters: &SearchFilters,
        limit: usize,
    ) -> Result<AgencyBreakdownResponse, FetchError> {
        self.calls.agencies.fetch_add(1, Ordering::SeqCst);
        self.agencies.clone().map(|mut response| {
            response.results.truncate(limit);
            response
        })
    }

    async fn awards_page(
        &self,
        _filters: &SearchFilters,
        page: u32,
        limit: u32,
    ) -> Result<AwardsPage, FetchError> {
        self.calls.pages.fetch_add(1, Ordering::SeqCst);
        let results = match self.pages.get(page.saturating_sub(1) as usize) {
            Some(Ok(awards)) => awards.iter().take(limit as usize).cloned().collect(),
            Some(Err(err)) => return Err(err.clone()),
            None => Vec::new(),
        };
        Ok(AwardsPage {
            results,
            page_metadata: None,
        })
    }

    async fn award_details(&self, generated_internal_id: &str) -> Result<AwardDetails, FetchError> {
        self.calls.details.fetch_add(1, Ordering::SeqCst);
        let now = self.calls.in_flight_details.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls
            .max_in_flight_details
            .fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.calls.in_flight_details.fetch_sub(1, Ordering::SeqCst);

        self.details
            .get(generated_internal_id)
            .cloned()
            .unwrap_or_else(|| {
                Err(FetchError::Status {
                    status: 404,
                    body: format!("no award {}", generated_internal_id),
                })
            })
    }
}

pub fn award(id: &str, agency: &str, amount: f64, start_date: &str) -> Award {
    Award {
        award_id: id.to_string(),
        recipient_name: format!("{} RECIPIENT", id),
        amount,
        description: format!("{} DESCRIPTION", id),
        start_date: start_date.to_string(),
        end_date: String::new(),
        awarding_agency: agency.to_string(),
        funding_agency: agency.to_string(),
        generated_internal_id: format!("CONT_AWD_{}", id),
    }
}

pub fn agency(name: &str, code: &str, amount: f64) -> Agency {
    Agency {
        amount,
        name: name.to_string(),
        code: code.to_string(),
        id: 0,
    }
}

pub fn point(fiscal_year: i32, quarter: u8, amount: f64) -> TimelineDataPoint {
    TimelineDataPoint {
        time_period: TimePeriod::new(fiscal_year, quarter),
        aggregated_amount: amount,
    }
}

pub fn office_details(
    office: &str,
    subtier: (&str, &str),
    toptier: (&str, &str),
) -> AwardDetails {
    AwardDetails {
        total_obligation: None,
        funding_agency: Some(FundingAgencyDetail {
            office_agency_name: Some(office.to_string()),
            subtier_agency: Some(AgencyRef {
                name: subtier.0.to_string(),
                code: subtier.1.to_string(),
            }),
            toptier_agency: Some(AgencyRef {
                name: toptier.0.to_string(),
                code: toptier.1.to_string(),
            }),
        }),
    }
}
