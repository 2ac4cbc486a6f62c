// src/services/overview.rs
use futures::future::join_all;
use log::{info, warn};
use std::collections::{BTreeMap, HashMap};

use crate::error::FetchError;
use crate::models::{
    Award, DataSource, DateRange, EntityView, FundingOfficeAnalysis, MarketOverview,
    SelectionMode, TimelineDataPoint,
};
use crate::services::awards::{fetch_all_awards, fetch_all_awards_strict};
use crate::services::fiscal::to_query_periods;
use crate::services::markets::PscCode;
use crate::services::offices::{group_by_agency, resolve_funding_offices};
use crate::services::timeline::reconcile_timeline;
use crate::services::usaspending::{SearchFilters, SpendingApi};

#[derive(Debug, Clone, Copy)]
pub struct AssemblySettings {
    /// Number of agencies requested from the category breakdown.
    pub agency_limit: usize,
    /// Award detail lookups in flight at once.
    pub detail_concurrency: usize,
}

impl Default for AssemblySettings {
    fn default() -> Self {
        AssemblySettings {
            agency_limit: 10,
            detail_concurrency: 1,
        }
    }
}

/// What is being asked for: one market over one window.
#[derive(Debug, Clone, Copy)]
pub struct MarketQuery<'a> {
    pub market: &'a str,
    pub psc_codes: &'a [PscCode],
    pub range: DateRange,
    pub mode: SelectionMode,
}

impl MarketQuery<'_> {
    fn filters(&self) -> SearchFilters {
        SearchFilters::new(self.psc_codes.to_vec(), to_query_periods(&self.range, self.mode))
    }
}

/// Build the full, internally consistent bundle for one market and window.
///
/// The baseline timeline and agency breakdown must both succeed. Everything
/// after that is best-effort per entity: a view that cannot be derived is
/// replaced by an empty one.
pub async fn assemble_market_overview(
    api: &dyn SpendingApi,
    query: &MarketQuery<'_>,
    settings: &AssemblySettings,
) -> Result<MarketOverview, FetchError> {
    info!(
        "Assembling market overview for {} ({} to {}, {})",
        query.market,
        query.range.start_date,
        query.range.end_date,
        query.mode.as_str()
    );
    let filters = query.filters();

    let (timeline, agencies) = futures::try_join!(
        api.timeline(&filters),
        api.agency_breakdown(&filters, settings.agency_limit)
    )?;
    let baseline = timeline.results;
    let agencies = agencies.results;

    let awards = fetch_all_awards(api, &filters).await;
    info!(
        "Base data fetched: {} timeline points, {} agencies, {} awards",
        baseline.len(),
        agencies.len(),
        awards.len()
    );

    let agency_views: BTreeMap<String, EntityView> = join_all(agencies.iter().map(|agency| {
        let awards = &awards;
        let baseline = &baseline;
        async move {
            let subset = awards.iter().filter(|a| a.awarding_agency == agency.name);
            (agency.key().to_string(), derive_view(&agency.name, subset, baseline))
        }
    }))
    .await
    .into_iter()
    .collect();

    let funding_offices =
        resolve_funding_offices(api, &awards, settings.detail_concurrency).await;

    let by_internal_id = index_by_internal_id(&awards);
    let office_views: BTreeMap<String, EntityView> = funding_offices
        .iter()
        .map(|office| {
            let joined = office
                .awards
                .iter()
                .filter_map(|summary| by_internal_id.get(summary.internal_id.as_str()).copied());
            (office.key.clone(), derive_view(&office.name, joined, &baseline))
        })
        .collect();

    let total_market_size: f64 = agencies.iter().map(|a| a.amount).sum();
    let growth = yoy_growth(&baseline);

    info!(
        "Market overview for {} complete: {} agency views, {} office views",
        query.market,
        agency_views.len(),
        office_views.len()
    );

    Ok(MarketOverview {
        market_name: query.market.to_string(),
        date_range: query.range,
        mode: query.mode,
        total_market_size,
        yoy_growth: growth,
        timeline_data: baseline,
        agency_breakdown: agencies,
        awards,
        agency_views,
        funding_offices,
        office_views,
        data_source: DataSource::Live,
    })
}

/// Funding offices for one market and window, rolled up by agency.
pub async fn assemble_funding_office_analysis(
    api: &dyn SpendingApi,
    query: &MarketQuery<'_>,
    settings: &AssemblySettings,
) -> Result<FundingOfficeAnalysis, FetchError> {
    info!("Assembling funding office analysis for {}", query.market);
    let filters = query.filters();

    let awards = fetch_all_awards_strict(api, &filters).await?;
    let funding_offices =
        resolve_funding_offices(api, &awards, settings.detail_concurrency).await;
    let offices_by_agency = group_by_agency(&funding_offices);

    Ok(FundingOfficeAnalysis {
        market_name: query.market.to_string(),
        funding_offices,
        offices_by_agency,
        data_source: DataSource::Live,
    })
}

fn derive_view<'a>(
    name: &str,
    awards: impl Iterator<Item = &'a Award> + Clone,
    baseline: &[TimelineDataPoint],
) -> EntityView {
    match reconcile_timeline(awards.clone(), baseline) {
        Ok(timeline) => EntityView {
            name: name.to_string(),
            timeline,
            awards: awards.cloned().collect(),
        },
        Err(e) => {
            warn!("Could not derive view for {}: {}", name, e);
            EntityView::empty(name)
        }
    }
}

/// Display award ids repeat across records; the internal id does not.
/// First occurrence wins if upstream ever sends a duplicate.
fn index_by_internal_id(awards: &[Award]) -> HashMap<&str, &Award> {
    let mut index = HashMap::with_capacity(awards.len());
    for award in awards {
        index.entry(award.generated_internal_id.as_str()).or_insert(award);
    }
    index
}

/// Percent change between the two most recent fiscal years in the baseline.
///
/// Zero when fewer than two fiscal years are present or the earlier total is zero.
pub fn yoy_growth(baseline: &[TimelineDataPoint]) -> f64 {
    let mut yearly: BTreeMap<i32, f64> = BTreeMap::new();
    for point in baseline {
        *yearly.entry(point.time_period.fiscal_year).or_insert(0.0) += point.aggregated_amount;
    }

    let mut recent = yearly.values().rev();
    match (recent.next(), recent.next()) {
        (Some(latest), Some(previous)) if *previous != 0.0 => (latest / previous - 1.0) * 100.0,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::services::mock::{agency, award, office_details, point, MockSpendingApi};
    use chrono::NaiveDate;

    fn query() -> MarketQuery<'static> {
        MarketQuery {
            market: "Electronic Warfare",
            psc_codes: &[],
            range: DateRange::new(
                NaiveDate::from_ymd_opt(2019, 10, 1).unwrap(),
                NaiveDate::from_ymd_opt(2021, 9, 30).unwrap(),
            ),
            mode: SelectionMode::Quick,
        }
    }

    fn baseline() -> Vec<TimelineDataPoint> {
        vec![
            point(2020, 1, 100.0),
            point(2020, 2, 100.0),
            point(2021, 1, 150.0),
            point(2021, 2, 150.0),
        ]
    }

    #[tokio::test]
    async fn market_size_comes_from_agency_amounts() {
        let api = MockSpendingApi::new()
            .with_timeline(vec![point(2021, 1, 10.0), point(2021, 2, 20.0)])
            .with_agencies(vec![agency("A", "001", 300.0), agency("B", "002", 700.0)]);

        let overview = assemble_market_overview(&api, &query(), &AssemblySettings::default())
            .await
            .unwrap();

        assert_eq!(overview.total_market_size, 1000.0);
        assert_eq!(overview.yoy_growth, 0.0);
        assert_eq!(overview.data_source, DataSource::Live);
    }

    #[test]
    fn yoy_growth_compares_latest_two_years() {
        assert_eq!(yoy_growth(&baseline()), 50.0);
        assert_eq!(yoy_growth(&[point(2020, 1, 0.0), point(2021, 1, 5.0)]), 0.0);
        assert_eq!(yoy_growth(&[]), 0.0);
    }

    #[tokio::test]
    async fn agency_and_office_views_reconcile_with_awards() {
        let awards = vec![
            award("A1", "Department of Defense", 100.0, "2019-11-01"),
            award("A2", "Department of Defense", 50.0, "2020-10-15"),
            award("A3", "Department of Energy", 25.0, "2018-01-01"),
        ];
        let api = MockSpendingApi::new()
            .with_timeline(baseline())
            .with_agencies(vec![
                agency("Department of Defense", "097", 150.0),
                agency("Department of Energy", "089", 25.0),
            ])
            .with_awards(awards, 100)
            .with_details(
                "CONT_AWD_A1",
                office_details("AFLCMC", ("Department of the Air Force", "5700"), ("Department of Defense", "097")),
            )
            .with_details(
                "CONT_AWD_A3",
                office_details("NNSA HQ", ("National Nuclear Security Administration", "8900"), ("Department of Energy", "089")),
            );

        let overview = assemble_market_overview(&api, &query(), &AssemblySettings::default())
            .await
            .unwrap();

        let dod = &overview.agency_views["097"];
        assert_eq!(dod.name, "Department of Defense");
        assert_eq!(dod.awards.len(), 2);
        let amounts: Vec<f64> = dod.timeline.iter().map(|p| p.aggregated_amount).collect();
        assert_eq!(amounts, vec![100.0, 0.0, 50.0, 0.0]);

        // out-of-window award folds into the first bucket
        let doe = &overview.agency_views["089"];
        assert_eq!(doe.timeline[0].aggregated_amount, 25.0);

        assert_eq!(overview.funding_offices.len(), 2);
        let office = &overview.office_views["5700_AFLCMC"];
        assert_eq!(office.awards[0].award_id, "A1");
        assert_eq!(office.timeline.len(), 4);
        let office_total: f64 = office.timeline.iter().map(|p| p.aggregated_amount).sum();
        assert_eq!(office_total, 100.0);
    }

    #[tokio::test]
    async fn broken_entity_gets_empty_view() {
        let awards = vec![
            award("OK", "Department of Defense", 100.0, "2019-11-01"),
            award("BAD", "Department of Energy", f64::INFINITY, "2019-11-01"),
        ];
        let api = MockSpendingApi::new()
            .with_timeline(baseline())
            .with_agencies(vec![
                agency("Department of Defense", "097", 100.0),
                agency("Department of Energy", "089", 1.0),
            ])
            .with_awards(awards, 100);

        let overview = assemble_market_overview(&api, &query(), &AssemblySettings::default())
            .await
            .unwrap();

        assert_eq!(overview.agency_views["097"].timeline.len(), 4);
        assert_eq!(overview.agency_views["089"], EntityView::empty("Department of Energy"));
    }

    #[tokio::test]
    async fn baseline_failure_fails_assembly() {
        let api = MockSpendingApi::new()
            .failing_timeline(FetchError::Status { status: 503, body: "down".into() })
            .with_agencies(vec![agency("A", "001", 1.0)]);

        let result = assemble_market_overview(&api, &query(), &AssemblySettings::default()).await;

        assert!(matches!(result, Err(FetchError::Status { status: 503, .. })));
    }

    #[tokio::test]
    async fn office_view_joins_on_internal_id() {
        let mut first = award("DUP", "Department of Defense", 100.0, "2019-11-01");
        first.generated_internal_id = "CONT_AWD_DUP_1".to_string();
        let mut second = award("DUP", "Department of Defense", 900.0, "2020-10-15");
        second.generated_internal_id = "CONT_AWD_DUP_2".to_string();
        let details = || {
            office_details("AFLCMC", ("Department of the Air Force", "5700"), ("Department of Defense", "097"))
        };
        let api = MockSpendingApi::new()
            .with_timeline(baseline())
            .with_agencies(vec![agency("Department of Defense", "097", 1000.0)])
            .with_awards(vec![first, second], 100)
            .with_details("CONT_AWD_DUP_1", details())
            .with_details("CONT_AWD_DUP_2", details());

        let overview = assemble_market_overview(&api, &query(), &AssemblySettings::default())
            .await
            .unwrap();

        let office = &overview.funding_offices[0];
        let view = &overview.office_views[&office.key];
        let view_total: f64 = view.timeline.iter().map(|p| p.aggregated_amount).sum();
        let amounts: Vec<f64> = view.awards.iter().map(|a| a.amount).collect();
        assert_eq!(office.total_obligation, 1000.0);
        assert_eq!(view_total, office.total_obligation);
        assert_eq!(amounts, vec![100.0, 900.0]);
    }

    #[test]
    fn market_overview_future_is_send() {
        fn assert_send<T: Send>(_: &T) {}
        let api = MockSpendingApi::new();
        let query = query();
        let settings = AssemblySettings::default();
        let future = assemble_market_overview(&api, &query, &settings);
        assert_send(&future);
    }

    #[tokio::test]
    async fn analysis_groups_offices_by_agency() {
        let api = MockSpendingApi::new()
            .with_awards(
                vec![
                    award("A1", "Department of Defense", 10.0, "2020-01-01"),
                    award("A2", "Department of Defense", 30.0, "2020-01-01"),
                ],
                100,
            )
            .with_details(
                "CONT_AWD_A1",
                office_details("AFLCMC", ("Department of the Air Force", "5700"), ("Department of Defense", "097")),
            )
            .with_details(
                "CONT_AWD_A2",
                office_details("NAVAIR", ("Department of the Navy", "1700"), ("Department of Defense", "097")),
            );

        let analysis =
            assemble_funding_office_analysis(&api, &query(), &AssemblySettings::default())
                .await
                .unwrap();

        assert_eq!(analysis.funding_offices.len(), 2);
        assert_eq!(analysis.offices_by_agency[0].name, "Department of the Navy");
        assert_eq!(analysis.offices_by_agency[0].total_obligation, 30.0);
    }
}
