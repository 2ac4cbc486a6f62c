// src/services/offices.rs
use futures::stream::{self, StreamExt};
use log::{debug, error, info};
use std::collections::HashMap;

use crate::error::FetchError;
use crate::models::{AgencyOffices, Award, FundingOffice, OfficeAward};
use crate::services::usaspending::{AwardDetails, SpendingApi};

/// Resolve the funding office of every award with one detail lookup each.
///
/// At most `concurrency` lookups are in flight (minimum 1). Results are folded
/// in award order, so the outcome does not depend on the concurrency level.
/// Failed lookups and records without a funding office are left out.
pub async fn resolve_funding_offices(
    api: &dyn SpendingApi,
    awards: &[Award],
    concurrency: usize,
) -> Vec<FundingOffice> {
    info!(
        "Resolving funding offices for {} awards ({} at a time)",
        awards.len(),
        concurrency.max(1)
    );

    let pending: Vec<_> = awards.iter().map(|award| lookup(api, award)).collect();
    let lookups: Vec<(&Award, Result<AwardDetails, FetchError>)> = stream::iter(pending)
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut offices: HashMap<String, FundingOffice> = HashMap::new();
    let mut failures = 0;

    for (award, details) in lookups {
        match details {
            Ok(details) => add_to_office(&mut offices, award, &details),
            Err(e) => {
                failures += 1;
                error!(
                    "Error fetching award details for {}: {}",
                    award.generated_internal_id, e
                );
            }
        }
    }

    let mut offices: Vec<FundingOffice> = offices.into_values().collect();
    offices.sort_by(|a, b| {
        b.total_obligation
            .total_cmp(&a.total_obligation)
            .then_with(|| a.key.cmp(&b.key))
    });

    info!(
        "Resolved {} funding offices ({} detail lookups failed)",
        offices.len(),
        failures
    );
    offices
}

async fn lookup<'a>(
    api: &'a dyn SpendingApi,
    award: &'a Award,
) -> (&'a Award, Result<AwardDetails, FetchError>) {
    (award, api.award_details(&award.generated_internal_id).await)
}

fn add_to_office(offices: &mut HashMap<String, FundingOffice>, award: &Award, details: &AwardDetails) {
    let Some(funding) = &details.funding_agency else {
        debug!("Award {} has no funding agency", award.award_id);
        return;
    };
    let Some(name) = funding.office_agency_name.as_deref().filter(|n| !n.is_empty()) else {
        debug!("Award {} has no funding office", award.award_id);
        return;
    };

    let subtier = funding.subtier_agency.clone().unwrap_or_default();
    let toptier = funding.toptier_agency.clone().unwrap_or_default();
    let key = FundingOffice::composite_key(&subtier.code, name);

    let office = offices.entry(key.clone()).or_insert_with(|| FundingOffice {
        key,
        name: name.to_string(),
        agency: subtier.name,
        agency_code: subtier.code,
        toptier_agency: toptier.name,
        toptier_agency_code: toptier.code,
        total_awards: 0,
        total_obligation: 0.0,
        awards: Vec::new(),
    });

    office.total_awards += 1;
    office.total_obligation += award.amount;
    office.awards.push(OfficeAward {
        id: award.award_id.clone(),
        internal_id: award.generated_internal_id.clone(),
        amount: award.amount,
        description: award.description.clone(),
        recipient: award.recipient_name.clone(),
    });
}

/// Roll offices up under their subtier agency, largest obligation first.
pub fn group_by_agency(offices: &[FundingOffice]) -> Vec<AgencyOffices> {
    let mut groups: Vec<AgencyOffices> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for office in offices {
        let slot = *index.entry(office.agency.as_str()).or_insert_with(|| {
            groups.push(AgencyOffices {
                name: office.agency.clone(),
                toptier_agency: office.toptier_agency.clone(),
                total_obligation: 0.0,
                offices: Vec::new(),
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];
        group.total_obligation += office.total_obligation;
        group.offices.push(office.clone());
    }

    groups.sort_by(|a, b| b.total_obligation.total_cmp(&a.total_obligation));
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mock::{award, office_details, MockSpendingApi};
    use std::sync::atomic::Ordering;

    const AIR_FORCE: (&str, &str) = ("Department of the Air Force", "5700");
    const NAVY: (&str, &str) = ("Department of the Navy", "1700");
    const DOD: (&str, &str) = ("Department of Defense", "097");

    fn fixture() -> (MockSpendingApi, Vec<Award>) {
        let awards = vec![
            award("A1", "Department of Defense", 100.0, "2021-01-01"),
            award("A2", "Department of Defense", 250.0, "2021-02-01"),
            award("A3", "Department of Defense", 40.0, "2021-03-01"),
            award("A4", "Department of Defense", 900.0, "2021-04-01"),
            award("A5", "Department of Defense", 5.0, "2021-05-01"),
        ];
        let api = MockSpendingApi::new()
            .with_details("CONT_AWD_A1", office_details("PROGRAM OFFICE", AIR_FORCE, DOD))
            .with_details("CONT_AWD_A2", office_details("PROGRAM OFFICE", AIR_FORCE, DOD))
            // same office name under a different subtier agency
            .with_details("CONT_AWD_A3", office_details("PROGRAM OFFICE", NAVY, DOD))
            .failing_details("CONT_AWD_A4", FetchError::Network("timeout".into()))
            .with_details("CONT_AWD_A5", AwardDetails::default());
        (api, awards)
    }

    #[tokio::test]
    async fn groups_by_agency_code_and_office_name() {
        let (api, awards) = fixture();
        let offices = resolve_funding_offices(&api, &awards, 1).await;

        assert_eq!(offices.len(), 2);
        assert_eq!(offices[0].key, "5700_PROGRAM OFFICE");
        assert_eq!(offices[0].total_obligation, 350.0);
        assert_eq!(offices[1].key, "1700_PROGRAM OFFICE");
        assert_eq!(offices[1].agency, "Department of the Navy");
        assert_eq!(offices[1].toptier_agency_code, "097");
        assert_eq!(api.calls.details.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn totals_match_award_lists() {
        let (api, awards) = fixture();
        for office in resolve_funding_offices(&api, &awards, 1).await {
            let sum: f64 = office.awards.iter().map(|a| a.amount).sum();
            assert_eq!(office.total_obligation, sum);
            assert_eq!(office.total_awards, office.awards.len());
        }
    }

    #[tokio::test]
    async fn default_concurrency_is_sequential() {
        let (api, awards) = fixture();
        resolve_funding_offices(&api, &awards, 0).await;
        assert_eq!(api.calls.max_in_flight_details.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_lookups_give_same_result() {
        let (sequential_api, awards) = fixture();
        let sequential = resolve_funding_offices(&sequential_api, &awards, 1).await;

        let (parallel_api, _) = fixture();
        let parallel = resolve_funding_offices(&parallel_api, &awards, 4).await;

        assert_eq!(sequential, parallel);
        assert!(parallel_api.calls.max_in_flight_details.load(Ordering::SeqCst) > 1);
        assert!(parallel_api.calls.max_in_flight_details.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn all_lookups_failing_is_empty_not_error() {
        let awards = vec![award("X", "Department of Defense", 1.0, "2021-01-01")];
        let api = MockSpendingApi::new();
        assert!(resolve_funding_offices(&api, &awards, 1).await.is_empty());
    }

    #[tokio::test]
    async fn grouping_by_agency_sums_offices() {
        let (api, awards) = fixture();
        let offices = resolve_funding_offices(&api, &awards, 1).await;
        let groups = group_by_agency(&offices);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "Department of the Air Force");
        assert_eq!(groups[0].total_obligation, 350.0);
        assert_eq!(groups[1].offices.len(), 1);
    }
}
