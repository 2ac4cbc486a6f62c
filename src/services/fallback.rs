// src/services/fallback.rs
//! Precomputed example data served when the upstream API is unavailable.
use std::collections::BTreeMap;

use crate::models::{
    Agency, Award, DataSource, DateRange, EntityView, FundingOffice, FundingOfficeAnalysis,
    MarketOverview, OfficeAward, SelectionMode, TimePeriod, TimelineDataPoint,
};
use crate::services::offices::group_by_agency;
use crate::services::overview::yoy_growth;
use crate::services::timeline::reconcile_timeline;

/// Quarterly totals in billions, FY2020 Q1 through FY2024 Q4.
const QUARTERLY_BILLIONS: [f64; 20] = [
    1.5, 1.8, 2.1, 2.3, 2.5, 2.9, 3.2, 3.5, 3.8, 4.1, 4.4, 4.7, 5.0, 5.3, 5.6, 5.9, 6.2, 6.5, 6.8,
    7.1,
];

const AGENCIES: [(&str, &str, i64, f64); 10] = [
    ("Department of Defense", "097", 1173, 45_000_000_000.0),
    ("Department of Homeland Security", "070", 1456, 12_000_000_000.0),
    ("Department of the Air Force", "057", 1234, 8_500_000_000.0),
    ("Department of the Navy", "017", 5678, 6_200_000_000.0),
    ("Department of the Army", "021", 9012, 4_800_000_000.0),
    ("National Aeronautics and Space Administration", "080", 3456, 3_200_000_000.0),
    ("Department of Energy", "089", 7890, 2_100_000_000.0),
    ("Department of Veterans Affairs", "036", 2345, 1_800_000_000.0),
    ("Department of Transportation", "069", 6789, 1_200_000_000.0),
    ("Department of Commerce", "013", 1357, 900_000_000.0),
];

// (award id, recipient, amount, description, start, end, awarding agency, funding office)
const AWARDS: [(&str, &str, f64, &str, &str, &str, &str, usize); 6] = [
    (
        "FA8750-24-C-0123",
        "LOCKHEED MARTIN CORPORATION",
        156_000_000.0,
        "ELECTRONIC WARFARE SYSTEMS",
        "2024-06-15",
        "2026-06-14",
        "Department of the Air Force",
        0,
    ),
    (
        "FA8807-23-C-0042",
        "THE BOEING COMPANY",
        97_000_000.0,
        "SATELLITE COMMUNICATIONS TERMINALS",
        "2023-03-10",
        "2025-03-09",
        "Department of the Air Force",
        0,
    ),
    (
        "W91ZLK24P0063",
        "RAYTHEON COMPANY",
        188_000_000.0,
        "RADAR EQUIPMENT DEVELOPMENT",
        "2024-08-27",
        "2025-08-26",
        "Department of the Army",
        1,
    ),
    (
        "W900KK-23-C-0007",
        "L3HARRIS TECHNOLOGIES, INC.",
        58_000_000.0,
        "TRAINING SIMULATION SYSTEMS",
        "2022-12-05",
        "2024-12-04",
        "Department of the Army",
        1,
    ),
    (
        "N00024-24-C-4567",
        "NORTHROP GRUMMAN CORPORATION",
        134_000_000.0,
        "CYBERSECURITY INFRASTRUCTURE",
        "2024-05-01",
        "2025-04-30",
        "Department of the Navy",
        2,
    ),
    (
        "N00019-23-C-1020",
        "GENERAL DYNAMICS MISSION SYSTEMS",
        72_000_000.0,
        "SHIPBOARD ELECTRONIC SUPPORT",
        "2023-11-20",
        "2025-11-19",
        "Department of the Navy",
        2,
    ),
];

// (office, subtier agency, subtier code)
const OFFICES: [(&str, &str, &str); 3] = [
    ("AFLCMC/HBAN", "Department of the Air Force", "5700"),
    ("PEO STRI", "Department of the Army", "2100"),
    ("NAVAIR PMA-265", "Department of the Navy", "1700"),
];

fn timeline() -> Vec<TimelineDataPoint> {
    QUARTERLY_BILLIONS
        .iter()
        .enumerate()
        .map(|(i, billions)| TimelineDataPoint {
            time_period: TimePeriod::new(2020 + (i / 4) as i32, (i % 4) as u8 + 1),
            aggregated_amount: billions * 1_000_000_000.0,
        })
        .collect()
}

fn agencies() -> Vec<Agency> {
    AGENCIES
        .iter()
        .map(|(name, code, id, amount)| Agency {
            amount: *amount,
            name: name.to_string(),
            code: code.to_string(),
            id: *id,
        })
        .collect()
}

fn awards() -> Vec<Award> {
    AWARDS
        .iter()
        .map(|(id, recipient, amount, description, start, end, agency, _)| Award {
            award_id: id.to_string(),
            recipient_name: recipient.to_string(),
            amount: *amount,
            description: description.to_string(),
            start_date: start.to_string(),
            end_date: end.to_string(),
            awarding_agency: agency.to_string(),
            funding_agency: agency.to_string(),
            generated_internal_id: format!("CONT_AWD_{}_9700_-NONE-_-NONE-", id),
        })
        .collect()
}

/// Offices with totals summed from the sample awards they funded.
fn funding_offices(awards: &[Award]) -> Vec<FundingOffice> {
    let mut offices: Vec<FundingOffice> = OFFICES
        .iter()
        .enumerate()
        .map(|(index, (name, agency, code))| {
            let funded: Vec<OfficeAward> = AWARDS
                .iter()
                .zip(awards)
                .filter(|(row, _)| row.7 == index)
                .map(|(_, award)| OfficeAward {
                    id: award.award_id.clone(),
                    internal_id: award.generated_internal_id.clone(),
                    amount: award.amount,
                    description: award.description.clone(),
                    recipient: award.recipient_name.clone(),
                })
                .collect();

            FundingOffice {
                key: FundingOffice::composite_key(code, name),
                name: name.to_string(),
                agency: agency.to_string(),
                agency_code: code.to_string(),
                toptier_agency: "Department of Defense".to_string(),
                toptier_agency_code: "097".to_string(),
                total_awards: funded.len(),
                total_obligation: funded.iter().map(|a| a.amount).sum(),
                awards: funded,
            }
        })
        .collect();

    offices.sort_by(|a, b| b.total_obligation.total_cmp(&a.total_obligation));
    offices
}

fn view<'a>(
    name: &str,
    awards: impl Iterator<Item = &'a Award> + Clone,
    baseline: &[TimelineDataPoint],
) -> EntityView {
    EntityView {
        name: name.to_string(),
        timeline: reconcile_timeline(awards.clone(), baseline).unwrap_or_default(),
        awards: awards.cloned().collect(),
    }
}

/// Example bundle for `market`, with a view for every agency and office.
pub fn example_overview(market: &str, range: DateRange, mode: SelectionMode) -> MarketOverview {
    let timeline_data = timeline();
    let agency_breakdown = agencies();
    let awards = awards();
    let funding_offices = funding_offices(&awards);

    let agency_views: BTreeMap<String, EntityView> = agency_breakdown
        .iter()
        .map(|agency| {
            let funded = awards.iter().filter(|a| a.awarding_agency == agency.name);
            (agency.key().to_string(), view(&agency.name, funded, &timeline_data))
        })
        .collect();

    let office_views: BTreeMap<String, EntityView> = funding_offices
        .iter()
        .map(|office| {
            let funded = awards
                .iter()
                .filter(|a| office.awards.iter().any(|o| o.internal_id == a.generated_internal_id));
            (office.key.clone(), view(&office.name, funded, &timeline_data))
        })
        .collect();

    MarketOverview {
        market_name: market.to_string(),
        date_range: range,
        mode,
        total_market_size: agency_breakdown.iter().map(|a| a.amount).sum(),
        yoy_growth: yoy_growth(&timeline_data),
        timeline_data,
        agency_breakdown,
        awards,
        agency_views,
        funding_offices,
        office_views,
        data_source: DataSource::Fallback,
    }
}

pub fn example_funding_office_analysis(market: &str) -> FundingOfficeAnalysis {
    let funding_offices = funding_offices(&awards());
    FundingOfficeAnalysis {
        market_name: market.to_string(),
        offices_by_agency: group_by_agency(&funding_offices),
        funding_offices,
        data_source: DataSource::Fallback,
    }
}
