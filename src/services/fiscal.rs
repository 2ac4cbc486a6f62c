// src/services/fiscal.rs
use chrono::{Datelike, NaiveDate, Utc};
use chrono_tz::US::Eastern;
use serde::{Deserialize, Serialize};

use crate::models::{DateRange, SelectionMode, TimePeriod};

/// One `{start_date, end_date}` entry of an upstream `time_period` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Map a calendar date onto the federal fiscal calendar.
pub fn to_fiscal_period(date: NaiveDate) -> TimePeriod {
    let month = date.month0();
    if month >= 9 {
        // Oct-Dec open the next fiscal year
        TimePeriod::new(date.year() + 1, (month - 8).div_ceil(3) as u8)
    } else {
        TimePeriod::new(date.year(), (month + 4).div_ceil(3) as u8)
    }
}

pub fn fiscal_year(date: NaiveDate) -> i32 {
    to_fiscal_period(date).fiscal_year
}

/// Expand a requested range into the periods sent upstream.
///
/// Quick selections snap to whole fiscal years (Oct 1 – Sep 30) covering the
/// range; custom selections pass the bounds through untouched.
pub fn to_query_periods(range: &DateRange, mode: SelectionMode) -> Vec<QueryPeriod> {
    match mode {
        SelectionMode::Custom => vec![QueryPeriod {
            start_date: range.start_date,
            end_date: range.end_date,
        }],
        SelectionMode::Quick => {
            let first = fiscal_year(range.start_date);
            let last = fiscal_year(range.end_date);
            (first..=last)
                .filter_map(|fy| {
                    Some(QueryPeriod {
                        start_date: NaiveDate::from_ymd_opt(fy - 1, 10, 1)?,
                        end_date: NaiveDate::from_ymd_opt(fy, 9, 30)?,
                    })
                })
                .collect()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuickRange {
    Last5Years,
    Last3Years,
    CurrentYear,
    PreviousYear,
}

impl QuickRange {
    /// Bounds relative to the calendar year of `today`.
    pub fn date_range(self, today: NaiveDate) -> Option<DateRange> {
        let year = today.year();
        let (start_year, end_year) = match self {
            QuickRange::Last5Years => (year - 5, year + 1),
            QuickRange::Last3Years => (year - 3, year + 1),
            QuickRange::CurrentYear => (year, year + 1),
            QuickRange::PreviousYear => (year - 1, year),
        };
        Some(DateRange::new(
            NaiveDate::from_ymd_opt(start_year, 10, 1)?,
            NaiveDate::from_ymd_opt(end_year, 9, 30)?,
        ))
    }
}

/// Today's date in Washington, which is what the fiscal calendar follows.
pub fn federal_today() -> NaiveDate {
    Utc::now().with_timezone(&Eastern).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn october_first_opens_next_fiscal_year() {
        for year in [1999, 2019, 2024] {
            assert_eq!(to_fiscal_period(date(year, 10, 1)), TimePeriod::new(year + 1, 1));
            assert_eq!(to_fiscal_period(date(year, 9, 30)), TimePeriod::new(year, 4));
        }
    }

    #[test]
    fn every_month_maps_to_expected_quarter() {
        let expected = [2, 2, 2, 3, 3, 3, 4, 4, 4, 1, 1, 1];
        for (i, quarter) in expected.iter().enumerate() {
            let period = to_fiscal_period(date(2022, i as u32 + 1, 15));
            assert_eq!(period.quarter, *quarter, "month {}", i + 1);
            let fy = if i >= 9 { 2023 } else { 2022 };
            assert_eq!(period.fiscal_year, fy);
        }
    }

    #[test]
    fn quick_selection_snaps_to_fiscal_years() {
        let range = DateRange::new(date(2020, 1, 1), date(2025, 9, 30));
        let periods = to_query_periods(&range, SelectionMode::Quick);

        assert_eq!(periods.len(), 6);
        assert_eq!(periods[0].start_date, date(2019, 10, 1));
        assert_eq!(periods[5].end_date, date(2025, 9, 30));
        for p in &periods {
            assert!(p.start_date.to_string().ends_with("-10-01"));
            assert!(p.end_date.to_string().ends_with("-09-30"));
        }
    }

    #[test]
    fn same_fiscal_year_yields_single_period() {
        let range = DateRange::new(date(2022, 11, 3), date(2023, 8, 17));
        let periods = to_query_periods(&range, SelectionMode::Quick);
        assert_eq!(
            periods,
            vec![QueryPeriod {
                start_date: date(2022, 10, 1),
                end_date: date(2023, 9, 30)
            }]
        );
    }

    #[test]
    fn custom_selection_keeps_literal_bounds() {
        let range = DateRange::new(date(2021, 2, 14), date(2023, 6, 1));
        let periods = to_query_periods(&range, SelectionMode::Custom);
        assert_eq!(
            periods,
            vec![QueryPeriod {
                start_date: date(2021, 2, 14),
                end_date: date(2023, 6, 1)
            }]
        );
    }

    #[test]
    fn quick_ranges_are_fiscal_aligned() {
        let today = date(2026, 3, 10);
        let last5 = QuickRange::Last5Years.date_range(today).unwrap();
        assert_eq!(last5, DateRange::new(date(2021, 10, 1), date(2027, 9, 30)));

        let previous = QuickRange::PreviousYear.date_range(today).unwrap();
        assert_eq!(previous, DateRange::new(date(2025, 10, 1), date(2026, 9, 30)));

        let current = QuickRange::CurrentYear.date_range(today).unwrap();
        assert_eq!(to_query_periods(&current, SelectionMode::Quick).len(), 1);
    }
}
