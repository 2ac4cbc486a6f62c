// src/services/timeline.rs
use log::{debug, warn};
use std::collections::HashMap;

use crate::error::ReconcileError;
use crate::models::{Award, TimePeriod, TimelineDataPoint};
use crate::services::fiscal::to_fiscal_period;

/// Re-derive a quarter series from `awards`, aligned to the baseline buckets.
///
/// Output has exactly the baseline's periods, in baseline order, zero-filled.
/// Awards whose quarter is not in the baseline (or whose start date does not
/// parse) are counted in the first baseline bucket, so the series total always
/// equals the award total. With an empty baseline the result is empty.
pub fn reconcile_timeline<'a, I>(
    awards: I,
    baseline: &[TimelineDataPoint],
) -> Result<Vec<TimelineDataPoint>, ReconcileError>
where
    I: IntoIterator<Item = &'a Award>,
{
    let Some(earliest) = baseline.first().map(|p| p.time_period) else {
        return Ok(Vec::new());
    };

    let mut totals: HashMap<TimePeriod, f64> =
        baseline.iter().map(|p| (p.time_period, 0.0)).collect();

    for award in awards {
        if !award.amount.is_finite() {
            return Err(ReconcileError::NonFiniteAmount {
                award_id: award.award_id.clone(),
            });
        }

        let period = match award.parsed_start_date() {
            Some(date) => to_fiscal_period(date),
            None => {
                warn!(
                    "Award {} has unparseable start date '{}', counting it in {}",
                    award.award_id, award.start_date, earliest
                );
                earliest
            }
        };

        let bucket = if totals.contains_key(&period) {
            period
        } else {
            debug!(
                "Award {} ({}) falls outside the timeline, counting it in {}",
                award.award_id, period, earliest
            );
            earliest
        };

        if let Some(total) = totals.get_mut(&bucket) {
            *total += award.amount;
        }
    }

    Ok(baseline
        .iter()
        .map(|p| TimelineDataPoint {
            time_period: p.time_period,
            aggregated_amount: totals.get(&p.time_period).copied().unwrap_or(0.0),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mock::{award, point};

    #[test]
    fn out_of_window_award_folds_into_earliest_bucket() {
        let baseline = vec![point(2020, 1, 0.0), point(2020, 2, 0.0)];
        let awards = vec![award("X", "A", 100.0, "2019-09-15")];

        let result = reconcile_timeline(&awards, &baseline).unwrap();

        assert_eq!(result, vec![point(2020, 1, 100.0), point(2020, 2, 0.0)]);
    }

    #[test]
    fn buckets_follow_baseline_and_zero_fill() {
        let baseline = vec![
            point(2021, 1, 10.0),
            point(2021, 2, 20.0),
            point(2021, 3, 30.0),
            point(2021, 4, 40.0),
        ];
        let awards = vec![
            award("A", "A", 5.0, "2020-11-02"),
            award("B", "A", 7.0, "2021-08-31"),
            award("C", "A", 1.0, "2021-07-01"),
        ];

        let result = reconcile_timeline(&awards, &baseline).unwrap();

        let amounts: Vec<f64> = result.iter().map(|p| p.aggregated_amount).collect();
        assert_eq!(amounts, vec![5.0, 0.0, 0.0, 8.0]);
        let periods: Vec<TimePeriod> = result.iter().map(|p| p.time_period).collect();
        let expected: Vec<TimePeriod> = baseline.iter().map(|p| p.time_period).collect();
        assert_eq!(periods, expected);
    }

    #[test]
    fn totals_are_conserved() {
        let baseline: Vec<TimelineDataPoint> = (1..=4).map(|q| point(2022, q, 0.0)).collect();
        let dates = ["2021-10-05", "2022-01-20", "2018-03-03", "2030-01-01", "not a date", "2022-09-30"];
        let awards: Vec<Award> = dates
            .iter()
            .enumerate()
            .map(|(i, d)| award(&format!("A{}", i), "A", 0.25 * (i as f64 + 1.0), d))
            .collect();

        let result = reconcile_timeline(&awards, &baseline).unwrap();

        let series: f64 = result.iter().map(|p| p.aggregated_amount).sum();
        let input: f64 = awards.iter().map(|a| a.amount).sum();
        assert_eq!(series, input);
    }

    #[test]
    fn empty_baseline_yields_empty_series() {
        let awards = vec![award("X", "A", 100.0, "2019-09-15")];
        assert!(reconcile_timeline(&awards, &[]).unwrap().is_empty());
    }

    #[test]
    fn non_finite_amount_is_rejected() {
        let baseline = vec![point(2020, 1, 0.0)];
        let awards = vec![award("BAD", "A", f64::NAN, "2019-10-15")];
        assert_eq!(
            reconcile_timeline(&awards, &baseline),
            Err(ReconcileError::NonFiniteAmount { award_id: "BAD".into() })
        );
    }
}
