//! Join of the weekly case series with the reference station's climate
//! aggregate.
//!
//! Both sides are keyed by ISO week (Monday start). InfoDengue publishes
//! Sunday-aligned week starts; each case week is re-keyed to the ISO week
//! containing its start date so a single convention governs the join. The
//! join is inner: weeks present in only one source are dropped, never
//! imputed. Remaining per-column gaps are linearly interpolated between
//! available neighbors on both sides; precipitation gaps become zero
//! (unmeasured rain counts as no additional accumulation).

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, Weekday};
use log::{info, warn};

use crate::data_models::{CaseRecord, UnifiedWeeklyRecord, WeeklyClimateRecord};
use crate::errors::PipelineError;

/// Build the unified weekly dataset for one reference station.
pub fn unify(
    cases: &[CaseRecord],
    weekly: &[WeeklyClimateRecord],
    station_code: &str,
) -> Result<Vec<UnifiedWeeklyRecord>, PipelineError> {
    let climate: BTreeMap<(i32, u32), &WeeklyClimateRecord> = weekly
        .iter()
        .filter(|r| r.station_code == station_code)
        .map(|r| (r.week_key(), r))
        .collect();

    let mut rows = Vec::new();
    let mut seen_weeks = BTreeSet::new();
    for case in cases {
        let key = case.week_key();
        if !seen_weeks.insert(key) {
            continue;
        }
        let Some(record) = climate.get(&key) else {
            continue;
        };
        let Some(week_start) = NaiveDate::from_isoywd_opt(key.0, key.1, Weekday::Mon) else {
            warn!("week key {key:?} has no calendar date, dropping");
            continue;
        };
        rows.push(UnifiedWeeklyRecord {
            week_start,
            cases: case.cases,
            rain_sum: record.precipitation_sum,
            temp_mean: record.temperature_mean,
            humidity_mean: record.humidity_mean,
            pressure_mean: record.pressure_mean,
        });
    }

    if rows.is_empty() {
        return Err(PipelineError::EmptyIntersection {
            case_weeks: seen_weeks.len(),
            climate_weeks: climate.len(),
        });
    }

    rows.sort_by_key(|r| r.week_start);
    fill_gaps(&mut rows);

    info!(
        "unified dataset: {} weeks ({} case weeks, {} climate weeks for station {})",
        rows.len(),
        seen_weeks.len(),
        climate.len(),
        station_code
    );
    Ok(rows)
}

fn fill_gaps(rows: &mut [UnifiedWeeklyRecord]) {
    let columns: [(fn(&UnifiedWeeklyRecord) -> Option<f64>, fn(&mut UnifiedWeeklyRecord, Option<f64>)); 3] = [
        (|r| r.temp_mean, |r, v| r.temp_mean = v),
        (|r| r.humidity_mean, |r, v| r.humidity_mean = v),
        (|r| r.pressure_mean, |r, v| r.pressure_mean = v),
    ];
    for (get, set) in columns {
        let mut values: Vec<Option<f64>> = rows.iter().map(get).collect();
        interpolate_linear(&mut values);
        for (row, value) in rows.iter_mut().zip(values) {
            set(row, value);
        }
    }
    for row in rows.iter_mut() {
        if row.rain_sum.is_none() {
            row.rain_sum = Some(0.0);
        }
    }
}

/// Fill runs of missing values that have a defined neighbor on both sides.
/// Leading and trailing gaps stay missing.
pub(crate) fn interpolate_linear(values: &mut [Option<f64>]) {
    let n = values.len();
    let mut i = 0;
    while i < n {
        if values[i].is_some() {
            i += 1;
            continue;
        }
        let start = i;
        let mut end = i;
        while end < n && values[end].is_none() {
            end += 1;
        }
        if start > 0 && end < n {
            if let (Some(left), Some(right)) = (values[start - 1], values[end]) {
                let span = (end - start + 1) as f64;
                for (step, idx) in (start..end).enumerate() {
                    let frac = (step + 1) as f64 / span;
                    values[idx] = Some(left + (right - left) * frac);
                }
            }
        }
        i = end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Datelike;

    fn case(year: i32, week: u32, cases: u32) -> CaseRecord {
        CaseRecord {
            week_start: NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).unwrap(),
            cases,
        }
    }

    fn climate(week: u32, rain: Option<f64>, temp: Option<f64>) -> WeeklyClimateRecord {
        WeeklyClimateRecord {
            station_code: "A001".to_string(),
            year: 2023,
            week,
            station_name: None,
            state: None,
            region: None,
            latitude: None,
            longitude: None,
            altitude_m: None,
            precipitation_sum: rain,
            temperature_mean: temp,
            temperature_min: temp,
            temperature_max: temp,
            temperature_std: None,
            humidity_mean: Some(70.0),
            humidity_min: None,
            humidity_max: None,
            humidity_std: None,
            pressure_mean: Some(888.0),
        }
    }

    #[test]
    fn join_keeps_only_the_week_intersection() {
        let cases: Vec<_> = (1..=4).map(|w| case(2023, w, 10 * w)).collect();
        let weekly: Vec<_> = (3..=6).map(|w| climate(w, Some(1.0), Some(25.0))).collect();

        let unified = unify(&cases, &weekly, "A001").unwrap();
        let weeks: Vec<u32> = unified
            .iter()
            .map(|r| r.week_start.iso_week().week())
            .collect();
        assert_eq!(weeks, vec![3, 4]);
        assert_eq!(unified[0].cases, 30);
        assert_eq!(unified[1].cases, 40);
    }

    #[test]
    fn empty_intersection_is_a_typed_error() {
        let cases = vec![case(2023, 1, 10)];
        let weekly = vec![climate(40, Some(1.0), Some(25.0))];
        assert!(matches!(
            unify(&cases, &weekly, "A001"),
            Err(PipelineError::EmptyIntersection { .. })
        ));
    }

    #[test]
    fn other_stations_do_not_join() {
        let cases = vec![case(2023, 1, 10)];
        let weekly = vec![climate(1, Some(1.0), Some(25.0))];
        assert!(unify(&cases, &weekly, "A999").is_err());
    }

    #[test]
    fn sunday_aligned_case_weeks_rekey_to_iso() {
        // 2023-01-08 is a Sunday; the ISO week containing it is 2023-W01.
        let cases = vec![CaseRecord {
            week_start: NaiveDate::from_ymd_opt(2023, 1, 8).unwrap(),
            cases: 7,
        }];
        let weekly = vec![climate(1, Some(1.0), Some(25.0))];

        let unified = unify(&cases, &weekly, "A001").unwrap();
        assert_eq!(
            unified[0].week_start,
            NaiveDate::from_ymd_opt(2023, 1, 2).unwrap()
        );
    }

    #[test]
    fn interior_climate_gaps_interpolate_and_rain_fills_zero() {
        let cases: Vec<_> = (1..=3).map(|w| case(2023, w, 5)).collect();
        let weekly = vec![
            climate(1, Some(2.0), Some(20.0)),
            climate(2, None, None),
            climate(3, Some(4.0), Some(26.0)),
        ];

        let unified = unify(&cases, &weekly, "A001").unwrap();
        assert_relative_eq!(unified[1].temp_mean.unwrap(), 23.0);
        assert_relative_eq!(unified[1].rain_sum.unwrap(), 0.0);
    }

    #[test]
    fn interpolation_is_bounded_on_both_ends() {
        let mut values = vec![None, Some(1.0), None, None, Some(4.0), None];
        interpolate_linear(&mut values);
        assert_eq!(values[0], None);
        assert_relative_eq!(values[2].unwrap(), 2.0);
        assert_relative_eq!(values[3].unwrap(), 3.0);
        assert_eq!(values[5], None);
    }
}
