//! Lagged, rolling and risk feature synthesis over the weekly aggregate.
//!
//! Lags and rolling windows are computed per station, ordered by
//! (year, week), and never cross a station boundary. Lag columns are
//! undefined for the first `k` weeks of a station's series; rolling
//! aggregates instead use a partial window (minimum of one observation) so
//! the series start degrades gracefully. The asymmetry is deliberate: a
//! partial rolling sum is still a physical quantity, a partial lag is not.

use std::collections::BTreeMap;

use log::info;

use crate::config::FeatureConfig;
use crate::data_models::{LaggedFeatureRecord, WeeklyClimateRecord};

/// Mosquito-suitability thresholds (Xavier et al. 2021, PLOS ONE).
const TEMP_FAVORABLE_MIN_C: f64 = 22.0;
const TEMP_IDEAL_MIN_C: f64 = 25.0;
const TEMP_IDEAL_MAX_C: f64 = 30.0;
const RAIN_RELEVANT_MM: f64 = 10.0;
const HUMIDITY_FAVORABLE_PCT: f64 = 60.0;
const HEAVY_ACCUM_MM: f64 = 80.0;
/// The heavy-accumulation indicator always looks at 8 weeks of rain,
/// independent of the configured rolling windows.
const HEAVY_ACCUM_WINDOW_WEEKS: usize = 8;

#[derive(Clone, Copy)]
enum RollingStat {
    Sum,
    Mean,
}

/// Trailing-window aggregate with a minimum window of one observation.
/// Missing values inside the window are skipped; the result is undefined
/// only when the whole window is missing.
fn rolling(values: &[Option<f64>], window: usize, stat: RollingStat) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        let start = (i + 1).saturating_sub(window);
        let present: Vec<f64> = values[start..=i].iter().filter_map(|v| *v).collect();
        if present.is_empty() {
            out.push(None);
        } else {
            let sum: f64 = present.iter().sum();
            out.push(Some(match stat {
                RollingStat::Sum => sum,
                RollingStat::Mean => sum / present.len() as f64,
            }));
        }
    }
    out
}

fn lagged(values: &[Option<f64>], lag: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| if i >= lag { values[i - lag] } else { None })
        .collect()
}

/// Synthesize the feature set for every station-week.
pub fn synthesize_features(
    records: &[WeeklyClimateRecord],
    config: &FeatureConfig,
) -> Vec<LaggedFeatureRecord> {
    // Station-local series, ordered by (year, week).
    let mut stations: BTreeMap<&str, Vec<&WeeklyClimateRecord>> = BTreeMap::new();
    for record in records {
        stations
            .entry(record.station_code.as_str())
            .or_default()
            .push(record);
    }

    let mut out = Vec::with_capacity(records.len());
    for (_, mut series) in stations {
        series.sort_by_key(|r| (r.year, r.week));

        let columns: BTreeMap<&str, Vec<Option<f64>>> = WeeklyClimateRecord::NUMERIC_COLUMNS
            .iter()
            .map(|col| (*col, series.iter().map(|r| r.numeric_value(col)).collect()))
            .collect();

        let mut lag_columns: BTreeMap<String, Vec<Option<f64>>> = BTreeMap::new();
        for (col, values) in &columns {
            for k in &config.lags {
                lag_columns.insert(format!("{col}_lag{k}"), lagged(values, *k));
            }
        }

        let precip = &columns["precipitation_sum"];
        let temp = &columns["temperature_mean"];
        let mut rolling_columns: BTreeMap<String, Vec<Option<f64>>> = BTreeMap::new();
        for w in &config.precip_windows {
            rolling_columns.insert(
                format!("precip_accum_{w}w"),
                rolling(precip, *w, RollingStat::Sum),
            );
        }
        for w in &config.temp_windows {
            rolling_columns.insert(
                format!("temp_mean_{w}w"),
                rolling(temp, *w, RollingStat::Mean),
            );
        }
        let accum8 = rolling(precip, HEAVY_ACCUM_WINDOW_WEEKS, RollingStat::Sum);

        for (i, weekly) in series.iter().enumerate() {
            let lags: BTreeMap<String, Option<f64>> = lag_columns
                .iter()
                .map(|(name, values)| (name.clone(), values[i]))
                .collect();
            let rolling: BTreeMap<String, Option<f64>> = rolling_columns
                .iter()
                .map(|(name, values)| (name.clone(), values[i]))
                .collect();

            let temp_favorable = weekly
                .temperature_mean
                .is_some_and(|t| t >= TEMP_FAVORABLE_MIN_C);
            let temp_ideal = weekly
                .temperature_mean
                .is_some_and(|t| (TEMP_IDEAL_MIN_C..=TEMP_IDEAL_MAX_C).contains(&t));
            let rain_relevant = weekly
                .precipitation_sum
                .is_some_and(|p| p > RAIN_RELEVANT_MM);
            let humidity_favorable = weekly
                .humidity_mean
                .is_some_and(|h| h > HUMIDITY_FAVORABLE_PCT);
            let heavy_accum = accum8[i].is_some_and(|a| a > HEAVY_ACCUM_MM);

            // The ideal-temperature indicator is reported but does not enter
            // the sum, keeping the index in 0..=4.
            let risk_index = u8::from(temp_favorable)
                + u8::from(rain_relevant)
                + u8::from(humidity_favorable)
                + u8::from(heavy_accum);

            out.push(LaggedFeatureRecord {
                weekly: (*weekly).clone(),
                lags,
                rolling,
                temp_favorable,
                temp_ideal,
                rain_relevant,
                humidity_favorable,
                risk_index,
            });
        }
    }

    info!(
        "synthesized {} lag and {} rolling columns for {} station-weeks",
        WeeklyClimateRecord::NUMERIC_COLUMNS.len() * config.lags.len(),
        config.precip_windows.len() + config.temp_windows.len(),
        out.len()
    );
    out
}
