//! Weekly aggregation of sub-daily station readings.
//!
//! Pure grouped reduction keyed by (station, ISO year, ISO week). Each
//! tracked variable is reduced with the aggregator matching its physical
//! meaning: precipitation is additive and summed, temperature and humidity
//! are intensive and summarized with mean/min/max/std, pressure with mean.
//! No cross-station computation happens here.

use std::collections::BTreeMap;

use chrono::Datelike;
use log::info;

use crate::data_models::{
    ClimateVariable, ParsedStationFile, StationMetadata, WeeklyClimateRecord,
};

struct Summary {
    sum: f64,
    mean: f64,
    min: f64,
    max: f64,
    /// Sample standard deviation; undefined for a single observation.
    std: Option<f64>,
}

fn summarize(values: &[f64]) -> Option<Summary> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let sum: f64 = values.iter().sum();
    let mean = sum / n;
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let std = if values.len() > 1 {
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        Some(var.sqrt())
    } else {
        None
    };
    Some(Summary {
        sum,
        mean,
        min,
        max,
        std,
    })
}

/// Reduce all parsed files into one record per (station, year, week),
/// ordered by that key. Station descriptive fields carry the first observed
/// value for the station.
pub fn aggregate_weekly(files: &[ParsedStationFile]) -> Vec<WeeklyClimateRecord> {
    let mut station_meta: BTreeMap<String, StationMetadata> = BTreeMap::new();
    let mut groups: BTreeMap<(String, i32, u32), BTreeMap<ClimateVariable, Vec<f64>>> =
        BTreeMap::new();

    for file in files {
        station_meta
            .entry(file.station_code.clone())
            .or_insert_with(|| file.metadata.clone());
        for reading in &file.readings {
            let iso = reading.timestamp.date().iso_week();
            let group = groups
                .entry((file.station_code.clone(), iso.year(), iso.week()))
                .or_default();
            for (var, value) in &reading.values {
                group.entry(*var).or_default().push(*value);
            }
        }
    }

    let records: Vec<WeeklyClimateRecord> = groups
        .into_iter()
        .map(|((station_code, year, week), vars)| {
            let meta = station_meta.get(&station_code).cloned().unwrap_or_default();
            let precip = vars
                .get(&ClimateVariable::Precipitation)
                .and_then(|v| summarize(v));
            let temp = vars
                .get(&ClimateVariable::Temperature)
                .and_then(|v| summarize(v));
            let humidity = vars
                .get(&ClimateVariable::Humidity)
                .and_then(|v| summarize(v));
            let pressure = vars
                .get(&ClimateVariable::Pressure)
                .and_then(|v| summarize(v));

            WeeklyClimateRecord {
                station_code,
                year,
                week,
                station_name: meta.station_name,
                state: meta.state,
                region: meta.region,
                latitude: meta.latitude,
                longitude: meta.longitude,
                altitude_m: meta.altitude_m,
                precipitation_sum: precip.as_ref().map(|s| s.sum),
                temperature_mean: temp.as_ref().map(|s| s.mean),
                temperature_min: temp.as_ref().map(|s| s.min),
                temperature_max: temp.as_ref().map(|s| s.max),
                temperature_std: temp.as_ref().and_then(|s| s.std),
                humidity_mean: humidity.as_ref().map(|s| s.mean),
                humidity_min: humidity.as_ref().map(|s| s.min),
                humidity_max: humidity.as_ref().map(|s| s.max),
                humidity_std: humidity.as_ref().and_then(|s| s.std),
                pressure_mean: pressure.as_ref().map(|s| s.mean),
            }
        })
        .collect();

    info!(
        "aggregated {} station-weeks from {} files",
        records.len(),
        files.len()
    );
    records
}
