use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Climate variables tracked by the pipeline. Raw columns that map to none
/// of these are dropped at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClimateVariable {
    Precipitation,
    Temperature,
    Humidity,
    Pressure,
}

impl ClimateVariable {
    pub const ALL: [ClimateVariable; 4] = [
        ClimateVariable::Precipitation,
        ClimateVariable::Temperature,
        ClimateVariable::Humidity,
        ClimateVariable::Pressure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClimateVariable::Precipitation => "precipitation",
            ClimateVariable::Temperature => "temperature",
            ClimateVariable::Humidity => "humidity",
            ClimateVariable::Pressure => "pressure",
        }
    }
}

/// Which numeric/locale convention a raw station file turned out to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericConvention {
    /// Semicolon field separator, decimal comma (INMET default).
    SemicolonCommaDecimal,
    /// Comma field separator, decimal point (fallback).
    CommaPointDecimal,
}

impl NumericConvention {
    pub fn as_str(&self) -> &'static str {
        match self {
            NumericConvention::SemicolonCommaDecimal => "semicolon/decimal-comma",
            NumericConvention::CommaPointDecimal => "comma/decimal-point",
        }
    }
}

/// Station descriptive metadata assembled from the filename and the 8-line
/// file header. All fields are optional; header values win over filename
/// values when both are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationMetadata {
    pub station_code: Option<String>,
    pub station_name: Option<String>,
    pub state: Option<String>,
    pub region: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude_m: Option<f64>,
    pub founded: Option<NaiveDate>,
}

impl StationMetadata {
    /// Fill fields still missing here from `other`.
    pub fn fill_missing_from(&mut self, other: &StationMetadata) {
        if self.station_code.is_none() {
            self.station_code = other.station_code.clone();
        }
        if self.station_name.is_none() {
            self.station_name = other.station_name.clone();
        }
        if self.state.is_none() {
            self.state = other.state.clone();
        }
        if self.region.is_none() {
            self.region = other.region.clone();
        }
        if self.latitude.is_none() {
            self.latitude = other.latitude;
        }
        if self.longitude.is_none() {
            self.longitude = other.longitude;
        }
        if self.altitude_m.is_none() {
            self.altitude_m = other.altitude_m;
        }
        if self.founded.is_none() {
            self.founded = other.founded;
        }
    }
}

/// One sub-daily observation. Only variables with a parseable, non-missing
/// value are present in `values`; rows with an unparseable timestamp never
/// become a `StationReading` at all.
#[derive(Debug, Clone)]
pub struct StationReading {
    pub timestamp: NaiveDateTime,
    pub values: BTreeMap<ClimateVariable, f64>,
}

/// Everything extracted from one raw station file.
#[derive(Debug, Clone)]
pub struct ParsedStationFile {
    pub station_code: String,
    pub metadata: StationMetadata,
    pub readings: Vec<StationReading>,
    pub convention: NumericConvention,
    /// Body rows dropped for an unparseable timestamp.
    pub rows_skipped: usize,
}

/// One row per (station, ISO year, ISO week). Aggregate columns are the
/// flattened `variable_aggregator` set the downstream stages consume.
#[derive(Debug, Clone, Serialize)]
pub struct WeeklyClimateRecord {
    pub station_code: String,
    pub year: i32,
    pub week: u32,
    pub station_name: Option<String>,
    pub state: Option<String>,
    pub region: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude_m: Option<f64>,
    pub precipitation_sum: Option<f64>,
    pub temperature_mean: Option<f64>,
    pub temperature_min: Option<f64>,
    pub temperature_max: Option<f64>,
    pub temperature_std: Option<f64>,
    pub humidity_mean: Option<f64>,
    pub humidity_min: Option<f64>,
    pub humidity_max: Option<f64>,
    pub humidity_std: Option<f64>,
    pub pressure_mean: Option<f64>,
}

impl WeeklyClimateRecord {
    /// Numeric columns eligible for lagging, in artifact order.
    pub const NUMERIC_COLUMNS: [&'static str; 10] = [
        "precipitation_sum",
        "temperature_mean",
        "temperature_min",
        "temperature_max",
        "temperature_std",
        "humidity_mean",
        "humidity_min",
        "humidity_max",
        "humidity_std",
        "pressure_mean",
    ];

    pub fn numeric_value(&self, column: &str) -> Option<f64> {
        match column {
            "precipitation_sum" => self.precipitation_sum,
            "temperature_mean" => self.temperature_mean,
            "temperature_min" => self.temperature_min,
            "temperature_max" => self.temperature_max,
            "temperature_std" => self.temperature_std,
            "humidity_mean" => self.humidity_mean,
            "humidity_min" => self.humidity_min,
            "humidity_max" => self.humidity_max,
            "humidity_std" => self.humidity_std,
            "pressure_mean" => self.pressure_mean,
            _ => None,
        }
    }

    /// (ISO year, ISO week) join key.
    pub fn week_key(&self) -> (i32, u32) {
        (self.year, self.week)
    }
}

/// A weekly climate row extended with lagged, rolling and risk features.
/// Lag keys are `{column}_lag{k}`; rolling keys are `precip_accum_{w}w` and
/// `temp_mean_{w}w`.
#[derive(Debug, Clone)]
pub struct LaggedFeatureRecord {
    pub weekly: WeeklyClimateRecord,
    pub lags: BTreeMap<String, Option<f64>>,
    pub rolling: BTreeMap<String, Option<f64>>,
    pub temp_favorable: bool,
    pub temp_ideal: bool,
    pub rain_relevant: bool,
    pub humidity_favorable: bool,
    pub risk_index: u8,
}

/// One week of the surveillance series, already normalized to
/// (week-start date, case count).
#[derive(Debug, Clone, PartialEq)]
pub struct CaseRecord {
    pub week_start: NaiveDate,
    pub cases: u32,
}

impl CaseRecord {
    /// (ISO year, ISO week) join key, consistent with the climate side.
    pub fn week_key(&self) -> (i32, u32) {
        let iso = self.week_start.iso_week();
        (iso.year(), iso.week())
    }
}

/// One row per calendar week of the joined dataset. `week_start` is the
/// Monday of the ISO week.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedWeeklyRecord {
    pub week_start: NaiveDate,
    pub cases: u32,
    pub rain_sum: Option<f64>,
    pub temp_mean: Option<f64>,
    pub humidity_mean: Option<f64>,
    pub pressure_mean: Option<f64>,
}

impl UnifiedWeeklyRecord {
    pub fn climate_value(&self, column: &str) -> Option<f64> {
        match column {
            "rain_sum" => self.rain_sum,
            "temp_mean" => self.temp_mean,
            "humidity_mean" => self.humidity_mean,
            "pressure_mean" => self.pressure_mean,
            _ => None,
        }
    }
}

/// Qualitative correlation strength, classified on |coefficient|.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strength {
    Strong,
    Moderate,
    Weak,
    VeryWeak,
}

impl Strength {
    pub fn from_coefficient(r: f64) -> Self {
        let a = r.abs();
        if a >= 0.7 {
            Strength::Strong
        } else if a >= 0.4 {
            Strength::Moderate
        } else if a >= 0.2 {
            Strength::Weak
        } else {
            Strength::VeryWeak
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Strength::Strong => "strong",
            Strength::Moderate => "moderate",
            Strength::Weak => "weak",
            Strength::VeryWeak => "very weak",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Positive,
    Negative,
    Neutral,
}

impl Direction {
    pub fn from_coefficient(r: f64) -> Self {
        if r > 0.0 {
            Direction::Positive
        } else if r < 0.0 {
            Direction::Negative
        } else {
            Direction::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Positive => "positive",
            Direction::Negative => "negative",
            Direction::Neutral => "neutral",
        }
    }
}

/// Granger result for one lag.
#[derive(Debug, Clone, PartialEq)]
pub struct GrangerLag {
    pub lag: usize,
    pub p_value: f64,
    pub significant: bool,
}

/// Typed causality outcome: a variable either got tested (possibly with a
/// non-significant result) or could not be tested at all.
#[derive(Debug, Clone)]
pub enum GrangerOutcome {
    Tested {
        lags: Vec<GrangerLag>,
        best_lag: usize,
        conclusion: String,
    },
    Unavailable {
        reason: String,
    },
}

/// One row of the correlation/causality table.
#[derive(Debug, Clone)]
pub struct CorrelationResult {
    pub variable: String,
    pub label: String,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub pearson: Option<f64>,
    pub spearman: Option<f64>,
    pub strength: Option<Strength>,
    pub direction: Option<Direction>,
    pub granger: GrangerOutcome,
}
