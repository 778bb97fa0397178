//! Reader for the weekly surveillance series.
//!
//! Accepts either a CSV export or an InfoDengue-style JSON array. The week
//! start field (`data_iniSE`) arrives as an epoch-milliseconds number in the
//! JSON API payload and as a date string in CSV exports, so it gets a
//! dedicated deserializer handling both.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{DateTime, NaiveDate};
use log::warn;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};

use crate::data_models::CaseRecord;
use crate::errors::ParseError;

#[derive(Debug, Clone, Copy)]
struct WeekStart(NaiveDate);

impl<'de> Deserialize<'de> for WeekStart {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct WeekStartVisitor;

        impl<'de> Visitor<'de> for WeekStartVisitor {
            type Value = WeekStart;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a date string or an epoch-milliseconds timestamp")
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                DateTime::from_timestamp_millis(value)
                    .map(|dt| WeekStart(dt.date_naive()))
                    .ok_or_else(|| E::custom(format!("epoch ms {value} out of range")))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                self.visit_i64(value as i64)
            }

            fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                self.visit_i64(value as i64)
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                let trimmed = value.trim();
                // A long run of digits is an epoch-ms stamp serialized as text.
                if trimmed.len() > 8 && trimmed.chars().all(|c| c.is_ascii_digit()) {
                    let ms: i64 = trimmed
                        .parse()
                        .map_err(|_| E::custom(format!("'{trimmed}' is not a timestamp")))?;
                    return self.visit_i64(ms);
                }
                if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
                    return Ok(WeekStart(dt.date_naive()));
                }
                for format in ["%Y-%m-%d", "%d/%m/%Y"] {
                    if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
                        return Ok(WeekStart(date));
                    }
                }
                Err(E::custom(format!("unrecognized week-start date '{trimmed}'")))
            }
        }

        deserializer.deserialize_any(WeekStartVisitor)
    }
}

#[derive(Debug, Deserialize)]
struct RawCaseRow {
    #[serde(rename = "data_iniSE", alias = "data", alias = "week_start")]
    week_start: WeekStart,
    #[serde(rename = "casos", alias = "casos_dengue", alias = "cases")]
    cases: f64,
}

impl From<RawCaseRow> for CaseRecord {
    fn from(row: RawCaseRow) -> Self {
        CaseRecord {
            week_start: row.week_start.0,
            cases: row.cases.max(0.0).round() as u32,
        }
    }
}

/// Load the surveillance series, sorted by week start and deduplicated.
pub fn load_case_series(path: &Path) -> Result<Vec<CaseRecord>, ParseError> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let mut records = if is_json {
        load_json(path)?
    } else {
        load_csv(path)?
    };

    records.sort_by_key(|r| r.week_start);
    records.dedup_by_key(|r| r.week_start);

    if records.is_empty() {
        return Err(ParseError::EmptyFile {
            path: path.to_path_buf(),
        });
    }
    Ok(records)
}

fn load_json(path: &Path) -> Result<Vec<CaseRecord>, ParseError> {
    let file = File::open(path).map_err(|e| ParseError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let rows: Vec<RawCaseRow> =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| ParseError::JsonParse {
            path: path.to_path_buf(),
            source: e,
        })?;
    Ok(rows.into_iter().map(CaseRecord::from).collect())
}

fn load_csv(path: &Path) -> Result<Vec<CaseRecord>, ParseError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| ParseError::Csv {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut records = Vec::new();
    for result in reader.deserialize::<RawCaseRow>() {
        match result {
            Ok(row) => records.push(CaseRecord::from(row)),
            Err(e) => warn!("{}: skipping case row: {}", path.display(), e),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fixture(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn loads_csv_series() {
        let file = write_fixture(
            ".csv",
            "data_iniSE,SE,casos,casos_est\n\
             2023-01-08,202302,153,160.2\n\
             2023-01-01,202301,120,122.9\n",
        );
        let records = load_case_series(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        // Sorted by week start regardless of input order.
        assert_eq!(
            records[0].week_start,
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
        );
        assert_eq!(records[0].cases, 120);
        assert_eq!(records[1].cases, 153);
    }

    #[test]
    fn loads_json_series_with_epoch_ms_dates() {
        // 2023-01-01T00:00:00Z == 1672531200000 ms
        let file = write_fixture(
            ".json",
            r#"[{"data_iniSE": 1672531200000, "SE": 202301, "casos": 120, "casos_est": 122.9}]"#,
        );
        let records = load_case_series(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].week_start,
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
        );
        assert_eq!(records[0].cases, 120);
    }

    #[test]
    fn duplicate_weeks_are_collapsed() {
        let file = write_fixture(
            ".csv",
            "data,casos\n2023-01-01,10\n2023-01-01,99\n2023-01-08,20\n",
        );
        let records = load_case_series(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].cases, 10);
    }

    #[test]
    fn empty_series_is_an_error() {
        let file = write_fixture(".csv", "data,casos\n");
        assert!(matches!(
            load_case_series(file.path()),
            Err(ParseError::EmptyFile { .. })
        ));
    }
}
