//! Parser for raw INMET station files.
//!
//! A raw file is latin-1 encoded and starts with 8 `key: value` metadata
//! lines (region, state, station name/code, coordinates, founding date),
//! followed by a delimited hourly table. Two numeric/locale conventions
//! exist in the wild: semicolon fields with decimal commas (the INMET
//! default) and comma fields with decimal points. Parsing tries the first
//! and falls back to the second, reporting which one succeeded.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::columns::{identify, ColumnRole};
use crate::data_models::{
    ClimateVariable, NumericConvention, ParsedStationFile, StationMetadata, StationReading,
};
use crate::errors::ParseError;

const HEADER_LINES: usize = 8;
const MISSING_MARKERS: &[&str] = &["-9999", "-9999.0", "null", "NULL"];

/// INMET_<REGION>_<UF>_<CODE>_<NAME>_<dd-mm-yyyy>_A_<dd-mm-yyyy>
static FILENAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^INMET_([A-Z]+)_([A-Z]{2})_([A-Z0-9]+)_(.+?)_(\d{2}-\d{2}-\d{4})_A_(\d{2}-\d{2}-\d{4})$")
        .expect("filename pattern is valid")
});

/// Parse a float that may use comma as decimal separator.
pub fn parse_locale_float(s: &str) -> Result<f64, std::num::ParseFloatError> {
    s.replace(',', ".").parse::<f64>()
}

/// Latin-1 maps byte-for-byte onto the first Unicode page.
fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Parse one raw station file into metadata plus timestamped readings.
pub fn parse_station_file(path: &Path) -> Result<ParsedStationFile, ParseError> {
    let bytes = fs::read(path).map_err(|e| ParseError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let text = decode_latin1(&bytes);

    let mut lines = text.lines();
    let header_lines: Vec<&str> = lines.by_ref().take(HEADER_LINES).collect();
    let body = lines.collect::<Vec<_>>().join("\n");

    let mut metadata = parse_header_metadata(&header_lines);
    if let Some(from_filename) = metadata_from_filename(path) {
        metadata.fill_missing_from(&from_filename);
    }
    let station_code = metadata
        .station_code
        .clone()
        .unwrap_or_else(|| path.file_stem().map_or_else(String::new, |s| s.to_string_lossy().to_uppercase()));

    let primary = parse_body(&body, NumericConvention::SemicolonCommaDecimal, path);
    let (readings, rows_skipped, convention) = match primary {
        Ok((readings, skipped)) if !readings.is_empty() => {
            (readings, skipped, NumericConvention::SemicolonCommaDecimal)
        }
        primary_outcome => {
            debug!(
                "{}: primary convention produced no readings, retrying with fallback",
                path.display()
            );
            match parse_body(&body, NumericConvention::CommaPointDecimal, path) {
                Ok((readings, skipped)) if !readings.is_empty() => {
                    (readings, skipped, NumericConvention::CommaPointDecimal)
                }
                // Neither convention yielded rows: surface the primary
                // error if it was structural, otherwise report emptiness.
                Ok(_) => {
                    return Err(match primary_outcome {
                        Err(e) => e,
                        Ok(_) => ParseError::EmptyFile {
                            path: path.to_path_buf(),
                        },
                    })
                }
                Err(fallback_err) => {
                    return Err(match primary_outcome {
                        Err(e) => e,
                        Ok(_) => fallback_err,
                    })
                }
            }
        }
    };

    debug!(
        "{}: parsed {} readings ({} rows skipped) using {} convention",
        path.display(),
        readings.len(),
        rows_skipped,
        convention.as_str()
    );

    Ok(ParsedStationFile {
        station_code,
        metadata,
        readings,
        convention,
        rows_skipped,
    })
}

fn parse_body(
    body: &str,
    convention: NumericConvention,
    path: &Path,
) -> Result<(Vec<StationReading>, usize), ParseError> {
    let delimiter = match convention {
        NumericConvention::SemicolonCommaDecimal => b';',
        NumericConvention::CommaPointDecimal => b',',
    };
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ParseError::Csv {
            path: path.to_path_buf(),
            source: e,
        })?
        .clone();

    let mut date_idx = None;
    let mut hour_idx = None;
    let mut var_columns: Vec<(usize, ClimateVariable)> = Vec::new();
    for (idx, header) in headers.iter().enumerate() {
        match identify(header) {
            Some(ColumnRole::Date) if date_idx.is_none() => date_idx = Some(idx),
            Some(ColumnRole::Hour) if hour_idx.is_none() => hour_idx = Some(idx),
            Some(ColumnRole::Variable(var)) => {
                // First matching column wins per variable.
                if !var_columns.iter().any(|(_, v)| *v == var) {
                    var_columns.push((idx, var));
                }
            }
            _ => {}
        }
    }

    let missing = |column: &str| ParseError::MissingColumn {
        path: path.to_path_buf(),
        column: column.to_string(),
    };
    let date_idx = date_idx.ok_or_else(|| missing("date"))?;
    let hour_idx = hour_idx.ok_or_else(|| missing("hour (UTC)"))?;
    if var_columns.is_empty() {
        return Err(missing("climate variable"));
    }

    let mut readings = Vec::new();
    let mut rows_skipped = 0usize;
    for result in reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("{}: unreadable row: {}", path.display(), e);
                rows_skipped += 1;
                continue;
            }
        };

        let date_str = record.get(date_idx).unwrap_or("").trim();
        let hour_str = record.get(hour_idx).unwrap_or("").trim();
        let timestamp = match build_timestamp(date_str, hour_str) {
            Some(ts) => ts,
            None => {
                rows_skipped += 1;
                continue;
            }
        };

        let mut values = BTreeMap::new();
        for (idx, var) in &var_columns {
            let Some(raw) = record.get(*idx) else { continue };
            let trimmed = raw.trim();
            if trimmed.is_empty() || MISSING_MARKERS.contains(&trimmed) {
                continue;
            }
            match parse_locale_float(trimmed) {
                Ok(value) => {
                    values.insert(*var, value);
                }
                Err(_) => {
                    debug!(
                        "{}: non-numeric {} value '{}' treated as missing",
                        path.display(),
                        var.as_str(),
                        trimmed
                    );
                }
            }
        }
        readings.push(StationReading { timestamp, values });
    }

    Ok((readings, rows_skipped))
}

fn parse_header_metadata(lines: &[&str]) -> StationMetadata {
    let mut meta = StationMetadata::default();
    for line in lines {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().trim_matches(';').to_uppercase();
        let value = value.trim().trim_matches(';').trim();
        if value.is_empty() {
            continue;
        }
        if key.contains("REGI") {
            meta.region = Some(value.to_string());
        } else if key == "UF" {
            meta.state = Some(value.to_uppercase());
        } else if key.contains("CODIGO") || key.contains("C\u{d3}DIGO") {
            meta.station_code = Some(value.to_uppercase());
        } else if key.contains("ESTACAO") || key.contains("ESTA\u{c7}\u{c3}O") {
            meta.station_name = Some(value.to_string());
        } else if key.contains("LATITUDE") {
            meta.latitude = parse_locale_float(value).ok();
        } else if key.contains("LONGITUDE") {
            meta.longitude = parse_locale_float(value).ok();
        } else if key.contains("ALTITUDE") {
            meta.altitude_m = parse_locale_float(value).ok();
        } else if key.contains("FUNDACAO") || key.contains("FUNDA\u{c7}\u{c3}O") {
            meta.founded = parse_header_date(value);
        }
    }
    meta
}

fn parse_header_date(s: &str) -> Option<NaiveDate> {
    for format in ["%d/%m/%Y", "%Y-%m-%d", "%d/%m/%y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(date);
        }
    }
    None
}

fn metadata_from_filename(path: &Path) -> Option<StationMetadata> {
    let stem = path.file_stem()?.to_str()?.to_uppercase();
    let caps = FILENAME_RE.captures(&stem)?;
    Some(StationMetadata {
        region: Some(caps[1].to_string()),
        state: Some(caps[2].to_string()),
        station_code: Some(caps[3].to_string()),
        station_name: Some(caps[4].replace('_', " ")),
        ..StationMetadata::default()
    })
}

fn parse_body_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y/%m/%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .ok()
}

/// Hour-of-day fields come as "0000 UTC", "1200 UTC" or "12:00".
fn parse_hour(s: &str) -> Option<(u32, u32)> {
    let cleaned = s.trim().trim_end_matches("UTC").trim();
    if let Some((h, m)) = cleaned.split_once(':') {
        return Some((h.parse().ok()?, m.parse().ok()?));
    }
    if cleaned.len() == 4 && cleaned.chars().all(|c| c.is_ascii_digit()) {
        return Some((cleaned[..2].parse().ok()?, cleaned[2..].parse().ok()?));
    }
    None
}

fn build_timestamp(date_str: &str, hour_str: &str) -> Option<NaiveDateTime> {
    let date = parse_body_date(date_str)?;
    let (hour, minute) = parse_hour(hour_str)?;
    date.and_hms_opt(hour, minute, 0)
}
