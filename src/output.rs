//! CSV artifact writers.
//!
//! Three tabular outputs: the unified weekly dataset (consumed by plotting
//! and report collaborators), the per-station weekly feature table, and the
//! correlation/causality table. Rendering to documents is out of scope; the
//! CSVs are the contract.

use std::path::Path;

use csv::Writer;
use log::info;

use crate::config::FeatureConfig;
use crate::data_models::{
    CorrelationResult, GrangerOutcome, LaggedFeatureRecord, UnifiedWeeklyRecord,
    WeeklyClimateRecord,
};
use crate::errors::PipelineError;

fn open_writer(path: &Path) -> Result<Writer<std::fs::File>, PipelineError> {
    Writer::from_path(path).map_err(|e| PipelineError::OutputCsv {
        path: path.to_path_buf(),
        source: e,
    })
}

fn finish(mut writer: Writer<std::fs::File>, path: &Path) -> Result<(), PipelineError> {
    writer.flush().map_err(|e| PipelineError::OutputIo {
        path: path.to_path_buf(),
        source: e,
    })
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(String::new, |v| v.to_string())
}

fn fmt_opt_rounded(value: Option<f64>) -> String {
    value.map_or_else(String::new, |v| format!("{v:.4}"))
}

fn fmt_flag(value: bool) -> String {
    if value { "1".into() } else { "0".into() }
}

/// Write the unified weekly dataset with its stable column set.
pub fn write_unified_csv(
    path: &Path,
    rows: &[UnifiedWeeklyRecord],
) -> Result<(), PipelineError> {
    let mut writer = open_writer(path)?;
    for row in rows {
        writer.serialize(row).map_err(|e| PipelineError::OutputCsv {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    finish(writer, path)?;
    info!("wrote {} unified weeks to {}", rows.len(), path.display());
    Ok(())
}

/// Write the per-station weekly feature table. Lag and rolling headers are
/// derived from the configuration so the layout tracks the configured sets.
pub fn write_feature_csv(
    path: &Path,
    features: &[LaggedFeatureRecord],
    config: &FeatureConfig,
) -> Result<(), PipelineError> {
    let mut headers: Vec<String> = vec!["station_code".into(), "year".into(), "week".into()];
    headers.extend(
        WeeklyClimateRecord::NUMERIC_COLUMNS
            .iter()
            .map(|c| c.to_string()),
    );
    for col in WeeklyClimateRecord::NUMERIC_COLUMNS {
        for k in &config.lags {
            headers.push(format!("{col}_lag{k}"));
        }
    }
    for w in &config.precip_windows {
        headers.push(format!("precip_accum_{w}w"));
    }
    for w in &config.temp_windows {
        headers.push(format!("temp_mean_{w}w"));
    }
    headers.extend(
        [
            "temp_favorable",
            "temp_ideal",
            "rain_relevant",
            "humidity_favorable",
            "risk_index",
        ]
        .map(String::from),
    );

    let mut writer = open_writer(path)?;
    let write_err = |e: csv::Error| PipelineError::OutputCsv {
        path: path.to_path_buf(),
        source: e,
    };
    writer.write_record(&headers).map_err(write_err)?;

    for feature in features {
        let weekly = &feature.weekly;
        let mut record: Vec<String> = vec![
            weekly.station_code.clone(),
            weekly.year.to_string(),
            weekly.week.to_string(),
        ];
        for col in WeeklyClimateRecord::NUMERIC_COLUMNS {
            record.push(fmt_opt(weekly.numeric_value(col)));
        }
        for col in WeeklyClimateRecord::NUMERIC_COLUMNS {
            for k in &config.lags {
                record.push(fmt_opt(
                    feature.lags.get(&format!("{col}_lag{k}")).copied().flatten(),
                ));
            }
        }
        for w in &config.precip_windows {
            record.push(fmt_opt(
                feature
                    .rolling
                    .get(&format!("precip_accum_{w}w"))
                    .copied()
                    .flatten(),
            ));
        }
        for w in &config.temp_windows {
            record.push(fmt_opt(
                feature
                    .rolling
                    .get(&format!("temp_mean_{w}w"))
                    .copied()
                    .flatten(),
            ));
        }
        record.push(fmt_flag(feature.temp_favorable));
        record.push(fmt_flag(feature.temp_ideal));
        record.push(fmt_flag(feature.rain_relevant));
        record.push(fmt_flag(feature.humidity_favorable));
        record.push(feature.risk_index.to_string());

        writer.write_record(&record).map_err(write_err)?;
    }
    finish(writer, path)?;
    info!(
        "wrote {} feature rows to {}",
        features.len(),
        path.display()
    );
    Ok(())
}

/// Write the correlation/causality table, one row per analyzed variable in
/// configured order.
pub fn write_correlation_csv(
    path: &Path,
    results: &[CorrelationResult],
    max_lag: usize,
) -> Result<(), PipelineError> {
    let mut headers: Vec<String> = [
        "variable", "label", "mean", "std", "min", "max", "pearson", "spearman", "strength",
        "direction",
    ]
    .map(String::from)
    .to_vec();
    for lag in 1..=max_lag {
        headers.push(format!("granger_lag{lag}_p"));
        headers.push(format!("granger_lag{lag}_significant"));
    }
    headers.push("best_lag".into());
    headers.push("causality".into());

    let mut writer = open_writer(path)?;
    let write_err = |e: csv::Error| PipelineError::OutputCsv {
        path: path.to_path_buf(),
        source: e,
    };
    writer.write_record(&headers).map_err(write_err)?;

    for result in results {
        let mut record: Vec<String> = vec![
            result.variable.clone(),
            result.label.clone(),
            fmt_opt(result.mean),
            fmt_opt(result.std_dev),
            fmt_opt(result.min),
            fmt_opt(result.max),
            fmt_opt_rounded(result.pearson),
            fmt_opt_rounded(result.spearman),
            result.strength.map_or_else(String::new, |s| s.as_str().into()),
            result.direction.map_or_else(String::new, |d| d.as_str().into()),
        ];
        match &result.granger {
            GrangerOutcome::Tested {
                lags,
                best_lag,
                conclusion,
            } => {
                for lag in 1..=max_lag {
                    match lags.iter().find(|l| l.lag == lag) {
                        Some(l) => {
                            record.push(format!("{:.4}", l.p_value));
                            record.push(fmt_flag(l.significant));
                        }
                        None => {
                            record.push(String::new());
                            record.push(String::new());
                        }
                    }
                }
                record.push(best_lag.to_string());
                record.push(conclusion.clone());
            }
            GrangerOutcome::Unavailable { reason } => {
                for _ in 1..=max_lag {
                    record.push(String::new());
                    record.push(String::new());
                }
                record.push(String::new());
                record.push(format!("unavailable: {reason}"));
            }
        }
        writer.write_record(&record).map_err(write_err)?;
    }
    finish(writer, path)?;
    info!(
        "wrote correlation table ({} variables) to {}",
        results.len(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_models::{Direction, GrangerLag, Strength};
    use chrono::NaiveDate;

    #[test]
    fn unified_csv_has_stable_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset_unificado.csv");
        let rows = vec![UnifiedWeeklyRecord {
            week_start: NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(),
            cases: 12,
            rain_sum: Some(3.5),
            temp_mean: Some(24.0),
            humidity_mean: None,
            pressure_mean: Some(888.0),
        }];

        write_unified_csv(&path, &rows).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "week_start,cases,rain_sum,temp_mean,humidity_mean,pressure_mean"
        );
        assert_eq!(lines.next().unwrap(), "2023-01-02,12,3.5,24.0,,888.0");
    }

    #[test]
    fn correlation_csv_renders_tested_and_unavailable_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("correlation.csv");
        let results = vec![
            CorrelationResult {
                variable: "rain_sum".into(),
                label: "Rain".into(),
                mean: Some(10.0),
                std_dev: Some(2.0),
                min: Some(5.0),
                max: Some(15.0),
                pearson: Some(0.8123456),
                spearman: Some(0.75),
                strength: Some(Strength::Strong),
                direction: Some(Direction::Positive),
                granger: GrangerOutcome::Tested {
                    lags: vec![GrangerLag {
                        lag: 1,
                        p_value: 0.012345,
                        significant: true,
                    }],
                    best_lag: 1,
                    conclusion: "causality evidence at lag 1".into(),
                },
            },
            CorrelationResult {
                variable: "pressure_mean".into(),
                label: "Pressure".into(),
                mean: Some(888.0),
                std_dev: None,
                min: Some(888.0),
                max: Some(888.0),
                pearson: None,
                spearman: None,
                strength: None,
                direction: None,
                granger: GrangerOutcome::Unavailable {
                    reason: "singular regression system at lag 1 (degenerate series)".into(),
                },
            },
        ];

        write_correlation_csv(&path, &results, 1).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "variable,label,mean,std,min,max,pearson,spearman,strength,direction,\
             granger_lag1_p,granger_lag1_significant,best_lag,causality"
        );
        assert!(lines[1].starts_with("rain_sum,Rain,10,2,5,15,0.8123,0.7500,strong,positive,0.0123,1,1,"));
        assert!(lines[2].contains("unavailable: singular regression system"));
    }
}
