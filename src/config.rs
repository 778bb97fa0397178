use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// One climate variable of the unified dataset submitted to the analysis
/// engine. `column` must name a climate column of the unified record;
/// `label` is the display name carried into the result table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableSpec {
    pub column: String,
    pub label: String,
}

/// Lag and rolling-window synthesis knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Lag offsets, in weeks, applied to every numeric weekly column.
    pub lags: Vec<usize>,
    /// Window lengths, in weeks, for rolling precipitation sums.
    pub precip_windows: Vec<usize>,
    /// Window lengths, in weeks, for rolling temperature means.
    pub temp_windows: Vec<usize>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            // 1-4 weeks (one month), 8 (two months), 12 (one season)
            lags: vec![1, 2, 3, 4, 8, 12],
            precip_windows: vec![4, 8, 12],
            temp_windows: vec![4, 8],
        }
    }
}

/// Correlation/causality engine knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Granger lags tested are 1..=max_lag.
    pub max_lag: usize,
    /// Significance threshold for the per-lag F-test p-value.
    pub significance_level: f64,
    /// Variables analyzed, in output order.
    pub variables: Vec<VariableSpec>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_lag: 4,
            significance_level: 0.05,
            variables: vec![
                VariableSpec {
                    column: "rain_sum".into(),
                    label: "Rain".into(),
                },
                VariableSpec {
                    column: "humidity_mean".into(),
                    label: "Humidity".into(),
                },
                VariableSpec {
                    column: "temp_mean".into(),
                    label: "Mean temperature".into(),
                },
                VariableSpec {
                    column: "pressure_mean".into(),
                    label: "Pressure".into(),
                },
            ],
        }
    }
}

/// Explicit pipeline configuration, passed into each stage's entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory scanned recursively for raw station files.
    pub input_dir: PathBuf,
    /// Surveillance series file (CSV or InfoDengue-style JSON).
    pub cases_path: PathBuf,
    /// Directory receiving the CSV artifacts.
    pub output_dir: PathBuf,
    /// Station whose weekly aggregate joins the case series.
    pub station_code: String,
    /// Inclusive target year range; readings outside it are dropped.
    pub start_year: i32,
    pub end_year: i32,
    pub features: FeatureConfig,
    pub analysis: AnalysisConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data/raw/inmet"),
            cases_path: PathBuf::from("data/raw/sinan_raw.csv"),
            output_dir: PathBuf::from("data_processed"),
            station_code: String::from("A001"),
            start_year: 2022,
            end_year: 2024,
            features: FeatureConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file.
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            source: e,
        })?;
        let reader = BufReader::new(file);
        let config: PipelineConfig =
            serde_json::from_reader(reader).map_err(|e| ConfigError::JsonParse {
                path: path.clone(),
                source: e,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by environment variables, for runs without a
    /// config file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("DENGUE_INPUT_DIR") {
            config.input_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var("DENGUE_CASES_PATH") {
            config.cases_path = PathBuf::from(path);
        }
        if let Ok(dir) = std::env::var("DENGUE_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Ok(code) = std::env::var("DENGUE_STATION_CODE") {
            config.station_code = code;
        }
        if let Ok(year) = std::env::var("DENGUE_START_YEAR") {
            config.start_year = year.parse().map_err(|_| ConfigError::InvalidValue {
                field: "DENGUE_START_YEAR".into(),
                message: format!("'{year}' is not a year"),
            })?;
        }
        if let Ok(year) = std::env::var("DENGUE_END_YEAR") {
            config.end_year = year.parse().map_err(|_| ConfigError::InvalidValue {
                field: "DENGUE_END_YEAR".into(),
                message: format!("'{year}' is not a year"),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.start_year > self.end_year {
            return Err(ConfigError::InvalidValue {
                field: "start_year/end_year".into(),
                message: format!(
                    "start year {} is after end year {}",
                    self.start_year, self.end_year
                ),
            });
        }
        if self.analysis.max_lag == 0 {
            return Err(ConfigError::InvalidValue {
                field: "analysis.max_lag".into(),
                message: "at least one Granger lag is required".into(),
            });
        }
        if !(0.0..1.0).contains(&self.analysis.significance_level) {
            return Err(ConfigError::InvalidValue {
                field: "analysis.significance_level".into(),
                message: format!(
                    "{} is not a probability",
                    self.analysis.significance_level
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.station_code, "A001");
        assert_eq!(config.features.lags, vec![1, 2, 3, 4, 8, 12]);
        assert_eq!(config.analysis.max_lag, 4);
    }

    #[test]
    fn inverted_year_range_is_rejected() {
        let config = PipelineConfig {
            start_year: 2024,
            end_year: 2022,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
