//! Parallel parsing of raw station files.
//!
//! Files are independent, so the fan-out is a plain rayon map. Per-file
//! failures are contained as results; the aggregation downstream is
//! commutative, and `collect` preserves input order so a run is
//! deterministic regardless of scheduling.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use rayon::prelude::*;

use crate::data_models::ParsedStationFile;
use crate::metrics::METRICS;
use crate::parsers::inmet;

/// Result of parsing a single station file.
#[derive(Debug)]
pub struct StationFileResult {
    pub file_path: String,
    pub parsed: Option<ParsedStationFile>,
    pub error: Option<String>,
    #[allow(dead_code)]
    pub processing_time_ms: u128,
}

/// Parallel station-file processor using Rayon.
pub struct ParallelProcessor {
    #[allow(dead_code)]
    num_workers: usize,
}

impl ParallelProcessor {
    pub fn new() -> Self {
        let num_workers = num_cpus::get();
        info!("Initializing ParallelProcessor with {} workers", num_workers);
        Self { num_workers }
    }

    /// Parse all files, reporting progress and recording metrics.
    pub fn process_files(&self, paths: Vec<PathBuf>) -> Vec<StationFileResult> {
        let total_files = paths.len();
        info!("Starting parallel parsing of {} station files", total_files);

        let progress = Arc::new(ProgressBar::new(total_files as u64));
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                .unwrap()
                .progress_chars("#>-"),
        );

        let results: Vec<StationFileResult> = paths
            .into_par_iter()
            .map(|path| {
                let start = Instant::now();
                let file_path = path.to_string_lossy().to_string();
                let progress_clone = Arc::clone(&progress);
                METRICS.lock().record_file_attempt();

                let result = match inmet::parse_station_file(&path) {
                    Ok(parsed) => {
                        let processing_time = start.elapsed().as_millis();
                        METRICS
                            .lock()
                            .record_file_success(parsed.readings.len() as u64, parsed.rows_skipped as u64);
                        info!(
                            "Parsed {} readings from {} ({} convention) in {}ms",
                            parsed.readings.len(),
                            file_path,
                            parsed.convention.as_str(),
                            processing_time
                        );
                        StationFileResult {
                            file_path,
                            parsed: Some(parsed),
                            error: None,
                            processing_time_ms: processing_time,
                        }
                    }
                    Err(e) => {
                        let processing_time = start.elapsed().as_millis();
                        METRICS.lock().record_file_failure();
                        error!("Failed to parse {}: {}", file_path, e);
                        StationFileResult {
                            file_path,
                            parsed: None,
                            error: Some(e.to_string()),
                            processing_time_ms: processing_time,
                        }
                    }
                };

                progress_clone.inc(1);
                result
            })
            .collect();

        progress.finish_with_message("Station file parsing completed");
        results
    }
}

impl Default for ParallelProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processor_sees_at_least_one_worker() {
        let processor = ParallelProcessor::new();
        assert!(processor.num_workers > 0);
    }

    #[test]
    fn missing_files_become_contained_failures() {
        let processor = ParallelProcessor::new();
        let results =
            processor.process_files(vec![PathBuf::from("/nonexistent/INMET_FAKE.CSV")]);
        assert_eq!(results.len(), 1);
        assert!(results[0].parsed.is_none());
        assert!(results[0].error.is_some());
    }
}
