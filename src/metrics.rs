use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Global metrics instance
pub static METRICS: Lazy<Mutex<Metrics>> = Lazy::new(|| Mutex::new(Metrics::new()));

/// Pipeline metrics tracker. Per-file and per-row failures are contained
/// where they happen; this is where they surface in aggregate.
#[derive(Debug, Default)]
pub struct Metrics {
    pub files_attempted: u64,
    pub files_successful: u64,
    pub files_failed: u64,
    pub readings_parsed: u64,
    pub rows_skipped: u64,
    pub station_weeks: u64,
    pub unified_weeks: u64,
    pub variables_analyzed: u64,
    pub causality_unavailable: u64,
    pub processing_times: HashMap<String, Duration>,
    pub start_time: Option<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn record_file_attempt(&mut self) {
        self.files_attempted += 1;
    }

    pub fn record_file_success(&mut self, readings: u64, rows_skipped: u64) {
        self.files_successful += 1;
        self.readings_parsed += readings;
        self.rows_skipped += rows_skipped;
    }

    pub fn record_file_failure(&mut self) {
        self.files_failed += 1;
    }

    pub fn record_processing_time(&mut self, operation: String, duration: Duration) {
        self.processing_times.insert(operation, duration);
    }

    pub fn get_total_duration(&self) -> Duration {
        self.start_time
            .map(|start| start.elapsed())
            .unwrap_or_default()
    }

    pub fn print_summary(&self) {
        let duration = self.get_total_duration();
        println!("\n========== Pipeline Metrics Summary ==========");
        println!("Total Duration: {:.2?}", duration);
        println!("Files Attempted: {}", self.files_attempted);
        println!("Files Successful: {}", self.files_successful);
        println!("Files Failed: {}", self.files_failed);
        println!("Readings Parsed: {}", self.readings_parsed);
        println!("Rows Skipped: {}", self.rows_skipped);
        println!("Station-Weeks Aggregated: {}", self.station_weeks);
        println!("Unified Weeks: {}", self.unified_weeks);
        println!(
            "Variables Analyzed: {} ({} without causality)",
            self.variables_analyzed, self.causality_unavailable
        );

        if !self.processing_times.is_empty() {
            println!("\nProcessing Times:");
            let mut times: Vec<_> = self.processing_times.iter().collect();
            times.sort_by_key(|(op, _)| op.as_str());
            for (op, duration) in times {
                println!("  {}: {:.2?}", op, duration);
            }
        }
        println!("=============================================\n");
    }
}

/// Helper macro to time an operation
#[macro_export]
macro_rules! time_operation {
    ($name:expr, $op:expr) => {{
        let start = std::time::Instant::now();
        let result = $op;
        let duration = start.elapsed();
        $crate::metrics::METRICS
            .lock()
            .record_processing_time($name.to_string(), duration);
        result
    }};
}
