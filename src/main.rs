use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Datelike;
use log::{error, info, warn};
use walkdir::WalkDir;

use dengue_pipeline::analysis::correlation::CorrelationCausalityEngine;
use dengue_pipeline::config::PipelineConfig;
use dengue_pipeline::data_models::{GrangerOutcome, ParsedStationFile};
use dengue_pipeline::features::synthesize_features;
use dengue_pipeline::metrics::METRICS;
use dengue_pipeline::parallel::ParallelProcessor;
use dengue_pipeline::parsers::sinan;
use dengue_pipeline::time_operation;
use dengue_pipeline::unify::unify;
use dengue_pipeline::weekly::aggregate_weekly;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::var("DENGUE_PIPELINE_CONFIG") {
        Ok(path) => PipelineConfig::from_file(&PathBuf::from(path))?,
        Err(_) => PipelineConfig::from_env()?,
    };
    info!(
        "--- dengue pipeline: station {}, years {}-{} ---",
        config.station_code, config.start_year, config.end_year
    );

    let outcome = run(&config);
    METRICS.lock().print_summary();
    outcome
}

fn run(config: &PipelineConfig) -> Result<()> {
    let paths = time_operation!("discover", discover_station_files(config));
    if paths.is_empty() {
        bail!(
            "no station files for years {}-{} under {}",
            config.start_year,
            config.end_year,
            config.input_dir.display()
        );
    }
    info!("discovered {} candidate station files", paths.len());

    let results = time_operation!("parse", ParallelProcessor::new().process_files(paths));
    let mut files: Vec<ParsedStationFile> =
        results.into_iter().filter_map(|r| r.parsed).collect();
    if files.is_empty() {
        bail!("every discovered station file failed to parse");
    }

    // Filenames only advertise years; the readings decide.
    let year_range = config.start_year..=config.end_year;
    for file in &mut files {
        file.readings
            .retain(|r| year_range.contains(&r.timestamp.date().year()));
    }

    let weekly = time_operation!("aggregate", aggregate_weekly(&files));
    METRICS.lock().station_weeks = weekly.len() as u64;

    let features = time_operation!(
        "features",
        synthesize_features(&weekly, &config.features)
    );

    let cases = sinan::load_case_series(&config.cases_path)
        .with_context(|| format!("loading case series from {}", config.cases_path.display()))?;
    let cases: Vec<_> = cases
        .into_iter()
        .filter(|c| year_range.contains(&c.week_start.year()))
        .collect();
    info!("loaded {} surveillance weeks", cases.len());

    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("creating {}", config.output_dir.display()))?;

    let unified = match unify(&cases, &weekly, &config.station_code) {
        Ok(rows) => rows,
        Err(e) => {
            error!("dataset unification failed: {e}");
            return Err(e.into());
        }
    };
    METRICS.lock().unified_weeks = unified.len() as u64;

    output_artifacts(config, &unified, &features)?;

    let engine = CorrelationCausalityEngine::new(config.analysis.clone());
    let analysis = time_operation!("analysis", engine.analyze(&unified));
    {
        let mut metrics = METRICS.lock();
        metrics.variables_analyzed = analysis.len() as u64;
        metrics.causality_unavailable = analysis
            .iter()
            .filter(|r| matches!(r.granger, GrangerOutcome::Unavailable { .. }))
            .count() as u64;
    }
    dengue_pipeline::output::write_correlation_csv(
        &config.output_dir.join("correlation_table.csv"),
        &analysis,
        config.analysis.max_lag,
    )?;

    Ok(())
}

fn output_artifacts(
    config: &PipelineConfig,
    unified: &[dengue_pipeline::data_models::UnifiedWeeklyRecord],
    features: &[dengue_pipeline::data_models::LaggedFeatureRecord],
) -> Result<()> {
    dengue_pipeline::output::write_unified_csv(
        &config.output_dir.join("dataset_unificado.csv"),
        unified,
    )?;
    dengue_pipeline::output::write_feature_csv(
        &config.output_dir.join("weekly_features.csv"),
        features,
        &config.features,
    )?;
    Ok(())
}

/// Find raw station files under the input directory (or matching an
/// explicit glob pattern), keeping only names that mention a target year.
fn discover_station_files(config: &PipelineConfig) -> Vec<PathBuf> {
    let pattern = config.input_dir.to_string_lossy();
    let mut paths: Vec<PathBuf> = if pattern.contains('*') || pattern.contains('?') {
        match glob::glob(&pattern) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .filter(|p| p.is_file())
                .collect(),
            Err(e) => {
                warn!("invalid glob pattern {pattern}: {e}");
                Vec::new()
            }
        }
    } else {
        WalkDir::new(&config.input_dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect()
    };

    let years: Vec<String> = (config.start_year..=config.end_year)
        .map(|y| y.to_string())
        .collect();
    paths.retain(|path| {
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        is_csv && years.iter().any(|year| name.contains(year.as_str()))
    });

    // Deterministic parse order, so first-observed metadata is stable.
    paths.sort();
    paths
}
