//! End-to-end run over synthetic station fixtures: parse, aggregate,
//! synthesize, unify, analyze, and write artifacts.

use std::fs;
use std::path::PathBuf;

use chrono::{Datelike, Duration, NaiveDate};

use dengue_pipeline::analysis::correlation::CorrelationCausalityEngine;
use dengue_pipeline::config::{AnalysisConfig, FeatureConfig};
use dengue_pipeline::data_models::GrangerOutcome;
use dengue_pipeline::features::synthesize_features;
use dengue_pipeline::output;
use dengue_pipeline::parallel::ParallelProcessor;
use dengue_pipeline::parsers::sinan;
use dengue_pipeline::unify::unify;
use dengue_pipeline::weekly::aggregate_weekly;

const WEEKS: usize = 30;

/// Build a raw INMET-style file: 8 header lines, then two readings per day.
fn station_file_content(code: &str, name: &str) -> String {
    let mut content = String::new();
    content.push_str("REGIAO:;CO;\n");
    content.push_str("UF:;DF;\n");
    content.push_str(&format!("ESTACAO:;{name};\n"));
    content.push_str(&format!("CODIGO (WMO):;{code};\n"));
    content.push_str("LATITUDE:;-15,78944444;\n");
    content.push_str("LONGITUDE:;-47,92583332;\n");
    content.push_str("ALTITUDE:;1160,96;\n");
    content.push_str("DATA DE FUNDACAO:;07/05/2000;\n");
    content.push_str(
        "Data;Hora UTC;PRECIPITACAO TOTAL, HORARIO (mm);\
         TEMPERATURA DO AR - BULBO SECO, HORARIA (C);\
         UMIDADE RELATIVA DO AR, HORARIA (%);\
         PRESSAO ATMOSFERICA AO NIVEL DA ESTACAO, HORARIA (mB);\n",
    );

    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    for d in 0..(WEEKS * 7) as i64 {
        let date = start + Duration::days(d);
        let rain = ((d / 7) % 5) as f64 * 0.3;
        let temp = 18.0 + ((d * 13) % 17) as f64 * 0.7;
        let humidity = 45 + (d * 11) % 29;
        let pressure = 880.0 + ((d * 7) % 13) as f64 * 0.5;
        for hour in ["0000 UTC", "1200 UTC"] {
            content.push_str(&format!(
                "{};{};{};{};{};{};\n",
                date.format("%Y/%m/%d"),
                hour,
                format!("{rain:.1}").replace('.', ","),
                format!("{temp:.1}").replace('.', ","),
                humidity,
                format!("{pressure:.1}").replace('.', ","),
            ));
        }
    }
    content
}

fn case_series_content() -> String {
    let mut content = String::from("data_iniSE,SE,casos\n");
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    for w in 0..(WEEKS + 4) as i64 {
        let week_start = start + Duration::weeks(w);
        let cases = 10 + ((w * 7) % 13) * 3;
        content.push_str(&format!("{},{},{}\n", week_start, 202301 + w, cases));
    }
    content
}

struct Fixture {
    dir: tempfile::TempDir,
    station_paths: Vec<PathBuf>,
    cases_path: PathBuf,
}

fn build_fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let mut station_paths = Vec::new();
    for (code, name) in [("A001", "BRASILIA"), ("A042", "GOIANIA")] {
        let path = dir.path().join(format!(
            "INMET_CO_DF_{code}_{name}_01-01-2023_A_31-12-2023.CSV"
        ));
        fs::write(&path, station_file_content(code, name)).unwrap();
        station_paths.push(path);
    }
    let broken = dir.path().join("INMET_CO_DF_A099_BROKEN_2023.CSV");
    fs::write(&broken, "not;a;station;file\n1;2;3;4\n").unwrap();
    station_paths.push(broken);

    let cases_path = dir.path().join("sinan_raw.csv");
    fs::write(&cases_path, case_series_content()).unwrap();

    Fixture {
        dir,
        station_paths,
        cases_path,
    }
}

#[test]
fn full_pipeline_produces_consistent_artifacts() {
    let fixture = build_fixture();

    // Parse: two good files, one contained failure.
    let results = ParallelProcessor::new().process_files(fixture.station_paths.clone());
    assert_eq!(results.len(), 3);
    let files: Vec<_> = results.into_iter().filter_map(|r| r.parsed).collect();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].readings.len(), WEEKS * 7 * 2);

    // Aggregate: one row per station-week, unique keys.
    let weekly = aggregate_weekly(&files);
    assert_eq!(weekly.len(), WEEKS * 2);
    let mut keys: Vec<_> = weekly
        .iter()
        .map(|r| (r.station_code.clone(), r.year, r.week))
        .collect();
    keys.dedup();
    assert_eq!(keys.len(), WEEKS * 2);

    let first = weekly
        .iter()
        .find(|r| r.station_code == "A001")
        .unwrap();
    // 14 readings of 0.0 mm in the first week.
    assert_eq!(first.precipitation_sum, Some(0.0));
    assert!(first.temperature_std.is_some());

    // Features: lag columns undefined at each station's series start.
    let features = synthesize_features(&weekly, &FeatureConfig::default());
    assert_eq!(features.len(), weekly.len());
    for feature in features
        .iter()
        .filter(|f| f.weekly.week_key() == (2023, 1))
    {
        assert_eq!(feature.lags["temperature_mean_lag1"], None);
        assert!(feature.rolling["precip_accum_8w"].is_some());
        assert!(feature.risk_index <= 4);
    }

    // Unify: intersection of case weeks and climate weeks for A001 only.
    let cases = sinan::load_case_series(&fixture.cases_path).unwrap();
    assert_eq!(cases.len(), WEEKS + 4);
    let unified = unify(&cases, &weekly, "A001").unwrap();
    assert_eq!(unified.len(), WEEKS);
    assert!(unified.windows(2).all(|w| w[0].week_start < w[1].week_start));
    assert!(unified.iter().all(|r| r.rain_sum.is_some()));

    // Analysis: one row per configured variable, in order.
    let engine = CorrelationCausalityEngine::new(AnalysisConfig::default());
    let analysis = engine.analyze(&unified);
    assert_eq!(analysis.len(), 4);
    for result in &analysis {
        assert!(result.mean.is_some());
        if let GrangerOutcome::Tested { lags, best_lag, .. } = &result.granger {
            assert_eq!(lags.len(), 4);
            assert!((1..=4).contains(best_lag));
        }
    }

    // Artifacts: rerunning the writers yields byte-identical outputs.
    let out_a = fixture.dir.path().join("unified_a.csv");
    let out_b = fixture.dir.path().join("unified_b.csv");
    output::write_unified_csv(&out_a, &unified).unwrap();
    output::write_unified_csv(&out_b, &unified).unwrap();
    assert_eq!(fs::read(&out_a).unwrap(), fs::read(&out_b).unwrap());

    let table = fixture.dir.path().join("correlation.csv");
    output::write_correlation_csv(&table, &analysis, 4).unwrap();
    let content = fs::read_to_string(&table).unwrap();
    assert_eq!(content.lines().count(), 5);
    assert!(content.lines().nth(1).unwrap().starts_with("rain_sum,Rain,"));
}

#[test]
fn pipeline_is_idempotent_end_to_end() {
    let fixture = build_fixture();

    let run = || {
        let results = ParallelProcessor::new().process_files(fixture.station_paths.clone());
        let files: Vec<_> = results.into_iter().filter_map(|r| r.parsed).collect();
        let weekly = aggregate_weekly(&files);
        let cases = sinan::load_case_series(&fixture.cases_path).unwrap();
        unify(&cases, &weekly, "A001").unwrap()
    };

    let first = run();
    let second = run();
    let a = fixture.dir.path().join("first.csv");
    let b = fixture.dir.path().join("second.csv");
    output::write_unified_csv(&a, &first).unwrap();
    output::write_unified_csv(&b, &second).unwrap();
    assert_eq!(fs::read(&a).unwrap(), fs::read(&b).unwrap());
}

#[test]
fn case_weeks_outside_the_climate_range_are_dropped() {
    let fixture = build_fixture();

    let results = ParallelProcessor::new().process_files(fixture.station_paths.clone());
    let files: Vec<_> = results.into_iter().filter_map(|r| r.parsed).collect();
    let weekly = aggregate_weekly(&files);
    let cases = sinan::load_case_series(&fixture.cases_path).unwrap();

    let unified = unify(&cases, &weekly, "A001").unwrap();
    let last_climate_week = weekly
        .iter()
        .filter(|r| r.station_code == "A001")
        .map(|r| r.week_key())
        .max()
        .unwrap();
    let last_unified = unified.last().unwrap();
    let iso = last_unified.week_start.iso_week();
    assert_eq!((iso.year(), iso.week()), last_climate_week);
}
