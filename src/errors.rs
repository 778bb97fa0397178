use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse JSON configuration in {path}: {source}")]
    JsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid configuration value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Errors recovered per file or per row during ingestion. A `ParseError`
/// fails the file it belongs to, never the whole run.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error reading data file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("CSV read error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("JSON parsing error in {path}: {source}")]
    JsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("No '{column}' column identified in {path}")]
    MissingColumn { path: PathBuf, column: String },
    #[error("No data rows survived parsing in {path}")]
    EmptyFile { path: PathBuf },
}

/// Reasons the Granger test could not be computed for a variable. These are
/// contained per variable; the engine reports them instead of aborting.
#[derive(Error, Debug)]
pub enum GrangerError {
    #[error("insufficient observations for lag {lag}: need {needed}, have {available}")]
    InsufficientObservations {
        lag: usize,
        needed: usize,
        available: usize,
    },
    #[error("singular regression system at lag {lag} (degenerate series)")]
    SingularSystem { lag: usize },
    #[error("degenerate residual variance at lag {lag}")]
    DegenerateResiduals { lag: usize },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration loading failed: {0}")]
    Config(#[from] ConfigError),
    #[error(
        "No overlapping weeks between the case series ({case_weeks} weeks) \
         and the climate aggregate ({climate_weeks} weeks)"
    )]
    EmptyIntersection {
        case_weeks: usize,
        climate_weeks: usize,
    },
    #[error("IO error writing {path}: {source}")]
    OutputIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("CSV write error for {path}: {source}")]
    OutputCsv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}
