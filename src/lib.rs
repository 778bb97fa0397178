pub mod analysis;
pub mod columns;
pub mod config;
pub mod data_models;
pub mod errors;
pub mod features;
pub mod metrics;
pub mod output;
pub mod parallel;
pub mod parsers;
pub mod unify;
pub mod weekly;

pub use analysis::correlation::CorrelationCausalityEngine;
pub use config::{AnalysisConfig, FeatureConfig, PipelineConfig, VariableSpec};
pub use data_models::{
    CaseRecord, CorrelationResult, GrangerOutcome, LaggedFeatureRecord, ParsedStationFile,
    StationMetadata, StationReading, UnifiedWeeklyRecord, WeeklyClimateRecord,
};
pub use errors::{ConfigError, GrangerError, ParseError, PipelineError};
pub use features::synthesize_features;
pub use unify::unify;
pub use weekly::aggregate_weekly;
