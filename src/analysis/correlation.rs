//! Correlation and causality analysis over the unified weekly dataset.
//!
//! One result row per configured variable, in the configuration's declared
//! order. Correlation and causality are computed independently: a variable
//! whose Granger test cannot run still reports its coefficients, and the
//! failure reason is carried in the typed outcome instead of aborting the
//! analysis.

use log::{info, warn};

use crate::config::{AnalysisConfig, VariableSpec};
use crate::data_models::{
    CorrelationResult, Direction, GrangerLag, GrangerOutcome, Strength, UnifiedWeeklyRecord,
};
use crate::errors::GrangerError;

use super::granger::granger_causality;
use super::stats;

pub struct CorrelationCausalityEngine {
    config: AnalysisConfig,
}

impl CorrelationCausalityEngine {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Analyze every configured variable against the case counts.
    pub fn analyze(&self, rows: &[UnifiedWeeklyRecord]) -> Vec<CorrelationResult> {
        let results: Vec<CorrelationResult> = self
            .config
            .variables
            .iter()
            .map(|spec| self.analyze_variable(rows, spec))
            .collect();

        let unavailable = results
            .iter()
            .filter(|r| matches!(r.granger, GrangerOutcome::Unavailable { .. }))
            .count();
        if unavailable == results.len() && !results.is_empty() {
            warn!("causality could not be computed for any of the {} variables", results.len());
        }
        info!("analyzed {} variables over {} weeks", results.len(), rows.len());
        results
    }

    fn analyze_variable(
        &self,
        rows: &[UnifiedWeeklyRecord],
        spec: &VariableSpec,
    ) -> CorrelationResult {
        // Paired, non-missing observations in week order.
        let (cases, values): (Vec<f64>, Vec<f64>) = rows
            .iter()
            .filter_map(|r| {
                r.climate_value(&spec.column)
                    .map(|v| (f64::from(r.cases), v))
            })
            .unzip();

        let pearson = stats::pearson(&values, &cases);
        let spearman = stats::spearman(&values, &cases);

        CorrelationResult {
            variable: spec.column.clone(),
            label: spec.label.clone(),
            mean: stats::mean(&values),
            std_dev: stats::sample_std(&values),
            min: stats::min(&values),
            max: stats::max(&values),
            pearson,
            spearman,
            strength: pearson.map(Strength::from_coefficient),
            direction: pearson.map(Direction::from_coefficient),
            granger: self.run_granger(&cases, &values, spec),
        }
    }

    fn run_granger(&self, cases: &[f64], values: &[f64], spec: &VariableSpec) -> GrangerOutcome {
        let mut lags = Vec::new();
        let mut first_error: Option<GrangerError> = None;

        for lag in 1..=self.config.max_lag {
            match granger_causality(cases, values, lag) {
                Ok(test) => lags.push(GrangerLag {
                    lag,
                    p_value: test.p_value,
                    significant: test.p_value < self.config.significance_level,
                }),
                Err(e) => {
                    warn!("Granger test failed for {} at lag {lag}: {e}", spec.label);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if lags.is_empty() {
            let reason = first_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no lags tested".to_string());
            return GrangerOutcome::Unavailable { reason };
        }

        let best_lag = lags
            .iter()
            .min_by(|a, b| a.p_value.total_cmp(&b.p_value))
            .map(|l| l.lag)
            .unwrap_or(1);
        let significant_at_best = lags
            .iter()
            .any(|l| l.lag == best_lag && l.significant);
        let conclusion = if significant_at_best {
            format!("causality evidence at lag {best_lag}")
        } else {
            "no causality evidence".to_string()
        };

        GrangerOutcome::Tested {
            lags,
            best_lag,
            conclusion,
        }
    }
}
