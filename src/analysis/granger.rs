//! Granger-causality test on a pair of aligned weekly series.
//!
//! For lag `k`, the target series is regressed on its own `k` lagged values
//! (restricted model) and additionally on the exogenous variable's `k`
//! lagged values (unrestricted model). The F-test on the two residual sums
//! of squares — `df1 = k`, `df2 = n_obs - 2k - 1`, matching the
//! sum-of-squared-residuals F-test of the reference implementation —
//! decides whether the exogenous history reduces prediction error.

use ndarray::{Array1, Array2};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};

use crate::errors::GrangerError;

#[derive(Debug, Clone)]
pub struct GrangerTest {
    pub lag: usize,
    pub f_statistic: f64,
    pub p_value: f64,
    /// Rows actually entering the regressions.
    pub observations: usize,
}

/// Test whether `exog` Granger-causes `target` at the given lag.
pub fn granger_causality(
    target: &[f64],
    exog: &[f64],
    lag: usize,
) -> Result<GrangerTest, GrangerError> {
    let n = target.len().min(exog.len());
    let rows = n.saturating_sub(lag);
    let unrestricted_params = 2 * lag + 1;
    if rows <= unrestricted_params {
        return Err(GrangerError::InsufficientObservations {
            lag,
            needed: 3 * lag + 2,
            available: n,
        });
    }

    let y: Array1<f64> = target[lag..n].iter().copied().collect();

    let restricted = design_matrix(target, None, lag, rows);
    let unrestricted = design_matrix(target, Some(exog), lag, rows);

    let rss_restricted = residual_sum_of_squares(&restricted, &y, lag)?;
    let rss_unrestricted = residual_sum_of_squares(&unrestricted, &y, lag)?;

    let df1 = lag as f64;
    let df2 = (rows - unrestricted_params) as f64;
    if rss_unrestricted <= f64::EPSILON * rows as f64 {
        return Err(GrangerError::DegenerateResiduals { lag });
    }

    let f_statistic = (((rss_restricted - rss_unrestricted) / df1) / (rss_unrestricted / df2)).max(0.0);
    let dist = FisherSnedecor::new(df1, df2)
        .map_err(|_| GrangerError::DegenerateResiduals { lag })?;
    let p_value = 1.0 - dist.cdf(f_statistic);

    Ok(GrangerTest {
        lag,
        f_statistic,
        p_value,
        observations: rows,
    })
}

/// Rows are t = lag..n; columns are a constant, the target's 1..=lag lags,
/// and (for the unrestricted model) the exogenous variable's 1..=lag lags.
fn design_matrix(target: &[f64], exog: Option<&[f64]>, lag: usize, rows: usize) -> Array2<f64> {
    let cols = 1 + lag + if exog.is_some() { lag } else { 0 };
    let mut x = Array2::zeros((rows, cols));
    for (row, t) in (lag..lag + rows).enumerate() {
        x[[row, 0]] = 1.0;
        for k in 1..=lag {
            x[[row, k]] = target[t - k];
        }
        if let Some(exog) = exog {
            for k in 1..=lag {
                x[[row, lag + k]] = exog[t - k];
            }
        }
    }
    x
}

fn residual_sum_of_squares(
    x: &Array2<f64>,
    y: &Array1<f64>,
    lag: usize,
) -> Result<f64, GrangerError> {
    let xtx = x.t().dot(x);
    let xty = x.t().dot(y);
    let beta = solve(xtx, xty, lag)?;
    let residuals = y - &x.dot(&beta);
    Ok(residuals.dot(&residuals))
}

/// Gauss-Jordan elimination with partial pivoting. A vanishing pivot means
/// the regressors are linearly dependent (a constant or duplicated series).
fn solve(mut a: Array2<f64>, mut b: Array1<f64>, lag: usize) -> Result<Array1<f64>, GrangerError> {
    let n = a.nrows();
    let scale = a.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    let threshold = scale.max(1.0) * 1e-12;

    for col in 0..n {
        let mut pivot = col;
        for row in col + 1..n {
            if a[[row, col]].abs() > a[[pivot, col]].abs() {
                pivot = row;
            }
        }
        if a[[pivot, col]].abs() < threshold {
            return Err(GrangerError::SingularSystem { lag });
        }
        if pivot != col {
            for k in 0..n {
                a.swap([pivot, k], [col, k]);
            }
            b.swap(pivot, col);
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[[row, col]] / a[[col, col]];
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    Ok((0..n).map(|i| b[i] / a[[i, i]]).collect())
}
