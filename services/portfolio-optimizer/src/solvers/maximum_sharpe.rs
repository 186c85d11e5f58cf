//! Analytical maximum-Sharpe (tangency) portfolio

use super::{SolverOutput, invert_covariance};
use crate::constraints::{AssetBounds, enforce, equal_weights};
use crate::error::EngineResult;
use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

/// Direction sums this close to zero cannot be scaled to a unit budget
const MIN_DIRECTION_SUM: f64 = 1e-12;

/// Tangency direction inv(Sigma)(mu - rf), divided by its sum
///
/// The sum may be negative when every excess return is; dividing flips the
/// direction back onto a unit budget. Only a (near-)zero or non-finite sum
/// falls back to equal weights.
pub fn tangency_weights(
    expected_returns: &DVector<f64>,
    covariance: &DMatrix<f64>,
    periods: usize,
    risk_free_rate: f64,
) -> EngineResult<DVector<f64>> {
    let inv_cov = invert_covariance(covariance, periods)?;
    let excess = expected_returns.map(|r| r - risk_free_rate);
    let direction = inv_cov * excess;
    let sum = direction.sum();

    if !sum.is_finite() || sum.abs() <= MIN_DIRECTION_SUM {
        warn!(sum, "Tangency direction has no usable budget, using equal weights");
        return Ok(equal_weights(direction.len()));
    }
    Ok(direction / sum)
}

/// Maximum-Sharpe allocation within bounds
pub fn solve(
    expected_returns: &DVector<f64>,
    covariance: &DMatrix<f64>,
    periods: usize,
    bounds: &AssetBounds,
    risk_free_rate: f64,
) -> EngineResult<SolverOutput> {
    let raw = tangency_weights(expected_returns, covariance, periods, risk_free_rate)?;
    debug!(raw = ?raw.as_slice(), "Maximum-Sharpe raw weights");
    Ok(SolverOutput::closed_form(enforce(&raw, bounds)))
}
