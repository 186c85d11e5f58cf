//! Equilibrium-return Black-Litterman (no investor views)
//!
//! pi = lambda * Sigma * w_mkt feeds the tangency solver.

use super::{SolverOutput, maximum_sharpe};
use crate::constraints::{AssetBounds, equal_weights};
use crate::error::{EngineError, EngineResult};
use nalgebra::{DMatrix, DVector};
use tracing::debug;

/// Market-implied equilibrium returns
pub fn implied_returns(
    covariance: &DMatrix<f64>,
    market_weights: &DVector<f64>,
    risk_aversion: f64,
) -> DVector<f64> {
    covariance * market_weights * risk_aversion
}

/// Check caller-supplied market weights and scale them to sum to one
pub fn market_weights(n: usize, supplied: Option<&DVector<f64>>) -> EngineResult<DVector<f64>> {
    let Some(w) = supplied else {
        return Ok(equal_weights(n));
    };
    if w.len() != n {
        return Err(EngineError::InvalidConstraints {
            reason: format!("{} market weights for {} assets", w.len(), n),
        });
    }
    if w.iter().any(|x| !x.is_finite() || *x < 0.0) {
        return Err(EngineError::InvalidConstraints {
            reason: "market weights must be finite and non-negative".to_string(),
        });
    }
    let sum = w.sum();
    if sum <= 0.0 {
        return Err(EngineError::InvalidConstraints {
            reason: "market weights sum to zero".to_string(),
        });
    }
    Ok(w / sum)
}

/// Black-Litterman allocation within bounds
///
/// The output carries pi so the result is measured against equilibrium returns.
pub fn solve(
    covariance: &DMatrix<f64>,
    periods: usize,
    bounds: &AssetBounds,
    supplied_market_weights: Option<&DVector<f64>>,
    risk_aversion: f64,
    risk_free_rate: f64,
) -> EngineResult<SolverOutput> {
    let w_mkt = market_weights(covariance.nrows(), supplied_market_weights)?;
    let pi = implied_returns(covariance, &w_mkt, risk_aversion);
    debug!(pi = ?pi.as_slice(), "Black-Litterman equilibrium returns");

    let mut output = maximum_sharpe::solve(&pi, covariance, periods, bounds, risk_free_rate)?;
    output.expected_returns = Some(pi);
    Ok(output)
}
