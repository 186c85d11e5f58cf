//! Closed-form minimum-variance portfolio
//!
//! w* = inv(Sigma) 1 / (1' inv(Sigma) 1), then clamped and renormalized.

use super::{SolverOutput, invert_covariance};
use crate::constraints::{AssetBounds, enforce};
use crate::error::{EngineError, EngineResult};
use crate::estimator::MarketStatistics;
use nalgebra::DVector;
use tracing::debug;

/// Unconstrained minimum-variance weights
pub fn raw_weights(stats: &MarketStatistics) -> EngineResult<DVector<f64>> {
    let n = stats.asset_count();
    let inv_cov = invert_covariance(&stats.covariance, stats.period_count())?;
    let ones = DVector::from_element(n, 1.0);
    let numerator = &inv_cov * &ones;
    let denominator = ones.dot(&numerator);

    if denominator == 0.0 || !denominator.is_finite() {
        return Err(EngineError::SingularMatrix {
            reason: format!("minimum-variance denominator is {denominator}"),
        });
    }

    Ok(numerator / denominator)
}

/// Minimum-variance allocation within bounds
pub fn solve(stats: &MarketStatistics, bounds: &AssetBounds) -> EngineResult<SolverOutput> {
    let raw = raw_weights(stats)?;
    debug!(raw = ?raw.as_slice(), "Minimum-variance raw weights");
    Ok(SolverOutput::closed_form(enforce(&raw, bounds)))
}
