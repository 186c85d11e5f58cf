//! Inverse-volatility allocation
//!
//! Stands in for hierarchical risk parity without the clustering step:
//! w_i proportional to 1 / sigma_i.

use super::SolverOutput;
use crate::constraints::{AssetBounds, enforce, normalize};
use nalgebra::DVector;

/// Floor on asset volatility before inversion
const MIN_VOLATILITY: f64 = 1e-12;

/// Inverse-volatility weights summing to one
pub fn inverse_volatility_weights(volatilities: &DVector<f64>) -> DVector<f64> {
    normalize(&volatilities.map(|v| 1.0 / v.max(MIN_VOLATILITY)))
}

/// Inverse-volatility allocation within bounds
pub fn solve(volatilities: &DVector<f64>, bounds: &AssetBounds) -> SolverOutput {
    SolverOutput::closed_form(enforce(&inverse_volatility_weights(volatilities), bounds))
}
