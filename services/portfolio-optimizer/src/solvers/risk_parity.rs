//! Iterative equal-risk-contribution solver
//!
//! Multiplicative update w_i <- w_i (target / RC_i)^damping, renormalized
//! every pass. Never fails: degenerate inputs come back as equal weights
//! with a `Failed` status.

use super::{SolverOutput, portfolio_risk, risk_contributions};
use crate::ConvergenceStatus;
use crate::config::OptimizerConfig;
use crate::constraints::{AssetBounds, enforce, equal_weights, normalize};
use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

/// Largest distance of any contribution from the equal-risk target
pub fn max_deviation(covariance: &DMatrix<f64>, weights: &DVector<f64>) -> Option<f64> {
    let rc = risk_contributions(covariance, weights)?;
    let target = portfolio_risk(covariance, weights) / weights.len() as f64;
    Some(rc.iter().map(|c| (c - target).abs()).fold(0.0, f64::max))
}

/// Equal-risk-contribution weights, unconstrained
pub fn iterate(covariance: &DMatrix<f64>, config: &OptimizerConfig) -> SolverOutput {
    let n = covariance.nrows();
    let mut weights = equal_weights(n);
    let mut best = weights.clone();
    let mut best_deviation = f64::INFINITY;

    for iteration in 0..config.max_iterations {
        let risk = portfolio_risk(covariance, &weights);
        let Some(rc) = risk_contributions(covariance, &weights) else {
            warn!(iteration, "Risk parity found zero portfolio risk");
            return SolverOutput {
                weights: equal_weights(n),
                expected_returns: None,
                status: ConvergenceStatus::Failed,
                iterations: iteration,
            };
        };

        let target = risk / n as f64;
        let deviation = rc.iter().map(|c| (c - target).abs()).fold(0.0, f64::max);
        if deviation < best_deviation {
            best_deviation = deviation;
            best = weights.clone();
        }
        if deviation < config.tolerance {
            debug!(iteration, deviation, "Risk parity converged");
            return SolverOutput {
                weights,
                expected_returns: None,
                status: ConvergenceStatus::Converged,
                iterations: iteration,
            };
        }

        let updated = DVector::from_iterator(
            n,
            weights.iter().zip(rc.iter()).map(|(w, c)| {
                let c = c.max(f64::EPSILON);
                w * (target / c).powf(config.risk_parity_damping)
            }),
        );
        weights = normalize(&updated);
    }

    debug!(best_deviation, "Risk parity hit the iteration limit");
    SolverOutput {
        weights: best,
        expected_returns: None,
        status: ConvergenceStatus::MaxIterationsReached,
        iterations: config.max_iterations,
    }
}

/// Risk-parity allocation within bounds
pub fn solve(covariance: &DMatrix<f64>, bounds: &AssetBounds, config: &OptimizerConfig) -> SolverOutput {
    let mut output = iterate(covariance, config);
    output.weights = enforce(&output.weights, bounds);
    output
}
