//! Strategy solvers
//!
//! Each solver is a pure function of the estimator output, the resolved
//! bounds and the optimizer configuration. All of them hand back weights that
//! already passed through `constraints::enforce`.

pub mod black_litterman;
pub mod hierarchical;
pub mod maximum_sharpe;
pub mod mean_variance;
pub mod minimum_variance;
pub mod risk_parity;

use crate::ConvergenceStatus;
use crate::error::{EngineError, EngineResult};
use nalgebra::{DMatrix, DVector};
use tracing::warn;

/// |correlation| at or above this is treated as perfect collinearity
const COLLINEARITY_THRESHOLD: f64 = 1.0 - 1e-12;

/// Raw solver output before the dispatcher measures and wraps it
#[derive(Debug, Clone)]
pub struct SolverOutput {
    /// Constrained weights
    pub weights: DVector<f64>,
    /// Expected returns the result should be reported against
    pub expected_returns: Option<DVector<f64>>,
    /// Convergence of the solver
    pub status: ConvergenceStatus,
    /// Iterations performed (zero for closed forms)
    pub iterations: usize,
}

impl SolverOutput {
    /// Closed-form solution
    pub fn closed_form(weights: DVector<f64>) -> Self {
        Self {
            weights,
            expected_returns: None,
            status: ConvergenceStatus::Converged,
            iterations: 0,
        }
    }
}

/// Portfolio expected return: mu . w
#[inline]
pub fn portfolio_return(expected_returns: &DVector<f64>, weights: &DVector<f64>) -> f64 {
    expected_returns.dot(weights)
}

/// Portfolio variance: w' Sigma w, floored at zero
#[inline]
pub fn portfolio_variance(covariance: &DMatrix<f64>, weights: &DVector<f64>) -> f64 {
    weights.dot(&(covariance * weights)).max(0.0)
}

/// Portfolio standard deviation
#[inline]
pub fn portfolio_risk(covariance: &DMatrix<f64>, weights: &DVector<f64>) -> f64 {
    portfolio_variance(covariance, weights).sqrt()
}

/// Sharpe ratio; zero when the portfolio carries no risk
pub fn sharpe_ratio(
    expected_returns: &DVector<f64>,
    covariance: &DMatrix<f64>,
    weights: &DVector<f64>,
    risk_free_rate: f64,
) -> f64 {
    let risk = portfolio_risk(covariance, weights);
    if risk > 0.0 {
        (portfolio_return(expected_returns, weights) - risk_free_rate) / risk
    } else {
        0.0
    }
}

/// Risk contributions RC_i = w_i (Sigma w)_i / sigma_p; they sum to sigma_p
///
/// Returns `None` when the portfolio has zero risk.
pub fn risk_contributions(covariance: &DMatrix<f64>, weights: &DVector<f64>) -> Option<DVector<f64>> {
    let risk = portfolio_risk(covariance, weights);
    if risk <= 0.0 || !risk.is_finite() {
        return None;
    }
    let marginal = covariance * weights;
    Some(weights.component_mul(&marginal) / risk)
}

/// Invert the covariance matrix through LU decomposition
///
/// A matrix estimated from fewer periods than assets is rank deficient by
/// construction and rejected before factorization, as is any matrix with a
/// zero-variance asset or a perfectly correlated pair.
pub fn invert_covariance(covariance: &DMatrix<f64>, periods: usize) -> EngineResult<DMatrix<f64>> {
    let n = covariance.nrows();
    if periods < n {
        warn!(periods, assets = n, "Covariance rank deficient");
        return Err(EngineError::SingularMatrix {
            reason: format!("{periods} return periods cannot identify {n} assets"),
        });
    }
    if let Some(reason) = degenerate_assets(covariance) {
        warn!(assets = n, %reason, "Covariance matrix is singular");
        return Err(EngineError::SingularMatrix { reason });
    }

    let lu = covariance.clone().lu();
    let u = lu.u();
    let min_pivot = u.diagonal().iter().fold(f64::INFINITY, |acc, p| acc.min(p.abs()));
    if n == 0 || min_pivot == 0.0 || !min_pivot.is_finite() {
        warn!(assets = n, min_pivot, "Covariance matrix is singular");
        return Err(EngineError::SingularMatrix {
            reason: "LU decomposition hit a zero pivot (duplicate or collinear assets)".to_string(),
        });
    }

    let inverse = lu.try_inverse().ok_or_else(|| EngineError::SingularMatrix {
        reason: "LU inverse failed".to_string(),
    })?;
    if inverse.iter().any(|v| !v.is_finite()) {
        return Err(EngineError::SingularMatrix {
            reason: "inverse has non-finite entries".to_string(),
        });
    }
    Ok(inverse)
}

/// Zero-variance assets or perfectly correlated pairs, by index
fn degenerate_assets(covariance: &DMatrix<f64>) -> Option<String> {
    let n = covariance.nrows();
    for i in 0..n {
        if covariance[(i, i)] <= 0.0 {
            return Some(format!("asset {i} has zero variance"));
        }
    }
    for i in 0..n {
        for j in (i + 1)..n {
            let corr = covariance[(i, j)] / (covariance[(i, i)] * covariance[(j, j)]).sqrt();
            if corr.abs() >= COLLINEARITY_THRESHOLD {
                return Some(format!("assets {i} and {j} are perfectly correlated"));
            }
        }
    }
    None
}
