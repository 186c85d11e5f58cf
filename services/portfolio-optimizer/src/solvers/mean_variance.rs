//! Mean-variance family
//!
//! MinimizeRisk uses the closed form. The other objectives run a seeded
//! hill-climb: perturb every weight with Gaussian noise, repair, and keep the
//! candidate only when its fitness strictly improves.

use super::{SolverOutput, minimum_variance, portfolio_return, portfolio_risk, sharpe_ratio};
use crate::config::OptimizerConfig;
use crate::constraints::{AssetBounds, enforce, equal_weights};
use crate::error::{EngineError, EngineResult};
use crate::estimator::MarketStatistics;
use crate::{ConvergenceStatus, OptimizationObjective};
use nalgebra::DVector;
use rand::Rng;
use rand_distr::StandardNormal;
use tracing::debug;

/// Scalar fitness maximized by the heuristic search
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fitness {
    /// mu . w
    Return,
    /// (mu . w - rf) / sigma
    Sharpe { risk_free_rate: f64 },
    /// Sharpe minus a penalty on the distance from a target sigma
    TargetVolatility {
        risk_free_rate: f64,
        target: f64,
        penalty: f64,
    },
}

impl Fitness {
    /// Fitness for a search objective; `None` for closed-form objectives
    pub fn for_objective(
        objective: OptimizationObjective,
        target_volatility: Option<f64>,
        config: &OptimizerConfig,
    ) -> EngineResult<Option<Self>> {
        let fitness = match objective {
            OptimizationObjective::MinimizeRisk => None,
            OptimizationObjective::MaximizeReturn => Some(Self::Return),
            OptimizationObjective::MaximizeSharpeRatio => Some(Self::Sharpe {
                risk_free_rate: config.risk_free_rate,
            }),
            OptimizationObjective::TargetVolatility => {
                let target = target_volatility.ok_or_else(|| EngineError::InvalidConstraints {
                    reason: "TARGET_VOLATILITY requires a target volatility".to_string(),
                })?;
                Some(Self::TargetVolatility {
                    risk_free_rate: config.risk_free_rate,
                    target,
                    penalty: config.target_volatility_penalty,
                })
            }
        };
        Ok(fitness)
    }

    /// Evaluate for a weight vector
    pub fn evaluate(&self, stats: &MarketStatistics, weights: &DVector<f64>) -> f64 {
        let mu = &stats.expected_returns;
        let cov = &stats.covariance;
        match *self {
            Self::Return => portfolio_return(mu, weights),
            Self::Sharpe { risk_free_rate } => sharpe_ratio(mu, cov, weights, risk_free_rate),
            Self::TargetVolatility {
                risk_free_rate,
                target,
                penalty,
            } => {
                sharpe_ratio(mu, cov, weights, risk_free_rate)
                    - penalty * (portfolio_risk(cov, weights) - target).abs()
            }
        }
    }
}

/// Outcome of a heuristic search
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub weights: DVector<f64>,
    pub fitness: f64,
    /// Fitness after every iteration (non-decreasing)
    pub history: Vec<f64>,
    /// Last iteration that improved the fitness
    pub last_improvement: Option<usize>,
    pub status: ConvergenceStatus,
}

/// Seeded random-perturbation hill-climb
pub fn hill_climb<R: Rng + ?Sized>(
    stats: &MarketStatistics,
    bounds: &AssetBounds,
    fitness: Fitness,
    config: &OptimizerConfig,
    rng: &mut R,
) -> SearchOutcome {
    let n = stats.asset_count();
    let mut best = enforce(&equal_weights(n), bounds);
    let mut best_fitness = fitness.evaluate(stats, &best);
    let mut history = Vec::with_capacity(config.max_iterations);
    let mut last_improvement = None;

    for iteration in 0..config.max_iterations {
        let candidate = DVector::from_iterator(
            n,
            best.iter().map(|w| {
                let noise: f64 = rng.sample(StandardNormal);
                w + noise * config.perturbation_scale
            }),
        );
        let candidate = enforce(&candidate, bounds);
        let candidate_fitness = fitness.evaluate(stats, &candidate);

        if candidate_fitness > best_fitness {
            best = candidate;
            best_fitness = candidate_fitness;
            last_improvement = Some(iteration);
        }
        history.push(best_fitness);
    }

    let stalled = match last_improvement {
        None => true,
        Some(i) => config.max_iterations - 1 - i >= config.stall_window,
    };
    let status = if stalled {
        ConvergenceStatus::Converged
    } else {
        ConvergenceStatus::MaxIterationsReached
    };

    debug!(
        fitness = best_fitness,
        ?last_improvement,
        ?status,
        "Heuristic search finished"
    );

    SearchOutcome {
        weights: best,
        fitness: best_fitness,
        history,
        last_improvement,
        status,
    }
}

/// Mean-variance allocation for an objective
pub fn solve<R: Rng + ?Sized>(
    stats: &MarketStatistics,
    objective: OptimizationObjective,
    bounds: &AssetBounds,
    target_volatility: Option<f64>,
    config: &OptimizerConfig,
    rng: &mut R,
) -> EngineResult<SolverOutput> {
    let Some(fitness) = Fitness::for_objective(objective, target_volatility, config)? else {
        return minimum_variance::solve(stats, bounds);
    };

    let outcome = hill_climb(stats, bounds, fitness, config, rng);
    Ok(SolverOutput {
        weights: outcome.weights,
        expected_returns: None,
        status: outcome.status,
        iterations: config.max_iterations,
    })
}
