//! Portfolio optimization dispatcher
//!
//! COMPLIANCE:
//! - Routes to exactly one solver per call
//! - Constraint feasibility checked once, before any numerical work
//! - Seeded generator so identical inputs give identical weights

use crate::config::OptimizerConfig;
use crate::error::{EngineError, EngineResult};
use crate::constraints::{AssetBounds, OptimizationConstraints};
use crate::estimator::MarketStatistics;
use crate::solvers::{
    self, SolverOutput, black_litterman, hierarchical, maximum_sharpe, mean_variance,
    minimum_variance, risk_parity,
};
use crate::{OptimizationObjective, OptimizationResult, OptimizationStrategy};
use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;
use tracing::{debug, warn};

/// Portfolio optimizer
#[derive(Debug, Clone, Default)]
pub struct PortfolioOptimizer {
    config: OptimizerConfig,
}

impl PortfolioOptimizer {
    /// Create new optimizer
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Engine configuration
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Optimize with the configured seed
    pub fn optimize(
        &self,
        stats: &MarketStatistics,
        strategy: OptimizationStrategy,
        objective: OptimizationObjective,
        constraints: &OptimizationConstraints,
    ) -> EngineResult<OptimizationResult> {
        self.optimize_with_market_weights(stats, strategy, objective, constraints, None)
    }

    /// Optimize with caller market weights for BLACK_LITTERMAN
    pub fn optimize_with_market_weights(
        &self,
        stats: &MarketStatistics,
        strategy: OptimizationStrategy,
        objective: OptimizationObjective,
        constraints: &OptimizationConstraints,
        market_weights: Option<&DVector<f64>>,
    ) -> EngineResult<OptimizationResult> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        self.optimize_with_rng(
            stats,
            strategy,
            objective,
            constraints,
            market_weights,
            &mut rng,
        )
    }

    /// Optimize with a caller-supplied generator
    pub fn optimize_with_rng<R: Rng + ?Sized>(
        &self,
        stats: &MarketStatistics,
        strategy: OptimizationStrategy,
        objective: OptimizationObjective,
        constraints: &OptimizationConstraints,
        market_weights: Option<&DVector<f64>>,
        rng: &mut R,
    ) -> EngineResult<OptimizationResult> {
        let start = Instant::now();
        let bounds = constraints.validate(&stats.symbols)?;

        let output = self
            .dispatch(stats, strategy, objective, constraints, &bounds, market_weights, rng)
            .inspect_err(|e| {
                if matches!(e, EngineError::SingularMatrix { .. }) {
                    warn!(symbols = ?stats.symbols, %strategy, "Covariance inversion failed");
                }
            })?;

        let mu = output.expected_returns.as_ref().unwrap_or(&stats.expected_returns);
        let weights = output.weights;
        let expected_return = solvers::portfolio_return(mu, &weights);
        let expected_risk = solvers::portfolio_risk(&stats.covariance, &weights);
        let sharpe_ratio =
            solvers::sharpe_ratio(mu, &stats.covariance, &weights, self.config.risk_free_rate);
        let execution_time_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        debug!(
            %strategy,
            %objective,
            expected_return,
            expected_risk,
            sharpe_ratio,
            iterations = output.iterations,
            execution_time_ms,
            "Solver finished"
        );

        Ok(OptimizationResult {
            symbols: stats.symbols.clone(),
            weights: weights.iter().copied().collect(),
            expected_return,
            expected_risk,
            sharpe_ratio,
            convergence_status: output.status,
            iterations: output.iterations,
            execution_time_ms,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn dispatch<R: Rng + ?Sized>(
        &self,
        stats: &MarketStatistics,
        strategy: OptimizationStrategy,
        objective: OptimizationObjective,
        constraints: &OptimizationConstraints,
        bounds: &AssetBounds,
        market_weights: Option<&DVector<f64>>,
        rng: &mut R,
    ) -> EngineResult<SolverOutput> {
        let config = &self.config;
        let periods = stats.period_count();

        match strategy {
            OptimizationStrategy::ModernPortfolioTheory => mean_variance::solve(
                stats,
                objective,
                bounds,
                constraints.target_volatility,
                config,
                rng,
            ),
            OptimizationStrategy::MinimumVariance => minimum_variance::solve(stats, bounds),
            OptimizationStrategy::MaximumSharpe => maximum_sharpe::solve(
                &stats.expected_returns,
                &stats.covariance,
                periods,
                bounds,
                config.risk_free_rate,
            ),
            OptimizationStrategy::RiskParity => {
                Ok(risk_parity::solve(&stats.covariance, bounds, config))
            }
            OptimizationStrategy::BlackLitterman => black_litterman::solve(
                &stats.covariance,
                periods,
                bounds,
                market_weights,
                config.risk_aversion,
                config.risk_free_rate,
            ),
            OptimizationStrategy::HierarchicalRiskParity => {
                Ok(hierarchical::solve(&stats.volatilities(), bounds))
            }
        }
    }
}
