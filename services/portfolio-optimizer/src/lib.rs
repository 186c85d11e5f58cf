//! Portfolio Optimizer Service
//!
//! Computes target allocations under six strategies and turns them into
//! rebalancing guidance against current holdings
//!
//! COMPLIANCE:
//! - Numerical engine is synchronous and pure over local matrices
//! - Every weight vector leaves the engine summing to one inside its bounds
//! - Collaborators injected as trait objects
//! - Failures are local to a single optimization call

pub mod batch;
pub mod config;
pub mod constraints;
pub mod error;
pub mod estimator;
pub mod market_feed;
pub mod optimization;
pub mod portfolio;
pub mod position;
pub mod rebalancer;
pub mod solvers;

pub use config::OptimizerConfig;
pub use constraints::{OptimizationConstraints, WeightBounds};
pub use error::{EngineError, EngineResult};
pub use estimator::{AssetSeries, MarketStatistics, PricePoint};
pub use market_feed::{HoldingsProvider, InMemoryHoldings, InMemoryMarketData, MarketDataProvider};
pub use optimization::PortfolioOptimizer;
pub use portfolio::OptimizationOutcome;
pub use position::Holding;

use nalgebra::DVector;
use rebalancer::ResultAssembler;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Portfolio optimization strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptimizationStrategy {
    /// Mean-variance family, objective selects the fitness
    ModernPortfolioTheory,
    /// Equal risk contribution
    RiskParity,
    /// Equilibrium returns fed to the tangency portfolio
    BlackLitterman,
    /// Closed-form minimum variance
    MinimumVariance,
    /// Closed-form tangency portfolio
    MaximumSharpe,
    /// Inverse volatility
    HierarchicalRiskParity,
}

impl OptimizationStrategy {
    /// All strategies with a solver
    pub const ALL: [Self; 6] = [
        Self::ModernPortfolioTheory,
        Self::RiskParity,
        Self::BlackLitterman,
        Self::MinimumVariance,
        Self::MaximumSharpe,
        Self::HierarchicalRiskParity,
    ];

    /// Canonical name
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ModernPortfolioTheory => "MODERN_PORTFOLIO_THEORY",
            Self::RiskParity => "RISK_PARITY",
            Self::BlackLitterman => "BLACK_LITTERMAN",
            Self::MinimumVariance => "MINIMUM_VARIANCE",
            Self::MaximumSharpe => "MAXIMUM_SHARPE",
            Self::HierarchicalRiskParity => "HIERARCHICAL_RISK_PARITY",
        }
    }
}

impl fmt::Display for OptimizationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizationStrategy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EngineError::UnsupportedStrategy {
                strategy: s.to_string(),
            })
    }
}

/// Objective of the mean-variance family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptimizationObjective {
    MaximizeReturn,
    MinimizeRisk,
    MaximizeSharpeRatio,
    TargetVolatility,
}

impl OptimizationObjective {
    /// All objectives
    pub const ALL: [Self; 4] = [
        Self::MaximizeReturn,
        Self::MinimizeRisk,
        Self::MaximizeSharpeRatio,
        Self::TargetVolatility,
    ];

    /// Canonical name
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MaximizeReturn => "MAXIMIZE_RETURN",
            Self::MinimizeRisk => "MINIMIZE_RISK",
            Self::MaximizeSharpeRatio => "MAXIMIZE_SHARPE_RATIO",
            Self::TargetVolatility => "TARGET_VOLATILITY",
        }
    }
}

impl fmt::Display for OptimizationObjective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizationObjective {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|objective| objective.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EngineError::UnsupportedObjective {
                objective: s.to_string(),
            })
    }
}

/// Solver convergence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConvergenceStatus {
    Converged,
    MaxIterationsReached,
    Failed,
}

/// Output of a single optimization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Asset order of `weights`
    pub symbols: Vec<String>,
    /// Weights summing to one, each within bounds
    pub weights: Vec<f64>,
    /// Portfolio expected return per period
    pub expected_return: f64,
    /// Portfolio standard deviation per period
    pub expected_risk: f64,
    pub sharpe_ratio: f64,
    pub convergence_status: ConvergenceStatus,
    pub iterations: usize,
    pub execution_time_ms: u64,
}

impl OptimizationResult {
    /// Weights as a vector aligned with the statistics
    pub fn weight_vector(&self) -> DVector<f64> {
        DVector::from_column_slice(&self.weights)
    }

    /// Weight of a symbol, if it was optimized
    pub fn weight_of(&self, symbol: &str) -> Option<f64> {
        self.symbols
            .iter()
            .position(|s| s == symbol)
            .map(|i| self.weights[i])
    }
}

/// A single portfolio optimization request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRequest {
    pub portfolio_id: u64,
    pub strategy: OptimizationStrategy,
    pub objective: OptimizationObjective,
    #[serde(default)]
    pub constraints: OptimizationConstraints,
    /// Candidate universe; the current holdings when absent
    #[serde(default)]
    pub symbols: Option<Vec<String>>,
    /// Market-capitalization weights for BLACK_LITTERMAN
    #[serde(default)]
    pub market_weights: Option<Vec<f64>>,
}

impl OptimizationRequest {
    /// Request over the current holdings with default constraints
    pub fn new(
        portfolio_id: u64,
        strategy: OptimizationStrategy,
        objective: OptimizationObjective,
    ) -> Self {
        Self {
            portfolio_id,
            strategy,
            objective,
            constraints: OptimizationConstraints::default(),
            symbols: None,
            market_weights: None,
        }
    }

    /// Replace the constraints
    pub fn with_constraints(mut self, constraints: OptimizationConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Optimize over a candidate universe
    pub fn with_symbols(mut self, symbols: Vec<String>) -> Self {
        self.symbols = Some(symbols);
        self
    }

    /// Supply market weights
    pub fn with_market_weights(mut self, weights: Vec<f64>) -> Self {
        self.market_weights = Some(weights);
        self
    }
}

/// Portfolio optimization service
///
/// Fetches holdings and price history from its collaborators, runs the
/// synchronous engine, and assembles the outcome.
pub struct PortfolioOptimizationService {
    /// Price history source
    market_data: Arc<dyn MarketDataProvider>,
    /// Current positions source
    holdings: Arc<dyn HoldingsProvider>,
    /// Strategy dispatcher
    optimizer: PortfolioOptimizer,
    /// Outcome assembly
    assembler: ResultAssembler,
}

impl PortfolioOptimizationService {
    /// Create new optimization service
    pub fn new(
        market_data: Arc<dyn MarketDataProvider>,
        holdings: Arc<dyn HoldingsProvider>,
        config: OptimizerConfig,
    ) -> Self {
        Self {
            market_data,
            holdings,
            assembler: ResultAssembler::new(&config),
            optimizer: PortfolioOptimizer::new(config),
        }
    }

    /// Engine configuration
    pub fn config(&self) -> &OptimizerConfig {
        self.optimizer.config()
    }

    /// Optimize the assets a portfolio currently holds
    pub async fn optimize(
        &self,
        portfolio_id: u64,
        strategy: OptimizationStrategy,
        objective: OptimizationObjective,
        constraints: OptimizationConstraints,
    ) -> EngineResult<OptimizationOutcome> {
        let request = OptimizationRequest::new(portfolio_id, strategy, objective)
            .with_constraints(constraints);
        self.execute(&request).await
    }

    /// Optimize over candidate symbols, held or not
    pub async fn optimize_universe(
        &self,
        portfolio_id: u64,
        symbols: Vec<String>,
        strategy: OptimizationStrategy,
        objective: OptimizationObjective,
        constraints: OptimizationConstraints,
    ) -> EngineResult<OptimizationOutcome> {
        let request = OptimizationRequest::new(portfolio_id, strategy, objective)
            .with_constraints(constraints)
            .with_symbols(symbols);
        self.execute(&request).await
    }

    /// Run one request end to end
    pub async fn execute(&self, request: &OptimizationRequest) -> EngineResult<OptimizationOutcome> {
        let portfolio_id = request.portfolio_id;
        info!(
            portfolio_id,
            strategy = %request.strategy,
            objective = %request.objective,
            "Starting portfolio optimization"
        );

        let holdings = self.holdings.current_holdings(portfolio_id).await?;
        let symbols = match &request.symbols {
            Some(symbols) if symbols.is_empty() => {
                return Err(EngineError::InsufficientData {
                    reason: "candidate universe is empty".to_string(),
                });
            }
            Some(symbols) => symbols.clone(),
            None if holdings.is_empty() => {
                return Err(EngineError::EmptyPortfolio { portfolio_id });
            }
            None => holdings.iter().map(|h| h.symbol.clone()).collect(),
        };

        let series = self.fetch_series(&symbols).await?;
        let stats = estimator::estimate(&series)?;
        debug!(
            portfolio_id,
            assets = stats.asset_count(),
            periods = stats.period_count(),
            "Estimated market statistics"
        );

        let market_weights = request
            .market_weights
            .as_deref()
            .map(DVector::from_column_slice);
        let result = self
            .optimizer
            .optimize_with_market_weights(
                &stats,
                request.strategy,
                request.objective,
                &request.constraints,
                market_weights.as_ref(),
            )
            .inspect_err(|e| warn!(portfolio_id, error = %e, "Portfolio optimization failed"))?;

        let outcome = self.assembler.assemble(
            portfolio_id,
            request.strategy,
            request.objective,
            &request.constraints,
            result,
            &stats,
            &holdings,
        );

        info!(
            portfolio_id,
            expected_return = outcome.result.expected_return,
            expected_risk = outcome.result.expected_risk,
            sharpe_ratio = outcome.result.sharpe_ratio,
            status = ?outcome.result.convergence_status,
            "Portfolio optimization completed"
        );
        Ok(outcome)
    }

    /// Fetch price history for every symbol concurrently
    async fn fetch_series(&self, symbols: &[String]) -> EngineResult<Vec<AssetSeries>> {
        let lookback = self.config().lookback_periods;
        futures::future::try_join_all(
            symbols
                .iter()
                .map(|symbol| self.market_data.historical_series(symbol, lookback)),
        )
        .await
    }
}
