//! Optimizer configuration

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Risk-free rate subtracted from per-period expected returns (2%)
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.02;
/// Iteration cap shared by the heuristic search and risk parity
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;
/// Risk-parity convergence tolerance
pub const DEFAULT_TOLERANCE: f64 = 1e-6;
/// Standard deviation of the per-weight Gaussian perturbation
pub const DEFAULT_PERTURBATION_SCALE: f64 = 0.01;
/// Seed for reproducible heuristic search
pub const DEFAULT_SEED: u64 = 42;
/// Iterations without improvement before the search counts as converged
pub const DEFAULT_STALL_WINDOW: usize = 100;
/// Fitness penalty per unit of volatility miss for TARGET_VOLATILITY
pub const DEFAULT_TARGET_VOLATILITY_PENALTY: f64 = 10.0;
/// Exponent of the multiplicative risk-parity update
pub const DEFAULT_RISK_PARITY_DAMPING: f64 = 0.1;
/// Black-Litterman risk aversion (lambda)
pub const DEFAULT_RISK_AVERSION: f64 = 3.0;
/// One year of daily observations
pub const DEFAULT_LOOKBACK_PERIODS: usize = 252;
/// Weight drift below which a position is held (1%)
pub const DEFAULT_REBALANCE_DEADBAND: f64 = 0.01;
/// Proportional transaction cost (0.25%)
pub const DEFAULT_TRANSACTION_COST_RATE: f64 = 0.0025;
/// Annualized asset volatility above which it counts as high risk (20%)
pub const DEFAULT_HIGH_RISK_VOLATILITY: f64 = 0.20;
/// Return periods per year, used to annualize volatility (trading days)
pub const DEFAULT_PERIODS_PER_YEAR: usize = 252;
/// Days until the next suggested rebalance
pub const DEFAULT_REBALANCE_INTERVAL_DAYS: i64 = 30;
/// Concurrent optimizations in a batch
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Optimizer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Risk-free rate, compared directly against per-period returns
    pub risk_free_rate: f64,
    /// Iteration budget for iterative solvers
    pub max_iterations: usize,
    /// Risk-parity convergence tolerance
    pub tolerance: f64,
    /// Gaussian perturbation scale for the heuristic search
    pub perturbation_scale: f64,
    /// Seed for the heuristic search generator
    pub seed: u64,
    /// Trailing iterations without improvement that count as converged
    pub stall_window: usize,
    /// TARGET_VOLATILITY fitness penalty
    pub target_volatility_penalty: f64,
    /// Risk-parity damping exponent
    pub risk_parity_damping: f64,
    /// Black-Litterman risk aversion
    pub risk_aversion: f64,
    /// Price observations requested per symbol
    pub lookback_periods: usize,
    /// Rebalancing deadband
    pub rebalance_deadband: f64,
    /// Transaction cost rate applied to trade value
    pub transaction_cost_rate: f64,
    /// High-risk annualized volatility threshold
    pub high_risk_volatility: f64,
    /// Return periods per year
    pub periods_per_year: usize,
    /// Days between rebalances
    pub rebalance_interval_days: i64,
    /// Batch concurrency limit
    pub max_concurrency: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
            perturbation_scale: DEFAULT_PERTURBATION_SCALE,
            seed: DEFAULT_SEED,
            stall_window: DEFAULT_STALL_WINDOW,
            target_volatility_penalty: DEFAULT_TARGET_VOLATILITY_PENALTY,
            risk_parity_damping: DEFAULT_RISK_PARITY_DAMPING,
            risk_aversion: DEFAULT_RISK_AVERSION,
            lookback_periods: DEFAULT_LOOKBACK_PERIODS,
            rebalance_deadband: DEFAULT_REBALANCE_DEADBAND,
            transaction_cost_rate: DEFAULT_TRANSACTION_COST_RATE,
            high_risk_volatility: DEFAULT_HIGH_RISK_VOLATILITY,
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
            rebalance_interval_days: DEFAULT_REBALANCE_INTERVAL_DAYS,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl OptimizerConfig {
    /// Parse from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).context("Failed to parse optimizer config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read optimizer config {}", path.display()))?;
        Self::from_json_str(&raw)
    }

    /// Reject values the solvers cannot work with
    pub fn validate(&self) -> Result<()> {
        if !self.risk_free_rate.is_finite() {
            bail!("risk_free_rate must be finite");
        }
        if self.max_iterations == 0 {
            bail!("max_iterations must be positive");
        }
        if !(self.tolerance > 0.0) {
            bail!("tolerance must be positive");
        }
        if !(self.perturbation_scale > 0.0) {
            bail!("perturbation_scale must be positive");
        }
        if !(self.risk_parity_damping > 0.0 && self.risk_parity_damping <= 1.0) {
            bail!("risk_parity_damping must be in (0, 1]");
        }
        if !(self.risk_aversion > 0.0) {
            bail!("risk_aversion must be positive");
        }
        if !(self.target_volatility_penalty >= 0.0) {
            bail!("target_volatility_penalty must be non-negative");
        }
        if self.lookback_periods < 2 {
            bail!("lookback_periods must be at least 2");
        }
        if !(self.rebalance_deadband >= 0.0) {
            bail!("rebalance_deadband must be non-negative");
        }
        if !(self.transaction_cost_rate >= 0.0) {
            bail!("transaction_cost_rate must be non-negative");
        }
        if self.periods_per_year == 0 {
            bail!("periods_per_year must be positive");
        }
        if self.max_concurrency == 0 {
            bail!("max_concurrency must be positive");
        }
        Ok(())
    }
}
