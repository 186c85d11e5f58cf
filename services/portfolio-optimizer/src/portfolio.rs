//! Performance and risk summaries of an optimized portfolio
//!
//! COMPLIANCE:
//! - Parametric (normal) VaR from the optimized volatility
//! - Summaries derived from the result only, never from live positions

use crate::rebalancer::{ActionType, AssetAllocation, RebalancingAction};
use crate::{OptimizationObjective, OptimizationResult, OptimizationStrategy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One-sided 95% normal quantile
pub const VAR_95_Z: f64 = 1.645;
/// Expected-shortfall multiple of sigma at 95%
pub const CVAR_95_MULTIPLIER: f64 = 2.0;
/// Weight above which a position counts toward diversification
pub const MIN_EFFECTIVE_WEIGHT: f64 = 1e-4;

/// Scale a per-period volatility to a yearly one (square-root-of-time)
#[inline]
pub fn annualize(volatility: f64, periods_per_year: usize) -> f64 {
    volatility * (periods_per_year as f64).sqrt()
}

/// Expected performance of the recommended allocation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpectedPerformance {
    pub expected_return: f64,
    pub expected_volatility: f64,
    pub sharpe_ratio: f64,
}

impl ExpectedPerformance {
    /// Performance straight from an optimization result
    pub fn from_result(result: &OptimizationResult) -> Self {
        Self {
            expected_return: result.expected_return,
            expected_volatility: result.expected_risk,
            sharpe_ratio: result.sharpe_ratio,
        }
    }
}

/// Coarse risk classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Asset carrying more than the allowed share of portfolio risk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskBudgetBreach {
    pub symbol: String,
    pub risk_share: f64,
    pub limit: f64,
}

/// Risk metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Value at Risk (95% confidence), as a fraction of portfolio value
    pub var_95: f64,
    /// Conditional VaR (95%)
    pub cvar_95: f64,
    /// Per-period volatility
    pub volatility: f64,
    /// Volatility scaled to one year; drives the risk level
    pub annualized_volatility: f64,
    /// 0..100, higher is more diversified
    pub diversification_score: f64,
    /// Largest single weight
    pub concentration: f64,
    pub risk_level: RiskLevel,
    /// Largest risk share divided by the budget limit
    pub risk_budget_utilization: Option<f64>,
    pub risk_budget_breaches: Vec<RiskBudgetBreach>,
}

impl RiskMetrics {
    /// Risk summary for a weight vector and its per-asset risk shares
    pub fn calculate(
        symbols: &[String],
        weights: &[f64],
        volatility: f64,
        risk_shares: &[f64],
        risk_budget_limit: Option<f64>,
        periods_per_year: usize,
    ) -> Self {
        let diversification_score = diversification_score(weights);
        let concentration = weights.iter().copied().fold(0.0, f64::max);
        let annualized_volatility = annualize(volatility, periods_per_year);
        let risk_level = classify_risk(annualized_volatility, concentration, diversification_score);

        let (risk_budget_utilization, risk_budget_breaches) = match risk_budget_limit {
            Some(limit) => {
                let max_share = risk_shares.iter().copied().fold(0.0, f64::max);
                let breaches = symbols
                    .iter()
                    .zip(risk_shares)
                    .filter(|(_, share)| **share > limit)
                    .map(|(symbol, share)| RiskBudgetBreach {
                        symbol: symbol.clone(),
                        risk_share: *share,
                        limit,
                    })
                    .collect();
                (Some(max_share / limit), breaches)
            }
            None => (None, Vec::new()),
        };

        Self {
            var_95: VAR_95_Z * volatility,
            cvar_95: CVAR_95_MULTIPLIER * volatility,
            volatility,
            annualized_volatility,
            diversification_score,
            concentration,
            risk_level,
            risk_budget_utilization,
            risk_budget_breaches,
        }
    }
}

/// Bucketed score from the number of meaningful positions
pub fn diversification_score(weights: &[f64]) -> f64 {
    let positions = weights.iter().filter(|w| **w > MIN_EFFECTIVE_WEIGHT).count();
    match positions {
        0..=1 => 20.0,
        2..=5 => 60.0,
        6..=10 => 80.0,
        _ => 95.0,
    }
}

/// High / medium / low from annualized volatility, concentration and diversification
pub fn classify_risk(volatility: f64, concentration: f64, diversification: f64) -> RiskLevel {
    if volatility > 0.25 || concentration > 0.5 || diversification < 40.0 {
        RiskLevel::High
    } else if volatility > 0.15 || concentration > 0.3 || diversification < 60.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Public result of one portfolio optimization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationOutcome {
    pub id: Uuid,
    pub portfolio_id: u64,
    pub strategy: OptimizationStrategy,
    pub objective: OptimizationObjective,
    pub result: OptimizationResult,
    /// One per optimized symbol, in optimization order
    pub recommended_allocations: Vec<AssetAllocation>,
    /// One per current holding
    pub current_allocations: Vec<AssetAllocation>,
    /// Largest change first
    pub rebalancing_actions: Vec<RebalancingAction>,
    pub expected_performance: ExpectedPerformance,
    pub risk_metrics: RiskMetrics,
    /// Annualized asset volatility above which a weight counts as high risk
    pub high_risk_volatility: f64,
    /// Periods per year used to annualize allocation volatilities
    pub periods_per_year: usize,
    pub generated_at: DateTime<Utc>,
    pub next_rebalancing_at: DateTime<Utc>,
}

impl OptimizationOutcome {
    /// True when any action moves a position
    pub fn requires_rebalancing(&self) -> bool {
        self.rebalancing_actions
            .iter()
            .any(|a| a.action_type != ActionType::Hold)
    }

    /// Total recommended weight in assets above the high-risk volatility
    pub fn high_risk_weight(&self) -> f64 {
        self.recommended_allocations
            .iter()
            .filter(|a| annualize(a.volatility, self.periods_per_year) > self.high_risk_volatility)
            .map(|a| a.weight)
            .sum()
    }

    /// Sum of estimated transaction costs
    pub fn total_estimated_cost(&self) -> f64 {
        self.rebalancing_actions
            .iter()
            .map(|a| a.estimated_cost)
            .sum()
    }

    /// Recommended allocation of a symbol
    pub fn allocation(&self, symbol: &str) -> Option<&AssetAllocation> {
        self.recommended_allocations
            .iter()
            .find(|a| a.symbol == symbol)
    }
}
