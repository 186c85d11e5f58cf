//! Result assembly and rebalancing guidance
//!
//! COMPLIANCE:
//! - One action per recommended symbol, largest change first
//! - Deadband keeps small drifts as Hold
//! - Trade sizing from current market value only

use crate::config::OptimizerConfig;
use crate::constraints::OptimizationConstraints;
use crate::estimator::MarketStatistics;
use crate::portfolio::{ExpectedPerformance, OptimizationOutcome, RiskMetrics};
use crate::position::{Holding, current_weights, total_value};
use crate::solvers::risk_contributions;
use crate::{OptimizationObjective, OptimizationResult, OptimizationStrategy};
use chrono::{Duration, Utc};
use nalgebra::DVector;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Per-asset view of an allocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetAllocation {
    pub symbol: String,
    pub weight: f64,
    /// Weight the portfolio holds today
    pub current_weight: Option<f64>,
    pub expected_return: f64,
    pub volatility: f64,
    /// weight * expected return
    pub return_contribution: f64,
    /// Share of portfolio risk carried by the asset
    pub risk_contribution: f64,
}

/// Direction of a rebalancing action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    IncreasePosition,
    ReducePosition,
    Hold,
}

/// Urgency of a rebalancing action
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl ActionPriority {
    /// Priority from the drift measured in deadbands
    pub fn from_drift(drift: f64, deadband: f64) -> Self {
        if deadband <= 0.0 {
            return if drift > 0.0 { Self::Critical } else { Self::Low };
        }
        let ratio = drift / deadband;
        if ratio >= 3.0 {
            Self::Critical
        } else if ratio >= 2.0 {
            Self::High
        } else if ratio >= 1.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Suggested change to one position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalancingAction {
    pub symbol: String,
    pub action_type: ActionType,
    /// |target - current| weight
    pub magnitude: f64,
    pub priority: ActionPriority,
    pub current_weight: f64,
    pub target_weight: f64,
    /// Signed value to buy (+) or sell (-)
    pub trade_value: f64,
    /// Signed units, when the unit price is known
    pub estimated_quantity: Option<f64>,
    pub estimated_cost: f64,
    pub reason: String,
}

/// Builds the public outcome from an optimization result
#[derive(Debug, Clone)]
pub struct ResultAssembler {
    deadband: f64,
    transaction_cost_rate: f64,
    high_risk_volatility: f64,
    periods_per_year: usize,
    rebalance_interval_days: i64,
}

impl ResultAssembler {
    /// Create new assembler
    pub fn new(config: &OptimizerConfig) -> Self {
        Self {
            deadband: config.rebalance_deadband,
            transaction_cost_rate: config.transaction_cost_rate,
            high_risk_volatility: config.high_risk_volatility,
            periods_per_year: config.periods_per_year,
            rebalance_interval_days: config.rebalance_interval_days,
        }
    }

    /// Full outcome for one optimization
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        &self,
        portfolio_id: u64,
        strategy: OptimizationStrategy,
        objective: OptimizationObjective,
        constraints: &OptimizationConstraints,
        result: OptimizationResult,
        stats: &MarketStatistics,
        holdings: &[Holding],
    ) -> OptimizationOutcome {
        let current = current_weights(holdings);
        let risk_shares = risk_shares(stats, &result.weight_vector());

        let recommended_allocations = self.recommended_allocations(&result, stats, &risk_shares, &current);
        let current_allocations = self.current_allocations(stats, holdings, &current);
        let rebalancing_actions = self.rebalancing_actions(&result, holdings);

        let risk_metrics = RiskMetrics::calculate(
            &result.symbols,
            &result.weights,
            result.expected_risk,
            &risk_shares,
            constraints.risk_budget_limit,
            self.periods_per_year,
        );
        let generated_at = Utc::now();

        debug!(
            portfolio_id,
            actions = rebalancing_actions.len(),
            risk_level = ?risk_metrics.risk_level,
            "Assembled optimization outcome"
        );

        OptimizationOutcome {
            id: Uuid::new_v4(),
            portfolio_id,
            strategy,
            objective,
            expected_performance: ExpectedPerformance::from_result(&result),
            result,
            recommended_allocations,
            current_allocations,
            rebalancing_actions,
            risk_metrics,
            high_risk_volatility: self.high_risk_volatility,
            periods_per_year: self.periods_per_year,
            generated_at,
            next_rebalancing_at: generated_at + Duration::days(self.rebalance_interval_days),
        }
    }

    /// Allocation for every optimized symbol
    pub fn recommended_allocations(
        &self,
        result: &OptimizationResult,
        stats: &MarketStatistics,
        risk_shares: &[f64],
        current: &FxHashMap<String, f64>,
    ) -> Vec<AssetAllocation> {
        let volatilities = stats.volatilities();
        result
            .symbols
            .iter()
            .enumerate()
            .map(|(i, symbol)| {
                let weight = result.weights[i];
                let expected_return = stats.expected_returns[i];
                AssetAllocation {
                    symbol: symbol.clone(),
                    weight,
                    current_weight: current.get(symbol).copied(),
                    expected_return,
                    volatility: volatilities[i],
                    return_contribution: weight * expected_return,
                    risk_contribution: risk_shares[i],
                }
            })
            .collect()
    }

    /// Allocation for every current holding
    ///
    /// Holdings outside the optimized universe carry no return or risk figures;
    /// risk shares are taken over the held part of the universe.
    pub fn current_allocations(
        &self,
        stats: &MarketStatistics,
        holdings: &[Holding],
        current: &FxHashMap<String, f64>,
    ) -> Vec<AssetAllocation> {
        let volatilities = stats.volatilities();
        let held = DVector::from_iterator(
            stats.asset_count(),
            stats
                .symbols
                .iter()
                .map(|s| current.get(s).copied().unwrap_or(0.0)),
        );
        let held_risk_shares = risk_shares(stats, &held);
        holdings
            .iter()
            .map(|h| {
                let weight = current.get(&h.symbol).copied().unwrap_or(0.0);
                let index = stats.symbols.iter().position(|s| s == &h.symbol);
                let expected_return = index.map_or(0.0, |i| stats.expected_returns[i]);
                AssetAllocation {
                    symbol: h.symbol.clone(),
                    weight,
                    current_weight: Some(weight),
                    expected_return,
                    volatility: index.map_or(0.0, |i| volatilities[i]),
                    return_contribution: weight * expected_return,
                    risk_contribution: index.map_or(0.0, |i| held_risk_shares[i]),
                }
            })
            .collect()
    }

    /// Diff target weights against current holdings
    pub fn rebalancing_actions(
        &self,
        result: &OptimizationResult,
        holdings: &[Holding],
    ) -> Vec<RebalancingAction> {
        let current = current_weights(holdings);
        let portfolio_value = total_value(holdings);
        let unit_prices: FxHashMap<&str, f64> = holdings
            .iter()
            .filter_map(|h| h.unit_price().map(|p| (h.symbol.as_str(), p)))
            .collect();

        let mut actions: Vec<RebalancingAction> = result
            .symbols
            .iter()
            .zip(&result.weights)
            .map(|(symbol, &target)| {
                let current_weight = current.get(symbol).copied().unwrap_or(0.0);
                let delta = target - current_weight;
                let magnitude = delta.abs();

                let (action_type, reason) = if delta > self.deadband {
                    (
                        ActionType::IncreasePosition,
                        format!(
                            "Increase {symbol} from {:.2}% to {:.2}%",
                            current_weight * 100.0,
                            target * 100.0
                        ),
                    )
                } else if delta < -self.deadband {
                    (
                        ActionType::ReducePosition,
                        format!(
                            "Reduce {symbol} from {:.2}% to {:.2}%",
                            current_weight * 100.0,
                            target * 100.0
                        ),
                    )
                } else {
                    (
                        ActionType::Hold,
                        format!("{symbol} within {:.2}% of target", self.deadband * 100.0),
                    )
                };

                let priority = match action_type {
                    ActionType::Hold => ActionPriority::Low,
                    _ => ActionPriority::from_drift(magnitude, self.deadband),
                };
                let trade_value = delta * portfolio_value;
                let estimated_quantity = unit_prices
                    .get(symbol.as_str())
                    .filter(|p| **p > 0.0)
                    .map(|p| trade_value / p);

                RebalancingAction {
                    symbol: symbol.clone(),
                    action_type,
                    magnitude,
                    priority,
                    current_weight,
                    target_weight: target,
                    trade_value,
                    estimated_quantity,
                    estimated_cost: trade_value.abs() * self.transaction_cost_rate,
                    reason,
                }
            })
            .collect();

        actions.sort_by(|a, b| b.magnitude.total_cmp(&a.magnitude));
        actions
    }
}

/// Share of portfolio risk per asset; zeros for a riskless portfolio
fn risk_shares(stats: &MarketStatistics, weights: &DVector<f64>) -> Vec<f64> {
    let n = weights.len();
    match risk_contributions(&stats.covariance, weights) {
        Some(rc) => {
            let total = rc.sum();
            if total > 0.0 {
                rc.iter().map(|c| c / total).collect()
            } else {
                vec![0.0; n]
            }
        }
        None => vec![0.0; n],
    }
}
