//! Weight constraints and normalization
//!
//! Every solver output passes through `enforce`, which leaves a weight
//! vector that sums to one and sits inside its per-asset bounds.

use crate::error::{EngineError, EngineResult};
use nalgebra::DVector;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default per-asset lower bound (long only)
pub const DEFAULT_MIN_WEIGHT: f64 = 0.0;
/// Default per-asset upper bound
pub const DEFAULT_MAX_WEIGHT: f64 = 0.5;
/// Slack allowed on the unit-sum and bounds invariants
pub const WEIGHT_EPSILON: f64 = 1e-9;

/// Inclusive weight range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightBounds {
    pub min: f64,
    pub max: f64,
}

impl WeightBounds {
    /// Create a bounds pair
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Clamp a weight into range
    #[inline]
    pub fn clamp(&self, weight: f64) -> f64 {
        weight.max(self.min).min(self.max)
    }

    /// True when the weight lies in range (within epsilon)
    #[inline]
    pub fn contains(&self, weight: f64) -> bool {
        weight >= self.min - WEIGHT_EPSILON && weight <= self.max + WEIGHT_EPSILON
    }
}

impl Default for WeightBounds {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_WEIGHT, DEFAULT_MAX_WEIGHT)
    }
}

/// Optimization constraints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationConstraints {
    /// Bounds applied to every asset without an override
    pub weight_bounds: WeightBounds,
    /// Per-symbol bound overrides
    pub asset_bounds: FxHashMap<String, WeightBounds>,
    /// Target portfolio standard deviation (TARGET_VOLATILITY only)
    pub target_volatility: Option<f64>,
    /// Maximum share of portfolio risk any single asset may carry
    pub risk_budget_limit: Option<f64>,
}

impl OptimizationConstraints {
    /// Constraints with the same bounds for every asset
    pub fn with_bounds(min: f64, max: f64) -> Self {
        Self {
            weight_bounds: WeightBounds::new(min, max),
            ..Self::default()
        }
    }

    /// Override the bounds of one symbol
    pub fn with_asset_bounds(mut self, symbol: impl Into<String>, bounds: WeightBounds) -> Self {
        self.asset_bounds.insert(symbol.into(), bounds);
        self
    }

    /// Set the target volatility
    pub fn with_target_volatility(mut self, target: f64) -> Self {
        self.target_volatility = Some(target);
        self
    }

    /// Set the risk budget limit
    pub fn with_risk_budget_limit(mut self, limit: f64) -> Self {
        self.risk_budget_limit = Some(limit);
        self
    }

    /// Bounds for each symbol, in order
    pub fn resolve(&self, symbols: &[String]) -> AssetBounds {
        AssetBounds(
            symbols
                .iter()
                .map(|s| {
                    self.asset_bounds
                        .get(s)
                        .copied()
                        .unwrap_or(self.weight_bounds)
                })
                .collect(),
        )
    }

    /// Resolve and check that a unit-sum vector can satisfy the bounds
    pub fn validate(&self, symbols: &[String]) -> EngineResult<AssetBounds> {
        if let Some(target) = self.target_volatility {
            if !(target.is_finite() && target >= 0.0) {
                return Err(EngineError::InvalidConstraints {
                    reason: format!("target volatility must be a non-negative number, got {target}"),
                });
            }
        }
        if let Some(limit) = self.risk_budget_limit {
            if !(limit > 0.0 && limit <= 1.0) {
                return Err(EngineError::InvalidConstraints {
                    reason: format!("risk budget limit must be in (0, 1], got {limit}"),
                });
            }
        }

        let bounds = self.resolve(symbols);
        bounds.check_feasible(symbols)?;
        Ok(bounds)
    }
}

/// Resolved per-asset bounds, aligned with the statistics' asset order
#[derive(Debug, Clone, PartialEq)]
pub struct AssetBounds(pub Vec<WeightBounds>);

impl AssetBounds {
    /// Same bounds for `n` assets
    pub fn uniform(n: usize, bounds: WeightBounds) -> Self {
        Self(vec![bounds; n])
    }

    /// Number of assets
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no assets are bounded
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bounds for asset `i`
    pub fn get(&self, i: usize) -> WeightBounds {
        self.0[i]
    }

    /// True when every weight is inside its bounds
    pub fn contains_all(&self, weights: &DVector<f64>) -> bool {
        weights
            .iter()
            .zip(&self.0)
            .all(|(w, b)| b.contains(*w))
    }

    fn check_feasible(&self, symbols: &[String]) -> EngineResult<()> {
        for (b, symbol) in self.0.iter().zip(symbols) {
            if !(b.min.is_finite() && b.max.is_finite()) || b.min < 0.0 || b.min > b.max {
                return Err(EngineError::InfeasibleConstraints {
                    reason: format!("{symbol}: bounds [{}, {}] are not a valid range", b.min, b.max),
                });
            }
        }

        let min_sum: f64 = self.0.iter().map(|b| b.min).sum();
        let max_sum: f64 = self.0.iter().map(|b| b.max).sum();
        if min_sum > 1.0 + WEIGHT_EPSILON {
            return Err(EngineError::InfeasibleConstraints {
                reason: format!("lower bounds sum to {min_sum:.4} > 1"),
            });
        }
        if max_sum < 1.0 - WEIGHT_EPSILON {
            return Err(EngineError::InfeasibleConstraints {
                reason: format!(
                    "upper bounds sum to {max_sum:.4} < 1 across {} assets",
                    self.0.len()
                ),
            });
        }
        Ok(())
    }
}

/// Equal weights summing to one
pub fn equal_weights(n: usize) -> DVector<f64> {
    if n == 0 {
        return DVector::zeros(0);
    }
    DVector::from_element(n, 1.0 / n as f64)
}

/// Clamp every component into its bounds
pub fn apply_constraints(weights: &DVector<f64>, bounds: &AssetBounds) -> DVector<f64> {
    DVector::from_iterator(
        weights.len(),
        weights
            .iter()
            .zip(&bounds.0)
            .map(|(w, b)| if w.is_finite() { b.clamp(*w) } else { b.min }),
    )
}

/// Divide by the sum; equal weights when the sum is not positive
pub fn normalize(weights: &DVector<f64>) -> DVector<f64> {
    let sum = weights.sum();
    if !sum.is_finite() || sum <= 0.0 {
        return equal_weights(weights.len());
    }
    weights / sum
}

/// Clamp, normalize, then redistribute until both invariants hold
///
/// Each redistribution pass pins at least one more asset at a bound, so the
/// loop ends within `n + 1` passes for feasible bounds.
pub fn enforce(weights: &DVector<f64>, bounds: &AssetBounds) -> DVector<f64> {
    let n = weights.len();
    let mut w = normalize(&apply_constraints(weights, bounds));

    for pass in 0..=n {
        w = apply_constraints(&w, bounds);
        let residual = 1.0 - w.sum();
        if residual.abs() <= WEIGHT_EPSILON {
            return w;
        }

        // Assets that can still absorb the residual in its direction
        let room: Vec<f64> = (0..n)
            .map(|i| {
                let b = bounds.get(i);
                if residual > 0.0 {
                    (b.max - w[i]).max(0.0)
                } else {
                    (w[i] - b.min).max(0.0)
                }
            })
            .collect();
        let free_weight: f64 = (0..n).filter(|&i| room[i] > 0.0).map(|i| w[i]).sum();
        let total_room: f64 = room.iter().sum();
        if total_room <= 0.0 {
            break;
        }

        debug!(pass, residual, "Redistributing constrained weights");

        if residual > 0.0 && free_weight > WEIGHT_EPSILON {
            // Scale free assets up proportionally to their current weight
            for i in 0..n {
                if room[i] > 0.0 {
                    w[i] += residual * w[i] / free_weight;
                }
            }
        } else {
            // Spread proportionally to remaining room
            for i in 0..n {
                w[i] += residual * room[i] / total_room;
            }
        }
    }

    let w = apply_constraints(&w, bounds);
    let residual = 1.0 - w.sum();
    if residual.abs() > WEIGHT_EPSILON {
        // Room-proportional fill always lands exactly for feasible bounds
        let room: Vec<f64> = (0..n)
            .map(|i| {
                let b = bounds.get(i);
                if residual > 0.0 { b.max - w[i] } else { w[i] - b.min }
            })
            .collect();
        let total_room: f64 = room.iter().sum();
        if total_room > 0.0 {
            return DVector::from_iterator(
                n,
                (0..n).map(|i| bounds.get(i).clamp(w[i] + residual * room[i] / total_room)),
            );
        }
    }
    w
}
