//! Current holdings and their weights
//!
//! COMPLIANCE:
//! - Holdings are read-only snapshots from the holdings collaborator
//! - Weights derived from current market value only

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Single held position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub quantity: f64,
    /// Total cost paid for the position
    pub cost_basis: f64,
    /// Current market value of the position
    pub current_value: f64,
}

impl Holding {
    /// Create new holding
    pub fn new(symbol: impl Into<String>, quantity: f64, cost_basis: f64, current_value: f64) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            cost_basis,
            current_value,
        }
    }

    /// Current value per unit, when quantity is known
    #[inline]
    pub fn unit_price(&self) -> Option<f64> {
        if self.quantity != 0.0 && self.quantity.is_finite() {
            Some(self.current_value / self.quantity)
        } else {
            None
        }
    }

    /// Current value minus cost basis
    #[inline]
    pub fn unrealized_pnl(&self) -> f64 {
        self.current_value - self.cost_basis
    }
}

/// Sum of current values
pub fn total_value(holdings: &[Holding]) -> f64 {
    holdings.iter().map(|h| h.current_value).sum()
}

/// Weight of each holding: value / total value
///
/// Empty when the portfolio has no positive value.
pub fn current_weights(holdings: &[Holding]) -> FxHashMap<String, f64> {
    let total = total_value(holdings);
    let mut weights = FxHashMap::default();
    if total <= 0.0 || !total.is_finite() {
        return weights;
    }
    weights.reserve(holdings.len());
    for h in holdings {
        *weights.entry(h.symbol.clone()).or_insert(0.0) += h.current_value / total;
    }
    weights
}
