//! Market data and holdings collaborators
//!
//! COMPLIANCE:
//! - Narrow async contracts, injected as `Arc<dyn ...>`
//! - In-memory implementations for embedding and tests
//! - FxHashMap behind parking_lot locks

use crate::error::{EngineError, EngineResult};
use crate::estimator::{AssetSeries, PricePoint};
use crate::position::Holding;
use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

/// Source of historical prices
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Time-ordered prices for `symbol`, at most the last `lookback` observations
    async fn historical_series(&self, symbol: &str, lookback: usize) -> EngineResult<AssetSeries>;
}

/// Source of current positions
#[async_trait]
pub trait HoldingsProvider: Send + Sync {
    /// Positions held by a portfolio; empty when it holds nothing
    async fn current_holdings(&self, portfolio_id: u64) -> EngineResult<Vec<Holding>>;
}

/// Price history kept in memory
#[derive(Debug, Default)]
pub struct InMemoryMarketData {
    series: RwLock<FxHashMap<String, Vec<PricePoint>>>,
}

impl InMemoryMarketData {
    /// Create empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or replace the history of a symbol
    pub fn insert(&self, series: AssetSeries) {
        self.series.write().insert(series.symbol, series.observations);
    }

    /// Append one observation
    pub fn push(&self, symbol: &str, point: PricePoint) {
        self.series
            .write()
            .entry(symbol.to_string())
            .or_default()
            .push(point);
    }

    /// Number of symbols stored
    pub fn len(&self) -> usize {
        self.series.read().len()
    }

    /// True when no symbols are stored
    pub fn is_empty(&self) -> bool {
        self.series.read().is_empty()
    }
}

#[async_trait]
impl MarketDataProvider for InMemoryMarketData {
    async fn historical_series(&self, symbol: &str, lookback: usize) -> EngineResult<AssetSeries> {
        let series = self.series.read();
        let observations = series.get(symbol).ok_or_else(|| EngineError::MarketData {
            symbol: symbol.to_string(),
            reason: "no price history".to_string(),
        })?;

        let start = observations.len().saturating_sub(lookback);
        debug!(symbol, observations = observations.len() - start, "Serving price history");
        Ok(AssetSeries::new(symbol, observations[start..].to_vec()))
    }
}

/// Holdings kept in memory
#[derive(Debug, Default)]
pub struct InMemoryHoldings {
    portfolios: RwLock<FxHashMap<u64, Vec<Holding>>>,
}

impl InMemoryHoldings {
    /// Create empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or replace the holdings of a portfolio
    pub fn set_holdings(&self, portfolio_id: u64, holdings: Vec<Holding>) {
        self.portfolios.write().insert(portfolio_id, holdings);
    }

    /// Drop a portfolio
    pub fn remove(&self, portfolio_id: u64) -> Option<Vec<Holding>> {
        self.portfolios.write().remove(&portfolio_id)
    }
}

#[async_trait]
impl HoldingsProvider for InMemoryHoldings {
    async fn current_holdings(&self, portfolio_id: u64) -> EngineResult<Vec<Holding>> {
        Ok(self
            .portfolios
            .read()
            .get(&portfolio_id)
            .cloned()
            .unwrap_or_default())
    }
}
