//! Return and covariance estimation from historical prices
//!
//! - Simple period-over-period returns
//! - Arithmetic mean expected returns
//! - Unbiased (T - 1) sample covariance, bitwise symmetric

use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Single price observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

/// Chronological price history for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSeries {
    pub symbol: String,
    pub observations: Vec<PricePoint>,
}

impl AssetSeries {
    /// Create a series from observations
    pub fn new(symbol: impl Into<String>, observations: Vec<PricePoint>) -> Self {
        Self {
            symbol: symbol.into(),
            observations,
        }
    }

    /// Build a series from bare prices on a daily grid ending at `end`
    pub fn from_prices(symbol: impl Into<String>, prices: &[f64], end: DateTime<Utc>) -> Self {
        let n = prices.len();
        let observations = prices
            .iter()
            .enumerate()
            .map(|(i, &price)| PricePoint {
                timestamp: end - chrono::Duration::days((n - 1 - i) as i64),
                price,
            })
            .collect();
        Self::new(symbol, observations)
    }

    /// Number of observations
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// True when the series has no observations
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Simple returns r_t = (p_t - p_{t-1}) / p_{t-1}
    pub fn simple_returns(&self) -> EngineResult<Vec<f64>> {
        if let Some((index, point)) = self
            .observations
            .iter()
            .enumerate()
            .find(|(_, p)| !p.price.is_finite() || p.price <= 0.0)
        {
            return Err(EngineError::InvalidPrice {
                symbol: self.symbol.clone(),
                index,
                price: point.price,
            });
        }

        Ok(self
            .observations
            .windows(2)
            .map(|w| (w[1].price - w[0].price) / w[0].price)
            .collect())
    }
}

/// Estimator output shared by every solver
#[derive(Debug, Clone)]
pub struct MarketStatistics {
    /// Asset order of every vector and matrix below
    pub symbols: Vec<String>,
    /// T x N returns, row t = returns of all assets at t
    pub returns: DMatrix<f64>,
    /// Length-N mean returns
    pub expected_returns: DVector<f64>,
    /// N x N sample covariance
    pub covariance: DMatrix<f64>,
}

impl MarketStatistics {
    /// Number of assets
    pub fn asset_count(&self) -> usize {
        self.symbols.len()
    }

    /// Number of return periods
    pub fn period_count(&self) -> usize {
        self.returns.nrows()
    }

    /// Per-asset standard deviation (sqrt of the covariance diagonal)
    pub fn volatilities(&self) -> DVector<f64> {
        self.covariance.diagonal().map(|v| v.max(0.0).sqrt())
    }

    /// Build statistics directly from a T x N returns matrix
    pub fn from_returns(symbols: Vec<String>, returns: DMatrix<f64>) -> EngineResult<Self> {
        let n = returns.ncols();
        let t = returns.nrows();

        if n == 0 || symbols.is_empty() {
            return Err(EngineError::InsufficientData {
                reason: "no assets to estimate".to_string(),
            });
        }
        if symbols.len() != n {
            return Err(EngineError::InsufficientData {
                reason: format!("{} symbols for {} return columns", symbols.len(), n),
            });
        }
        if t < 2 {
            return Err(EngineError::InsufficientData {
                reason: format!("covariance needs at least 2 return periods, got {t}"),
            });
        }

        let columns: Vec<Vec<f64>> = (0..n)
            .map(|j| returns.column(j).iter().copied().collect())
            .collect();
        let means: Vec<f64> = columns.iter().map(|c| c.iter().mean()).collect();
        let expected_returns = DVector::from_vec(means.clone());

        let centered: Vec<DVector<f64>> = columns
            .iter()
            .zip(&means)
            .map(|(c, m)| DVector::from_iterator(t, c.iter().map(|x| x - m)))
            .collect();

        let denom = (t - 1) as f64;
        let mut covariance = DMatrix::zeros(n, n);
        for i in 0..n {
            for j in i..n {
                let c = centered[i].dot(&centered[j]) / denom;
                covariance[(i, j)] = c;
                covariance[(j, i)] = c;
            }
        }

        Ok(Self {
            symbols,
            returns,
            expected_returns,
            covariance,
        })
    }
}

/// Estimate expected returns and covariance from aligned price series
pub fn estimate(series: &[AssetSeries]) -> EngineResult<MarketStatistics> {
    let Some(first) = series.first() else {
        return Err(EngineError::InsufficientData {
            reason: "no price series supplied".to_string(),
        });
    };

    let expected_len = first.len();
    for s in series {
        if s.len() < 2 {
            return Err(EngineError::InsufficientData {
                reason: format!("{} has {} observations, need at least 2", s.symbol, s.len()),
            });
        }
        if s.len() != expected_len {
            return Err(EngineError::InsufficientData {
                reason: format!(
                    "series length mismatch: {} has {}, {} has {}",
                    first.symbol,
                    expected_len,
                    s.symbol,
                    s.len()
                ),
            });
        }
    }

    let periods = expected_len - 1;
    let mut returns = DMatrix::zeros(periods, series.len());
    for (j, s) in series.iter().enumerate() {
        for (t, r) in s.simple_returns()?.into_iter().enumerate() {
            returns[(t, j)] = r;
        }
    }

    let symbols = series.iter().map(|s| s.symbol.clone()).collect();
    MarketStatistics::from_returns(symbols, returns)
}
