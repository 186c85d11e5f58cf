//! Shared test utilities: tracing setup and synthetic market data

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use nalgebra::DMatrix;
use portfolio_optimizer::{
    AssetSeries, Holding, InMemoryHoldings, InMemoryMarketData, MarketStatistics, OptimizerConfig,
    PortfolioOptimizationService,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::sync::{Arc, Once};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Ensure tracing is initialized only once across all tests
static INIT: Once = Once::new();

/// Initialize test environment
pub fn init_test_env() {
    INIT.call_once(|| {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "portfolio_optimizer=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .init();
    });
}

pub fn symbols(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Random-walk prices with per-asset drift and volatility
pub fn random_prices(periods: usize, drift: f64, volatility: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut price = 100.0;
    let mut prices = Vec::with_capacity(periods + 1);
    prices.push(price);
    for _ in 0..periods {
        let shock: f64 = rng.sample(StandardNormal);
        price *= 1.0 + drift + volatility * shock;
        prices.push(price);
    }
    prices
}

/// Four assets with distinct risk profiles over `periods` returns
pub fn sample_series(periods: usize) -> Vec<AssetSeries> {
    let end = Utc.with_ymd_and_hms(2024, 6, 28, 0, 0, 0).unwrap();
    [
        ("AAPL", 0.0008, 0.018, 1),
        ("MSFT", 0.0006, 0.014, 2),
        ("JNJ", 0.0003, 0.008, 3),
        ("TSLA", 0.0012, 0.035, 4),
    ]
    .into_iter()
    .map(|(symbol, drift, vol, seed)| {
        AssetSeries::from_prices(symbol, &random_prices(periods, drift, vol, seed), end)
    })
    .collect()
}

/// Statistics built from independent normal returns
pub fn sample_statistics(n: usize, periods: usize, seed: u64) -> MarketStatistics {
    let mut rng = StdRng::seed_from_u64(seed);
    let returns = DMatrix::from_fn(periods, n, |_, j| {
        let shock: f64 = rng.sample(StandardNormal);
        0.0005 * (j + 1) as f64 + 0.01 * (j + 1) as f64 * shock
    });
    let names = (0..n).map(|j| format!("S{j}")).collect();
    MarketStatistics::from_returns(names, returns).unwrap()
}

/// Service over in-memory collaborators holding `sample_series(252)`
pub fn sample_service(config: OptimizerConfig) -> (Arc<PortfolioOptimizationService>, Arc<InMemoryHoldings>) {
    let market_data = Arc::new(InMemoryMarketData::new());
    for series in sample_series(252) {
        market_data.insert(series);
    }
    let holdings = Arc::new(InMemoryHoldings::new());
    holdings.set_holdings(
        1,
        vec![
            Holding::new("AAPL", 50.0, 7_500.0, 10_000.0),
            Holding::new("MSFT", 20.0, 6_000.0, 8_000.0),
            Holding::new("JNJ", 10.0, 1_500.0, 2_000.0),
        ],
    );
    let service = PortfolioOptimizationService::new(market_data, holdings.clone(), config);
    (Arc::new(service), holdings)
}
