//! Batch runner isolation and cancellation tests

use crate::common::*;
use portfolio_optimizer::batch::BatchOptimizer;
use portfolio_optimizer::{
    EngineError, Holding, OptimizationObjective, OptimizationRequest, OptimizationStrategy,
    OptimizerConfig,
};

fn request(portfolio_id: u64, strategy: OptimizationStrategy) -> OptimizationRequest {
    OptimizationRequest::new(portfolio_id, strategy, OptimizationObjective::MaximizeSharpeRatio)
}

#[tokio::test]
async fn test_failures_are_isolated() {
    init_test_env();
    let (service, holdings) = sample_service(OptimizerConfig {
        max_concurrency: 2,
        ..OptimizerConfig::default()
    });
    holdings.set_holdings(
        2,
        vec![
            Holding::new("TSLA", 5.0, 1_000.0, 1_200.0),
            Holding::new("JNJ", 5.0, 800.0, 820.0),
        ],
    );
    let batch = BatchOptimizer::new(service);

    let items = batch
        .run(vec![
            request(1, OptimizationStrategy::RiskParity),
            request(99, OptimizationStrategy::RiskParity),
            request(2, OptimizationStrategy::MaximumSharpe),
            request(1, OptimizationStrategy::ModernPortfolioTheory)
                .with_symbols(vec!["AAPL".to_string(), "MISSING".to_string()]),
        ])
        .await;

    assert_eq!(items.len(), 4);
    assert_eq!(
        items.iter().map(|i| i.portfolio_id).collect::<Vec<_>>(),
        vec![1, 99, 2, 1]
    );
    assert!(items[0].outcome.is_ok());
    assert!(matches!(
        items[1].outcome,
        Err(EngineError::EmptyPortfolio { portfolio_id: 99 })
    ));
    assert!(items[2].outcome.is_ok());
    assert!(matches!(items[3].outcome, Err(EngineError::MarketData { .. })));
}

#[tokio::test]
async fn test_cancelled_batch_starts_nothing() {
    init_test_env();
    let (service, _) = sample_service(OptimizerConfig::default());
    let batch = BatchOptimizer::new(service);

    batch.cancel();
    assert!(batch.is_cancelled());
    let items = batch
        .run((1..=3).map(|_| request(1, OptimizationStrategy::RiskParity)).collect())
        .await;
    assert!(items
        .iter()
        .all(|i| matches!(i.outcome, Err(EngineError::Cancelled { portfolio_id: 1 }))));

    batch.reset();
    let items = batch
        .run(vec![request(1, OptimizationStrategy::HierarchicalRiskParity)])
        .await;
    assert!(items[0].outcome.is_ok());
}

#[tokio::test]
async fn test_identical_requests_agree() {
    init_test_env();
    let (service, _) = sample_service(OptimizerConfig::default());
    let batch = BatchOptimizer::new(service);

    let items = batch
        .run(
            (0..6)
                .map(|_| request(1, OptimizationStrategy::ModernPortfolioTheory))
                .collect(),
        )
        .await;
    let weights: Vec<Vec<f64>> = items
        .into_iter()
        .map(|i| i.outcome.unwrap().result.weights)
        .collect();
    assert!(weights.windows(2).all(|w| w[0] == w[1]));
}
