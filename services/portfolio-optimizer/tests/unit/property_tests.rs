//! Property-based invariants

use crate::common::*;
use nalgebra::DVector;
use portfolio_optimizer::constraints::{AssetBounds, OptimizationConstraints, WeightBounds, enforce};
use portfolio_optimizer::solvers::hierarchical;
use portfolio_optimizer::solvers::mean_variance::{Fitness, hill_climb};
use portfolio_optimizer::{OptimizationObjective, OptimizationStrategy, OptimizerConfig, PortfolioOptimizer};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Bounds that admit a unit-sum vector, paired with raw weights
fn feasible_case() -> impl Strategy<Value = (Vec<WeightBounds>, Vec<f64>)> {
    (2usize..12).prop_flat_map(|n| {
        let lower = 0.0..(0.9 / n as f64);
        let upper = (1.2 / n as f64)..1.0;
        (
            prop::collection::vec((lower, upper), n),
            prop::collection::vec(-1.0f64..2.0, n),
        )
            .prop_map(|(pairs, raw)| {
                let bounds = pairs
                    .into_iter()
                    .map(|(min, max)| WeightBounds::new(min, max))
                    .collect();
                (bounds, raw)
            })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_enforce_invariants((bounds, raw) in feasible_case()) {
        let bounds = AssetBounds(bounds);
        let w = enforce(&DVector::from_vec(raw), &bounds);
        prop_assert!((w.sum() - 1.0).abs() < 1e-9, "sum {}", w.sum());
        prop_assert!(bounds.contains_all(&w), "weights {:?}", w.as_slice());
    }

    #[test]
    fn prop_hrp_monotonic(vols in prop::collection::vec(0.001f64..0.5, 2..10)) {
        let n = vols.len();
        let bounds = AssetBounds::uniform(n, WeightBounds::new(0.0, 1.0));
        let vols = DVector::from_vec(vols);
        let w = hierarchical::solve(&vols, &bounds).weights;
        for i in 0..n {
            for j in 0..n {
                if vols[i] < vols[j] {
                    prop_assert!(w[i] >= w[j] - 1e-12);
                }
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_every_strategy_respects_bounds(
        seed in 0u64..1000,
        n in 3usize..7,
        max in 0.35f64..0.9,
    ) {
        let stats = sample_statistics(n, 80, seed);
        let config = OptimizerConfig { max_iterations: 200, ..OptimizerConfig::default() };
        let optimizer = PortfolioOptimizer::new(config);
        let constraints = OptimizationConstraints::with_bounds(0.0, max);
        let bounds = constraints.resolve(&stats.symbols);

        for strategy in OptimizationStrategy::ALL {
            let result = optimizer
                .optimize(&stats, strategy, OptimizationObjective::MaximizeSharpeRatio, &constraints)
                .unwrap();
            let sum: f64 = result.weights.iter().sum();
            prop_assert!((sum - 1.0).abs() < 1e-6, "{strategy}: sum {sum}");
            prop_assert!(bounds.contains_all(&result.weight_vector()), "{strategy}");
        }
    }

    #[test]
    fn prop_search_fitness_never_decreases(seed in 0u64..1000, kind in 0usize..3) {
        let stats = sample_statistics(4, 60, seed);
        let bounds = AssetBounds::uniform(4, WeightBounds::default());
        let config = OptimizerConfig { max_iterations: 300, ..OptimizerConfig::default() };
        let fitness = match kind {
            0 => Fitness::Return,
            1 => Fitness::Sharpe { risk_free_rate: config.risk_free_rate },
            _ => Fitness::TargetVolatility {
                risk_free_rate: config.risk_free_rate,
                target: 0.02,
                penalty: config.target_volatility_penalty,
            },
        };
        let mut rng = StdRng::seed_from_u64(seed);
        let outcome = hill_climb(&stats, &bounds, fitness, &config, &mut rng);
        prop_assert!(outcome.history.windows(2).all(|w| w[1] >= w[0]));
        prop_assert_eq!(outcome.history.last().copied(), Some(outcome.fitness));
    }
}
