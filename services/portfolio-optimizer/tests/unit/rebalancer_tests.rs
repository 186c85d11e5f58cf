//! Rebalancing guidance and outcome summary tests

use crate::common::*;
use approx::assert_relative_eq;
use portfolio_optimizer::position::Holding;
use portfolio_optimizer::rebalancer::{ActionPriority, ActionType, ResultAssembler};
use portfolio_optimizer::{
    ConvergenceStatus, OptimizationConstraints, OptimizationObjective, OptimizationResult,
    OptimizationStrategy, OptimizerConfig, PortfolioOptimizer,
};
use rstest::*;

#[fixture]
fn assembler() -> ResultAssembler {
    ResultAssembler::new(&OptimizerConfig::default())
}

fn recommended(symbols: &[&str], weights: &[f64]) -> OptimizationResult {
    OptimizationResult {
        symbols: symbols.iter().map(|s| s.to_string()).collect(),
        weights: weights.to_vec(),
        expected_return: 0.001,
        expected_risk: 0.01,
        sharpe_ratio: 0.1,
        convergence_status: ConvergenceStatus::Converged,
        iterations: 0,
        execution_time_ms: 0,
    }
}

mod action_tests {
    use super::*;

    #[rstest]
    fn test_rebalancing_diff(assembler: ResultAssembler) {
        let holdings = vec![
            Holding::new("A", 10.0, 4_000.0, 5_000.0),
            Holding::new("B", 25.0, 5_000.0, 5_000.0),
        ];
        let actions = assembler.rebalancing_actions(&recommended(&["A", "B"], &[0.3, 0.7]), &holdings);

        assert_eq!(actions.len(), 2);
        let reduce: Vec<_> = actions
            .iter()
            .filter(|a| a.action_type == ActionType::ReducePosition)
            .collect();
        let increase: Vec<_> = actions
            .iter()
            .filter(|a| a.action_type == ActionType::IncreasePosition)
            .collect();
        assert_eq!(reduce.len(), 1);
        assert_eq!(increase.len(), 1);
        assert_eq!(reduce[0].symbol, "A");
        assert_eq!(increase[0].symbol, "B");
        assert_relative_eq!(reduce[0].magnitude, 0.2, epsilon = 1e-12);
        assert_relative_eq!(increase[0].magnitude, 0.2, epsilon = 1e-12);
    }

    #[rstest]
    fn test_trade_sizing(assembler: ResultAssembler) {
        let holdings = vec![
            Holding::new("A", 10.0, 4_000.0, 5_000.0),
            Holding::new("B", 25.0, 5_000.0, 5_000.0),
        ];
        let actions = assembler.rebalancing_actions(&recommended(&["A", "B"], &[0.3, 0.7]), &holdings);
        let a = actions.iter().find(|a| a.symbol == "A").unwrap();

        assert_relative_eq!(a.trade_value, -2_000.0, epsilon = 1e-6);
        // Unit price 500
        assert_relative_eq!(a.estimated_quantity.unwrap(), -4.0, epsilon = 1e-9);
        assert_relative_eq!(a.estimated_cost, 5.0, epsilon = 1e-9);
        assert_eq!(a.priority, ActionPriority::Critical);
    }

    #[rstest]
    fn test_actions_sorted_by_magnitude(assembler: ResultAssembler) {
        let holdings = vec![
            Holding::new("A", 1.0, 250.0, 250.0),
            Holding::new("B", 1.0, 250.0, 250.0),
            Holding::new("C", 1.0, 500.0, 500.0),
        ];
        let actions =
            assembler.rebalancing_actions(&recommended(&["A", "B", "C"], &[0.2, 0.45, 0.35]), &holdings);
        let magnitudes: Vec<f64> = actions.iter().map(|a| a.magnitude).collect();
        assert!(magnitudes.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(actions[0].symbol, "B");
    }

    #[rstest]
    #[case(0.005, ActionType::Hold)]
    #[case(0.015, ActionType::IncreasePosition)]
    #[case(-0.015, ActionType::ReducePosition)]
    fn test_deadband(assembler: ResultAssembler, #[case] drift: f64, #[case] expected: ActionType) {
        let holdings = vec![
            Holding::new("A", 1.0, 500.0, 500.0),
            Holding::new("B", 1.0, 500.0, 500.0),
        ];
        let target = recommended(&["A", "B"], &[0.5 + drift, 0.5 - drift]);
        let actions = assembler.rebalancing_actions(&target, &holdings);
        let a = actions.iter().find(|a| a.symbol == "A").unwrap();
        assert_eq!(a.action_type, expected);
    }
}

mod outcome_tests {
    use super::*;

    #[test]
    fn test_assembled_outcome() {
        let stats = sample_statistics(3, 60, 21);
        let holdings = vec![
            Holding::new("S0", 10.0, 900.0, 1_000.0),
            Holding::new("S1", 10.0, 900.0, 1_000.0),
            Holding::new("OLD", 5.0, 2_500.0, 2_000.0),
        ];
        let config = OptimizerConfig::default();
        let constraints = OptimizationConstraints::default().with_risk_budget_limit(0.4);
        let result = PortfolioOptimizer::new(config.clone())
            .optimize(
                &stats,
                OptimizationStrategy::HierarchicalRiskParity,
                OptimizationObjective::MinimizeRisk,
                &constraints,
            )
            .unwrap();

        let outcome = ResultAssembler::new(&config).assemble(
            7,
            OptimizationStrategy::HierarchicalRiskParity,
            OptimizationObjective::MinimizeRisk,
            &constraints,
            result,
            &stats,
            &holdings,
        );

        assert_eq!(outcome.portfolio_id, 7);
        assert_eq!(outcome.recommended_allocations.len(), 3);
        assert_eq!(outcome.current_allocations.len(), 3);
        assert_eq!(outcome.rebalancing_actions.len(), 3);
        assert!(outcome.requires_rebalancing());
        assert_eq!(
            (outcome.next_rebalancing_at - outcome.generated_at).num_days(),
            config.rebalance_interval_days
        );

        let risk_share: f64 = outcome
            .recommended_allocations
            .iter()
            .map(|a| a.risk_contribution)
            .sum();
        assert_relative_eq!(risk_share, 1.0, epsilon = 1e-9);

        let s2 = outcome.allocation("S2").unwrap();
        assert_eq!(s2.current_weight, None);
        assert!(outcome.risk_metrics.risk_budget_utilization.is_some());
        assert_relative_eq!(
            outcome.risk_metrics.var_95,
            1.645 * outcome.result.expected_risk,
            epsilon = 1e-12
        );
        assert!(outcome.total_estimated_cost() > 0.0);

        // Held S0 and S1 split the risk of the held universe; OLD carries none
        let current_share: f64 = outcome
            .current_allocations
            .iter()
            .map(|a| a.risk_contribution)
            .sum();
        assert_relative_eq!(current_share, 1.0, epsilon = 1e-9);
        let old = outcome
            .current_allocations
            .iter()
            .find(|a| a.symbol == "OLD")
            .unwrap();
        assert_eq!(old.risk_contribution, 0.0);
        assert!(outcome.current_allocations[0].risk_contribution > 0.0);

        // Annualized: S0 is near 16%, S1 and S2 well above 20%
        let s0 = outcome.allocation("S0").unwrap().weight;
        assert!(outcome.high_risk_weight() > 0.0);
        assert_relative_eq!(outcome.high_risk_weight(), 1.0 - s0, epsilon = 1e-9);
        assert!(outcome.risk_metrics.annualized_volatility > outcome.risk_metrics.volatility);
    }

    #[test]
    fn test_outcome_serializes() {
        let stats = sample_statistics(2, 30, 4);
        let config = OptimizerConfig::default();
        let result = PortfolioOptimizer::new(config.clone())
            .optimize(
                &stats,
                OptimizationStrategy::RiskParity,
                OptimizationObjective::MinimizeRisk,
                &OptimizationConstraints::default(),
            )
            .unwrap();
        let outcome = ResultAssembler::new(&config).assemble(
            1,
            OptimizationStrategy::RiskParity,
            OptimizationObjective::MinimizeRisk,
            &OptimizationConstraints::default(),
            result,
            &stats,
            &[],
        );
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["strategy"], "RISK_PARITY");
        assert_eq!(json["rebalancing_actions"][0]["action_type"], "INCREASE_POSITION");
    }
}
