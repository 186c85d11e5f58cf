//! Return and covariance estimation tests

use crate::common::*;
use approx::assert_relative_eq;
use chrono::Utc;
use nalgebra::DMatrix;
use portfolio_optimizer::estimator::{AssetSeries, MarketStatistics, estimate};
use portfolio_optimizer::EngineError;
use rstest::*;

#[fixture]
fn two_asset_series() -> Vec<AssetSeries> {
    let end = Utc::now();
    vec![
        AssetSeries::from_prices("A", &[100.0, 102.0, 99.96, 101.9592], end),
        AssetSeries::from_prices("B", &[50.0, 50.5, 50.0, 49.5], end),
    ]
}

mod estimation_tests {
    use super::*;

    #[rstest]
    fn test_expected_returns_are_column_means(two_asset_series: Vec<AssetSeries>) {
        let stats = estimate(&two_asset_series).unwrap();
        // A: +2%, -2%, +2%
        assert_relative_eq!(stats.expected_returns[0], 0.02 / 3.0, epsilon = 1e-9);
        assert_eq!(stats.returns.nrows(), 3);
        assert_eq!(stats.returns.ncols(), 2);
    }

    #[rstest]
    fn test_covariance_is_unbiased(two_asset_series: Vec<AssetSeries>) {
        let stats = estimate(&two_asset_series).unwrap();
        let column: Vec<f64> = stats.returns.column(0).iter().copied().collect();
        let mean = column.iter().sum::<f64>() / 3.0;
        let variance = column.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / 2.0;
        assert_relative_eq!(stats.covariance[(0, 0)], variance, epsilon = 1e-15);
    }

    #[test]
    fn test_covariance_symmetric_bitwise() {
        let stats = sample_statistics(6, 40, 11);
        for i in 0..6 {
            for j in 0..6 {
                assert_eq!(stats.covariance[(i, j)].to_bits(), stats.covariance[(j, i)].to_bits());
            }
        }
    }

    #[test]
    fn test_volatilities_are_sqrt_of_diagonal() {
        let stats = sample_statistics(3, 30, 5);
        let vols = stats.volatilities();
        for i in 0..3 {
            assert_relative_eq!(vols[i] * vols[i], stats.covariance[(i, i)], epsilon = 1e-15);
        }
    }
}

mod validation_tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert!(matches!(estimate(&[]), Err(EngineError::InsufficientData { .. })));
    }

    #[test]
    fn test_length_mismatch() {
        let end = Utc::now();
        let series = vec![
            AssetSeries::from_prices("A", &[1.0, 2.0, 3.0], end),
            AssetSeries::from_prices("B", &[1.0, 2.0], end),
        ];
        assert!(matches!(estimate(&series), Err(EngineError::InsufficientData { .. })));
    }

    #[test]
    fn test_single_return_period_is_not_enough() {
        let end = Utc::now();
        let series = vec![AssetSeries::from_prices("A", &[1.0, 2.0], end)];
        assert!(matches!(estimate(&series), Err(EngineError::InsufficientData { .. })));
    }

    #[rstest]
    #[case(-1.0)]
    #[case(0.0)]
    #[case(f64::NAN)]
    fn test_invalid_price(#[case] price: f64) {
        let series = vec![AssetSeries::from_prices("A", &[1.0, price, 2.0], Utc::now())];
        assert!(matches!(
            estimate(&series),
            Err(EngineError::InvalidPrice { index: 1, .. })
        ));
    }

    #[test]
    fn test_from_returns_symbol_count_mismatch() {
        let returns = DMatrix::from_element(3, 2, 0.01);
        let err = MarketStatistics::from_returns(symbols(&["A"]), returns).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData { .. }));
    }
}
