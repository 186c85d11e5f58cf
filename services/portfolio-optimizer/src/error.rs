//! Portfolio Optimizer Error Types
//!
//! Every failure is local to a single optimization call

use thiserror::Error;

/// Optimization engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Not enough price history, or series of different lengths
    #[error("Insufficient data: {reason}")]
    InsufficientData { reason: String },

    /// Price that cannot produce a simple return
    #[error("Invalid price for {symbol} at observation {index}: {price}")]
    InvalidPrice {
        symbol: String,
        index: usize,
        price: f64,
    },

    /// Covariance matrix could not be inverted
    #[error(
        "Singular covariance matrix: {reason}; reduce the asset set or use RISK_PARITY / HIERARCHICAL_RISK_PARITY"
    )]
    SingularMatrix { reason: String },

    /// Strategy name with no solver behind it
    #[error("Unsupported strategy: {strategy}")]
    UnsupportedStrategy { strategy: String },

    /// Objective name with no fitness function behind it
    #[error("Unsupported objective: {objective}")]
    UnsupportedObjective { objective: String },

    /// Constraint value that is malformed for the requested objective
    #[error("Invalid constraints: {reason}")]
    InvalidConstraints { reason: String },

    /// Bounds that no unit-sum weight vector can satisfy
    #[error("Infeasible constraints: {reason}")]
    InfeasibleConstraints { reason: String },

    /// Portfolio holds nothing to optimize
    #[error("Portfolio {portfolio_id} has no positions")]
    EmptyPortfolio { portfolio_id: u64 },

    /// Market data collaborator failure
    #[error("Market data error for {symbol}: {reason}")]
    MarketData { symbol: String, reason: String },

    /// Holdings collaborator failure
    #[error("Holdings error for portfolio {portfolio_id}: {reason}")]
    Holdings { portfolio_id: u64, reason: String },

    /// Batch cancelled before this optimization started
    #[error("Optimization cancelled for portfolio {portfolio_id}")]
    Cancelled { portfolio_id: u64 },
}

impl EngineError {
    /// True for errors the caller can fix by changing inputs rather than retrying
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InsufficientData { .. }
                | Self::InvalidPrice { .. }
                | Self::SingularMatrix { .. }
                | Self::InvalidConstraints { .. }
                | Self::InfeasibleConstraints { .. }
                | Self::EmptyPortfolio { .. }
        )
    }
}

/// Result type for optimization operations
pub type EngineResult<T> = Result<T, EngineError>;
