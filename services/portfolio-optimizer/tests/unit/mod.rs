//! Unit tests for portfolio optimizer components
//!
//! - Return and covariance estimation
//! - Constraint enforcement and feasibility
//! - Strategy solvers and the dispatcher
//! - Rebalancing guidance and summaries
//! - Property-based invariants

pub mod estimator_tests;
pub mod property_tests;
pub mod rebalancer_tests;
