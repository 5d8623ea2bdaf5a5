#![deny(warnings)]

//! Pricing and what-if analysis for clinic services.
//!
//! This crate provides:
//! - Time-weighted fixed cost allocation and cost-plus pricing per service
//! - Portfolio-level totals derived from a priced collection
//! - Single-service sensitivity curves over hypothetical case volumes
//! - Scenario simulation with overridden costs, margin or volume
//!
//! Every operation is a pure function of its arguments.

mod engine;
mod float_serde;
mod scenario;
mod sensitivity;

pub use engine::{
    break_even, compute_pricing, cost_plus, PortfolioSummary, PricingError, ServiceResult,
};
pub use scenario::{
    simulate, Baseline, Delta, Scenario, ScenarioError, ScenarioOutcome, ServiceComparison,
    ServiceOverride, SummaryDelta,
};
pub use sensitivity::{
    compute_sensitivity, CaseRange, RangeError, SensitivityCurve, MAX_RANGE_POINTS,
};
