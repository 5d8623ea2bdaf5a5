use crate::engine::{compute_pricing, PortfolioSummary, PricingError, ServiceResult};
use clinic_core::Service;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Replacement inputs for one service in a scenario.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceOverride {
    pub display_name: String,
    #[serde(default)]
    pub variable_cost: Option<f64>,
    #[serde(default)]
    pub expected_cases: Option<u32>,
    #[serde(default)]
    pub duration_hours: Option<f64>,
}

impl ServiceOverride {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            ..Self::default()
        }
    }

    fn apply(&self, service: &mut Service) {
        if let Some(v) = self.variable_cost {
            service.variable_cost = v;
        }
        if let Some(n) = self.expected_cases {
            service.expected_cases = n;
        }
        if let Some(h) = self.duration_hours {
            service.duration_hours = h;
        }
    }
}

/// A what-if: anything left `None` keeps its baseline value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub fixed_cost: Option<f64>,
    #[serde(default)]
    pub margin: Option<f64>,
    #[serde(default)]
    pub service_override: Option<ServiceOverride>,
}

/// The last full pricing run a scenario is compared against.
#[derive(Clone, Copy, Debug)]
pub struct Baseline<'a> {
    pub services: &'a [Service],
    pub results: &'a [ServiceResult],
    pub total_fixed_cost: f64,
    pub margin: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum ScenarioError {
    #[error("service `{0}` not found in the base collection")]
    UnknownService(String),
    #[error("scenario inputs rejected: {0}")]
    Pricing(#[from] PricingError),
}

/// A baseline value next to its simulated counterpart.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Delta {
    #[serde(serialize_with = "crate::float_serde::serialize")]
    pub base: f64,
    #[serde(serialize_with = "crate::float_serde::serialize")]
    pub simulated: f64,
    /// `simulated - base`, or `None` when either side is not finite.
    pub change: Option<f64>,
}

impl Delta {
    pub fn new(base: f64, simulated: f64) -> Self {
        let change = (base.is_finite() && simulated.is_finite()).then(|| simulated - base);
        Self {
            base,
            simulated,
            change,
        }
    }
}

/// Headline portfolio figures, baseline vs scenario.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SummaryDelta {
    pub total_revenue: Delta,
    pub total_profit: Delta,
    /// Change is in percentage points.
    pub overall_margin_pct: Delta,
    pub avg_revenue_per_hour: Delta,
}

impl SummaryDelta {
    fn between(base: &PortfolioSummary, sim: &PortfolioSummary) -> Self {
        Self {
            total_revenue: Delta::new(base.total_revenue, sim.total_revenue),
            total_profit: Delta::new(base.total_profit, sim.total_profit),
            overall_margin_pct: Delta::new(base.overall_margin_pct, sim.overall_margin_pct),
            avg_revenue_per_hour: Delta::new(base.avg_revenue_per_hour, sim.avg_revenue_per_hour),
        }
    }
}

/// Baseline vs scenario for the overridden service.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ServiceComparison {
    pub display_name: String,
    pub price_per_case: Delta,
    pub contribution_margin: Delta,
    pub break_even_cases: Delta,
    pub profit_expected: Delta,
}

impl ServiceComparison {
    fn between(base: &ServiceResult, sim: &ServiceResult) -> Self {
        Self {
            display_name: sim.service.display_name.clone(),
            price_per_case: Delta::new(base.price_per_case, sim.price_per_case),
            contribution_margin: Delta::new(base.contribution_margin, sim.contribution_margin),
            break_even_cases: Delta::new(base.break_even_cases, sim.break_even_cases),
            profit_expected: Delta::new(base.profit_expected, sim.profit_expected),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScenarioOutcome {
    pub total_fixed_cost: f64,
    pub margin: f64,
    pub results: Vec<ServiceResult>,
    pub base_summary: PortfolioSummary,
    pub summary: PortfolioSummary,
    pub delta: SummaryDelta,
    /// Present when the scenario overrides a service.
    pub comparison: Option<ServiceComparison>,
}

/// Re-price the baseline collection under `scenario`.
///
/// Unlike a sensitivity curve, a scenario goes through the full engine, so a
/// volume or duration override re-weights the fixed cost allocation across
/// every service. The modified collection is validated like any other.
pub fn simulate(
    base: &Baseline<'_>,
    scenario: &Scenario,
) -> Result<ScenarioOutcome, ScenarioError> {
    let mut services = base.services.to_vec();
    if let Some(ovr) = &scenario.service_override {
        let target = services
            .iter_mut()
            .find(|s| s.display_name == ovr.display_name)
            .ok_or_else(|| ScenarioError::UnknownService(ovr.display_name.clone()))?;
        ovr.apply(target);
    }
    let total_fixed_cost = scenario.fixed_cost.unwrap_or(base.total_fixed_cost);
    let margin = scenario.margin.unwrap_or(base.margin);
    let results = compute_pricing(&services, total_fixed_cost, margin)?;

    let base_summary = PortfolioSummary::from_results(base.results, base.total_fixed_cost);
    let summary = PortfolioSummary::from_results(&results, total_fixed_cost);
    let comparison = scenario.service_override.as_ref().and_then(|ovr| {
        let find = |rs: &[ServiceResult]| {
            rs.iter()
                .position(|r| r.service.display_name == ovr.display_name)
        };
        let b = find(base.results)?;
        let s = find(&results)?;
        Some(ServiceComparison::between(&base.results[b], &results[s]))
    });
    info!(
        total_fixed_cost,
        margin,
        profit_change = summary.total_profit - base_summary.total_profit,
        "scenario simulated"
    );
    Ok(ScenarioOutcome {
        total_fixed_cost,
        margin,
        delta: SummaryDelta::between(&base_summary, &summary),
        results,
        base_summary,
        summary,
        comparison,
    })
}
