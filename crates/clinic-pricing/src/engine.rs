use clinic_core::{validate_services, Service, ValidationReport};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors produced by the pricing engine.
#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    /// The service collection failed validation; carries every problem found.
    #[error("invalid service collection: {0}")]
    Invalid(#[from] ValidationReport),
    /// The fixed-cost pool must be finite and non-negative.
    #[error("total fixed cost must be finite and >= 0, got {0}")]
    InvalidFixedCost(f64),
    /// The margin must be finite and non-negative.
    #[error("margin must be finite and >= 0, got {0}")]
    InvalidMargin(f64),
}

/// A priced service: the input row plus everything derived from it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ServiceResult {
    #[serde(flatten)]
    pub service: Service,
    /// `expected_cases * duration_hours`, the allocation weight.
    pub service_hours: f64,
    pub allocated_fixed_cost: f64,
    pub fixed_cost_per_case: f64,
    pub total_cost_per_case: f64,
    pub price_per_case: f64,
    /// Price minus variable cost.
    pub contribution_margin: f64,
    /// Contribution margin as a fraction of price (0 when price is not positive).
    pub contribution_margin_ratio: f64,
    /// Cases needed to recover the allocated fixed cost; infinite when the
    /// contribution margin is not positive.
    #[serde(serialize_with = "crate::float_serde::serialize")]
    pub break_even_cases: f64,
    pub revenue_expected: f64,
    pub profit_expected: f64,
    pub revenue_per_hour: f64,
    pub cm_per_hour: f64,
}

impl ServiceResult {
    pub fn name(&self) -> &str {
        &self.service.display_name
    }

    /// Whether the service ever recovers its allocated fixed cost at this price.
    pub fn breaks_even(&self) -> bool {
        self.break_even_cases.is_finite()
    }
}

/// Price from unit cost and a fractional markup.
///
/// Example:
/// assert_eq!(cost_plus(100.0, 0.5), 150.0);
pub fn cost_plus(unit_cost: f64, margin: f64) -> f64 {
    unit_cost * (1.0 + margin)
}

/// Cases needed for `contribution_margin` per case to cover `fixed_cost`.
///
/// Returns `f64::INFINITY` when the margin per case is zero or negative: the
/// service never breaks even at that price.
pub fn break_even(fixed_cost: f64, contribution_margin: f64) -> f64 {
    if contribution_margin > 0.0 {
        fixed_cost / contribution_margin
    } else {
        f64::INFINITY
    }
}

/// Allocate `total_fixed_cost` across services by chair time and price each one.
///
/// Fixed cost is shared in proportion to `expected_cases * duration_hours`, so a
/// service that ties up the chair longer carries more overhead even at lower
/// volume. When no hours are projected at all, nothing is allocated.
///
/// The collection is validated first and the call fails closed on any problem.
pub fn compute_pricing(
    services: &[Service],
    total_fixed_cost: f64,
    margin: f64,
) -> Result<Vec<ServiceResult>, PricingError> {
    validate_services(services)?;
    if !total_fixed_cost.is_finite() || total_fixed_cost < 0.0 {
        return Err(PricingError::InvalidFixedCost(total_fixed_cost));
    }
    if !margin.is_finite() || margin < 0.0 {
        return Err(PricingError::InvalidMargin(margin));
    }

    let total_service_hours: f64 = services.iter().map(Service::service_hours).sum();
    if total_service_hours <= 0.0 {
        warn!(
            services = services.len(),
            total_fixed_cost, "no projected service hours; fixed cost left unallocated"
        );
    }
    let results = services
        .iter()
        .map(|s| {
            let allocated = if total_service_hours > 0.0 {
                total_fixed_cost * (s.service_hours() / total_service_hours)
            } else {
                0.0
            };
            price_service(s, allocated, margin)
        })
        .collect();
    debug!(
        services = services.len(),
        total_service_hours, total_fixed_cost, margin, "priced services"
    );
    Ok(results)
}

fn price_service(service: &Service, allocated_fixed_cost: f64, margin: f64) -> ServiceResult {
    let cases = f64::from(service.expected_cases);
    let fixed_cost_per_case = if service.expected_cases > 0 {
        allocated_fixed_cost / cases
    } else {
        0.0
    };
    let total_cost_per_case = service.variable_cost + fixed_cost_per_case;
    let price_per_case = cost_plus(total_cost_per_case, margin);
    let contribution_margin = price_per_case - service.variable_cost;
    let contribution_margin_ratio = if price_per_case > 0.0 {
        contribution_margin / price_per_case
    } else {
        0.0
    };
    ServiceResult {
        service_hours: service.service_hours(),
        allocated_fixed_cost,
        fixed_cost_per_case,
        total_cost_per_case,
        price_per_case,
        contribution_margin,
        contribution_margin_ratio,
        break_even_cases: break_even(allocated_fixed_cost, contribution_margin),
        revenue_expected: price_per_case * cases,
        profit_expected: contribution_margin * cases - allocated_fixed_cost,
        revenue_per_hour: price_per_case / service.duration_hours,
        cm_per_hour: contribution_margin / service.duration_hours,
        service: service.clone(),
    }
}

/// Portfolio totals reduced from a priced collection.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub service_count: usize,
    pub total_fixed_cost: f64,
    pub total_revenue: f64,
    pub total_variable_cost: f64,
    /// Sum of contribution margin times expected cases.
    pub total_contribution: f64,
    pub total_profit: f64,
    /// Profit as a percentage of revenue (0 without revenue).
    pub overall_margin_pct: f64,
    pub weighted_avg_cm_ratio: f64,
    /// Revenue needed to cover all fixed costs; infinite when the portfolio
    /// contributes nothing.
    #[serde(serialize_with = "crate::float_serde::serialize")]
    pub overall_break_even_revenue: f64,
    pub total_hours: f64,
    pub avg_revenue_per_hour: f64,
    pub avg_cm_per_hour: f64,
}

impl PortfolioSummary {
    /// Reduce `results`; `total_fixed_cost` must be the pool they were priced with.
    pub fn from_results(results: &[ServiceResult], total_fixed_cost: f64) -> Self {
        let mut total_revenue = 0.0;
        let mut total_variable_cost = 0.0;
        let mut total_contribution = 0.0;
        let mut total_profit = 0.0;
        let mut total_hours = 0.0;
        for r in results {
            let cases = f64::from(r.service.expected_cases);
            total_revenue += r.revenue_expected;
            total_variable_cost += r.service.variable_cost * cases;
            total_contribution += r.contribution_margin * cases;
            total_profit += r.profit_expected;
            total_hours += r.service_hours;
        }
        let per_revenue = |v: f64| {
            if total_revenue != 0.0 {
                v / total_revenue
            } else {
                0.0
            }
        };
        let per_hour = |v: f64| {
            if total_hours != 0.0 {
                v / total_hours
            } else {
                0.0
            }
        };
        let weighted_avg_cm_ratio = per_revenue(total_contribution);
        Self {
            service_count: results.len(),
            total_fixed_cost,
            total_revenue,
            total_variable_cost,
            total_contribution,
            total_profit,
            overall_margin_pct: per_revenue(total_profit) * 100.0,
            weighted_avg_cm_ratio,
            overall_break_even_revenue: if weighted_avg_cm_ratio > 0.0 {
                total_fixed_cost / weighted_avg_cm_ratio
            } else {
                f64::INFINITY
            },
            total_hours,
            avg_revenue_per_hour: per_hour(total_revenue),
            avg_cm_per_hour: per_hour(total_contribution),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_core::{default_services, ValidationError};
    use proptest::prelude::*;

    fn assert_close(actual: f64, expected: f64) {
        let tol = 1e-9 * expected.abs().max(1.0);
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}"
        );
    }

    fn two_services() -> Vec<Service> {
        vec![
            Service::new("Scaling & Polishing", 80, 100.0, 0.75),
            Service::new("Dental Implant (Surgery)", 10, 2500.0, 2.0),
        ]
    }

    #[test]
    fn test_cost_plus() {
        assert_eq!(cost_plus(100.0, 0.5), 150.0);
        assert_eq!(cost_plus(100.0, 0.0), 100.0);
    }

    #[test]
    fn two_service_scenario() {
        let results = compute_pricing(&two_services(), 49_500.0, 0.35).unwrap();
        let expect = [
            (60.0, 37_125.0, 464.0625, 564.0625, 761.484375),
            (20.0, 12_375.0, 1237.5, 3737.5, 5045.625),
        ];
        for (r, (hours, alloc, fc, tc, price)) in results.iter().zip(expect) {
            assert_close(r.service_hours, hours);
            assert_close(r.allocated_fixed_cost, alloc);
            assert_close(r.fixed_cost_per_case, fc);
            assert_close(r.total_cost_per_case, tc);
            assert_close(r.price_per_case, price);
        }
        let implant = &results[1];
        assert_close(implant.contribution_margin, 2545.625);
        assert_close(implant.contribution_margin_ratio, 2545.625 / 5045.625);
        assert_close(implant.break_even_cases, 12_375.0 / 2545.625);
        assert_close(implant.revenue_expected, 50_456.25);
        assert_close(implant.profit_expected, 25_456.25 - 12_375.0);
        assert_close(implant.revenue_per_hour, 5045.625 / 2.0);
        assert_close(implant.cm_per_hour, 2545.625 / 2.0);
    }

    #[test]
    fn time_weighting_beats_volume() {
        // fewer cases but longer chair time claims the larger share
        let services = vec![
            Service::new("Quick", 40, 0.0, 0.25),
            Service::new("Long", 10, 0.0, 3.0),
        ];
        let r = compute_pricing(&services, 1000.0, 0.0).unwrap();
        assert_close(r[0].allocated_fixed_cost, 250.0);
        assert_close(r[1].allocated_fixed_cost, 750.0);
    }

    #[test]
    fn zero_hours_allocate_nothing() {
        let services = vec![
            Service::new("A", 0, 100.0, 1.0),
            Service::new("B", 0, 50.0, 2.0),
        ];
        let results = compute_pricing(&services, 49_500.0, 0.35).unwrap();
        for r in &results {
            assert_eq!(r.allocated_fixed_cost, 0.0);
            assert_eq!(r.fixed_cost_per_case, 0.0);
            assert_eq!(r.revenue_expected, 0.0);
            assert_eq!(r.profit_expected, 0.0);
            assert!(r.price_per_case.is_finite());
        }
        assert_close(results[0].price_per_case, 135.0);
    }

    #[test]
    fn zero_case_service_gets_no_share() {
        let services = vec![
            Service::new("Busy", 10, 100.0, 1.0),
            Service::new("Idle", 0, 100.0, 1.0),
        ];
        let r = compute_pricing(&services, 500.0, 0.2).unwrap();
        assert_close(r[0].allocated_fixed_cost, 500.0);
        assert_eq!(r[1].allocated_fixed_cost, 0.0);
        assert_eq!(r[1].fixed_cost_per_case, 0.0);
        assert_close(r[1].price_per_case, 120.0);
    }

    #[test]
    fn price_equal_to_variable_cost_never_breaks_even() {
        // no allocation and no markup: price == variable cost exactly
        let services = vec![Service::new("Free ride", 0, 250.0, 1.0)];
        let r = &compute_pricing(&services, 1000.0, 0.0).unwrap()[0];
        assert_eq!(r.price_per_case, r.service.variable_cost);
        assert_eq!(r.contribution_margin, 0.0);
        assert_eq!(r.break_even_cases, f64::INFINITY);
        assert!(!r.breaks_even());
    }

    #[test]
    fn zero_price_has_zero_cm_ratio() {
        let services = vec![Service::new("Gratis", 0, 0.0, 1.0)];
        let r = &compute_pricing(&services, 0.0, 0.5).unwrap()[0];
        assert_eq!(r.price_per_case, 0.0);
        assert_eq!(r.contribution_margin_ratio, 0.0);
        assert_eq!(r.break_even_cases, f64::INFINITY);
    }

    #[test]
    fn invalid_inputs_fail_closed() {
        let err = compute_pricing(&[], 100.0, 0.3).unwrap_err();
        assert_eq!(
            err,
            PricingError::Invalid(ValidationError::EmptyCollection.into())
        );

        let bad = vec![Service::new("A", 1, 1.0, 0.0)];
        assert!(matches!(
            compute_pricing(&bad, 100.0, 0.3),
            Err(PricingError::Invalid(_))
        ));

        let ok = two_services();
        assert_eq!(
            compute_pricing(&ok, -1.0, 0.3),
            Err(PricingError::InvalidFixedCost(-1.0))
        );
        assert!(matches!(
            compute_pricing(&ok, f64::NAN, 0.3),
            Err(PricingError::InvalidFixedCost(_))
        ));
        assert_eq!(
            compute_pricing(&ok, 100.0, -0.5),
            Err(PricingError::InvalidMargin(-0.5))
        );
    }

    #[test]
    fn wide_margins_are_accepted() {
        let r = compute_pricing(&two_services(), 49_500.0, 5.0).unwrap();
        assert_close(r[1].price_per_case, 3737.5 * 6.0);
    }

    #[test]
    fn input_is_left_untouched() {
        let services = default_services();
        let before = services.clone();
        let _ = compute_pricing(&services, 49_500.0, 0.35).unwrap();
        assert_eq!(services, before);
    }

    #[test]
    fn portfolio_summary_two_services() {
        let results = compute_pricing(&two_services(), 49_500.0, 0.35).unwrap();
        let s = PortfolioSummary::from_results(&results, 49_500.0);
        let revenue = 761.484375 * 80.0 + 5045.625 * 10.0;
        let variable = 100.0 * 80.0 + 2500.0 * 10.0;
        let contribution = revenue - variable;
        assert_eq!(s.service_count, 2);
        assert_close(s.total_revenue, revenue);
        assert_close(s.total_variable_cost, variable);
        assert_close(s.total_contribution, contribution);
        assert_close(s.total_profit, contribution - 49_500.0);
        assert_close(s.overall_margin_pct, (contribution - 49_500.0) / revenue * 100.0);
        assert_close(s.weighted_avg_cm_ratio, contribution / revenue);
        assert_close(
            s.overall_break_even_revenue,
            49_500.0 / (contribution / revenue),
        );
        assert_close(s.total_hours, 80.0);
        assert_close(s.avg_revenue_per_hour, revenue / 80.0);
        assert_close(s.avg_cm_per_hour, contribution / 80.0);
    }

    #[test]
    fn portfolio_summary_without_revenue() {
        let services = vec![Service::new("A", 0, 10.0, 1.0)];
        let results = compute_pricing(&services, 1000.0, 0.1).unwrap();
        let s = PortfolioSummary::from_results(&results, 1000.0);
        assert_eq!(s.total_revenue, 0.0);
        assert_eq!(s.overall_margin_pct, 0.0);
        assert_eq!(s.weighted_avg_cm_ratio, 0.0);
        assert_eq!(s.overall_break_even_revenue, f64::INFINITY);
        assert_eq!(s.avg_revenue_per_hour, 0.0);
    }

    #[test]
    fn infinite_break_even_serializes_as_string() {
        let services = vec![Service::new("Free ride", 0, 250.0, 1.0)];
        let r = &compute_pricing(&services, 0.0, 0.0).unwrap()[0];
        let v = serde_json::to_value(r).unwrap();
        assert_eq!(v["break_even_cases"], "inf");
        assert_eq!(v["display_name"], "Free ride");
        assert_eq!(v["price_per_case"], 250.0);
    }

    fn service_set() -> impl Strategy<Value = Vec<Service>> {
        prop::collection::vec((0u32..500, 0.0f64..5_000.0, 0.05f64..8.0), 1..12).prop_map(
            |rows| {
                rows.into_iter()
                    .enumerate()
                    .map(|(i, (c, v, d))| Service::new(format!("svc-{i}"), c, v, d))
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn allocation_is_conserved(services in service_set(), fixed in 0.0f64..1_000_000.0) {
            let results = compute_pricing(&services, fixed, 0.35).unwrap();
            let allocated: f64 = results.iter().map(|r| r.allocated_fixed_cost).sum();
            let hours: f64 = services.iter().map(Service::service_hours).sum();
            if hours > 0.0 {
                prop_assert!((allocated - fixed).abs() <= 1e-6 * fixed.max(1.0));
            } else {
                prop_assert_eq!(allocated, 0.0);
            }
        }

        #[test]
        fn allocation_is_proportional(cases in 1u32..500,
                                      hours in 0.1f64..4.0,
                                      cost in 0.0f64..1_000.0,
                                      fixed in 1.0f64..100_000.0) {
            let services = vec![
                Service::new("A", cases * 2, cost, hours),
                Service::new("B", cases, cost, hours),
            ];
            let r = compute_pricing(&services, fixed, 0.2).unwrap();
            let a = r[0].allocated_fixed_cost;
            let b = r[1].allocated_fixed_cost;
            prop_assert!((a - 2.0 * b).abs() <= 1e-9 * a.max(1.0));
        }

        #[test]
        fn pricing_is_deterministic(services in service_set(),
                                    fixed in 0.0f64..100_000.0,
                                    margin in 0.0f64..2.0) {
            let first = compute_pricing(&services, fixed, margin).unwrap();
            let second = compute_pricing(&services, fixed, margin).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn break_even_infinite_iff_no_contribution(services in service_set(),
                                                   fixed in 0.0f64..100_000.0,
                                                   margin in 0.0f64..2.0) {
            for r in compute_pricing(&services, fixed, margin).unwrap() {
                prop_assert_eq!(r.break_even_cases.is_infinite(), r.contribution_margin <= 0.0);
                prop_assert!(r.break_even_cases >= 0.0);
            }
        }
    }
}
