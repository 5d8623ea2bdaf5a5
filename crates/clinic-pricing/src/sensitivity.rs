use crate::engine::{break_even, cost_plus, ServiceResult};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Price and break-even for one service across hypothetical case volumes.
///
/// `allocated_fixed_cost` is held at the value from the last pricing run rather
/// than re-allocated for each volume: the curve shows what happens when only
/// this service's volume moves. Volumes `<= 0` yield infinity in both outputs.
///
/// Never fails; a negative margin or cost simply produces the (possibly
/// negative) numbers the formulas give.
///
/// Example:
/// let (prices, break_evens) = compute_sensitivity(100.0, 10_000.0, 0.3, &[10, 20]);
/// // prices ~ [1430.0, 780.0], break_evens ~ [7.52, 14.71]
pub fn compute_sensitivity(
    variable_cost: f64,
    allocated_fixed_cost: f64,
    margin: f64,
    case_range: &[i64],
) -> (Vec<f64>, Vec<f64>) {
    case_range
        .iter()
        .map(|&n| {
            if n <= 0 {
                return (f64::INFINITY, f64::INFINITY);
            }
            let fixed_cost_per_case = allocated_fixed_cost / n as f64;
            let price = cost_plus(variable_cost + fixed_cost_per_case, margin);
            let contribution_margin = price - variable_cost;
            (price, break_even(allocated_fixed_cost, contribution_margin))
        })
        .unzip()
}

/// Most points a single curve may hold.
pub const MAX_RANGE_POINTS: i64 = 10_000;

/// Errors for user-supplied case ranges.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("min cases must be at least 1, got {0}")]
    MinBelowOne(i64),
    #[error("max cases ({max}) must be greater than min cases ({min})")]
    Inverted { min: i64, max: i64 },
    #[error("step must be positive, got {0}")]
    NonPositiveStep(i64),
    #[error("range holds {points} points, at most {limit} allowed")]
    TooManyPoints { points: i64, limit: i64 },
}

/// An inclusive stepped range of case counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CaseRange {
    min: i64,
    max: i64,
    step: i64,
}

impl CaseRange {
    pub fn new(min: i64, max: i64, step: i64) -> Result<Self, RangeError> {
        if min < 1 {
            return Err(RangeError::MinBelowOne(min));
        }
        if max <= min {
            return Err(RangeError::Inverted { min, max });
        }
        if step <= 0 {
            return Err(RangeError::NonPositiveStep(step));
        }
        let points = (max - min) / step + 1;
        if points > MAX_RANGE_POINTS {
            return Err(RangeError::TooManyPoints {
                points,
                limit: MAX_RANGE_POINTS,
            });
        }
        Ok(Self { min, max, step })
    }

    /// A range from a fifth to twice the expected volume, in about ten steps.
    pub fn around(expected_cases: u32) -> Self {
        let cases = i64::from(expected_cases);
        let min = (cases / 5).max(1);
        let max = (cases * 2).max(min + 1);
        let step = ((max - min) / 10).max(1);
        Self { min, max, step }
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    pub fn step(&self) -> i64 {
        self.step
    }

    /// `min, min + step, ...` up to and including `max` when it lands on a step.
    pub fn values(&self) -> Vec<i64> {
        (self.min..=self.max).step_by(self.step as usize).collect()
    }
}

/// A sensitivity run for one priced service.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SensitivityCurve {
    pub display_name: String,
    pub variable_cost: f64,
    pub allocated_fixed_cost: f64,
    pub margin: f64,
    pub cases: Vec<i64>,
    #[serde(serialize_with = "crate::float_serde::seq::serialize")]
    pub prices: Vec<f64>,
    #[serde(serialize_with = "crate::float_serde::seq::serialize")]
    pub break_evens: Vec<f64>,
}

impl SensitivityCurve {
    /// Run the sensitivity engine for `result` at `margin` over `range`.
    pub fn for_result(result: &ServiceResult, margin: f64, range: &CaseRange) -> Self {
        let cases = range.values();
        let (prices, break_evens) = compute_sensitivity(
            result.service.variable_cost,
            result.allocated_fixed_cost,
            margin,
            &cases,
        );
        debug!(
            service = %result.service.display_name,
            points = cases.len(),
            "sensitivity curve computed"
        );
        Self {
            display_name: result.service.display_name.clone(),
            variable_cost: result.service.variable_cost,
            allocated_fixed_cost: result.allocated_fixed_cost,
            margin,
            cases,
            prices,
            break_evens,
        }
    }

    /// `(cases, price, break_even)` rows.
    pub fn points(&self) -> impl Iterator<Item = (i64, f64, f64)> + '_ {
        self.cases
            .iter()
            .zip(&self.prices)
            .zip(&self.break_evens)
            .map(|((&n, &p), &b)| (n, p, b))
    }
}
