#![deny(warnings)]

//! Core domain model for clinic service pricing.
//!
//! This crate defines the serializable service and settings types shared across
//! the workspace, the boundary conversion from loosely-typed tabular records into
//! those types, and the validation pass every service collection must clear
//! before it reaches the pricing engine.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// A loosely-typed service row as produced by an editable grid or a JSON file.
pub type RawRecord = serde_json::Map<String, Value>;

/// One offered procedure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Service {
    /// Unique name used for display and lookups (case-sensitive).
    pub display_name: String,
    /// Optional name in the original language or an internal code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    /// Estimated procedures per month.
    pub expected_cases: u32,
    /// Direct cost per case (materials, lab fees), >= 0.
    pub variable_cost: f64,
    /// Average chair time per case in hours, > 0.
    pub duration_hours: f64,
}

impl Service {
    pub fn new(
        display_name: impl Into<String>,
        expected_cases: u32,
        variable_cost: f64,
        duration_hours: f64,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            original_name: None,
            expected_cases,
            variable_cost,
            duration_hours,
        }
    }

    pub fn with_original_name(mut self, name: impl Into<String>) -> Self {
        self.original_name = Some(name.into());
        self
    }

    /// Total chair time the service is expected to consume per month.
    pub fn service_hours(&self) -> f64 {
        f64::from(self.expected_cases) * self.duration_hours
    }

    /// Convert back into the raw record shape used for storage.
    pub fn to_record(&self) -> RawRecord {
        let mut rec = RawRecord::new();
        rec.insert(
            Field::DisplayName.key().to_string(),
            Value::from(self.display_name.clone()),
        );
        if let Some(orig) = &self.original_name {
            rec.insert(
                Field::OriginalName.key().to_string(),
                Value::from(orig.clone()),
            );
        }
        rec.insert(
            Field::ExpectedCases.key().to_string(),
            Value::from(self.expected_cases),
        );
        rec.insert(
            Field::VariableCost.key().to_string(),
            Value::from(self.variable_cost),
        );
        rec.insert(
            Field::DurationHours.key().to_string(),
            Value::from(self.duration_hours),
        );
        rec
    }
}

/// Service fields, named the way they appear in raw records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    DisplayName,
    OriginalName,
    ExpectedCases,
    VariableCost,
    DurationHours,
}

impl Field {
    pub const fn key(self) -> &'static str {
        match self {
            Field::DisplayName => "display_name",
            Field::OriginalName => "original_name",
            Field::ExpectedCases => "expected_cases",
            Field::VariableCost => "variable_cost",
            Field::DurationHours => "duration_hours",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A single problem found in a service collection. Rows are 1-based.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("service list is empty; add at least one service")]
    EmptyCollection,
    #[error("row {row}: missing required field `{field}`")]
    MissingField { row: usize, field: Field },
    #[error("row {row}: display name cannot be empty")]
    EmptyName { row: usize },
    #[error("duplicate display names: {}; names must be unique", .0.join(", "))]
    DuplicateName(Vec<String>),
    #[error("row {row}: `{field}` contains a non-numeric or invalid value")]
    NonNumericField { row: usize, field: Field },
    #[error("row {row}: `{field}` cannot be negative")]
    NegativeValue { row: usize, field: Field },
    #[error("row {row}: `duration_hours` must be greater than zero")]
    NonPositiveDuration { row: usize },
}

/// Every problem found in one validation pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationReport(Vec<ValidationError>);

impl ValidationReport {
    pub fn push(&mut self, err: ValidationError) {
        self.0.push(err);
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    fn into_result(self) -> Result<(), ValidationReport> {
        if self.0.is_empty() {
            Ok(())
        } else {
            debug!(problems = self.0.len(), "service validation failed");
            Err(self)
        }
    }
}

impl From<ValidationError> for ValidationReport {
    fn from(err: ValidationError) -> Self {
        Self(vec![err])
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} problem(s)", self.0.len())?;
        for (i, err) in self.0.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

/// Validate a typed service collection, reporting every problem at once.
pub fn validate_services(services: &[Service]) -> Result<(), ValidationReport> {
    let mut report = ValidationReport::default();
    if services.is_empty() {
        report.push(ValidationError::EmptyCollection);
        return report.into_result();
    }
    for (i, s) in services.iter().enumerate() {
        let row = i + 1;
        if s.display_name.trim().is_empty() {
            report.push(ValidationError::EmptyName { row });
        }
        if let Err(e) = check_variable_cost(row, s.variable_cost) {
            report.push(e);
        }
        if let Err(e) = check_duration(row, s.duration_hours) {
            report.push(e);
        }
    }
    let dups = duplicate_names(services.iter().map(|s| s.display_name.as_str()));
    if !dups.is_empty() {
        report.push(ValidationError::DuplicateName(dups));
    }
    report.into_result()
}

/// Convert raw records into typed services.
///
/// Numbers may arrive as JSON numbers or numeric strings. Anything that does not
/// parse is reported instead of being coerced, and all rows are checked before
/// returning.
pub fn parse_services(records: &[RawRecord]) -> Result<Vec<Service>, ValidationReport> {
    let mut report = ValidationReport::default();
    if records.is_empty() {
        report.push(ValidationError::EmptyCollection);
        return Err(report);
    }
    let mut services = Vec::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        let row = i + 1;
        let mut ok = true;
        let mut fail = |e: ValidationError| {
            report.push(e);
            false
        };

        let display_name = match text_field(rec, Field::DisplayName) {
            None => {
                ok = fail(ValidationError::MissingField {
                    row,
                    field: Field::DisplayName,
                });
                String::new()
            }
            Some(name) if name.trim().is_empty() => {
                ok = fail(ValidationError::EmptyName { row });
                name
            }
            Some(name) => name,
        };
        let expected_cases = match number_field(rec, row, Field::ExpectedCases)
            .and_then(|v| whole_cases(row, v))
        {
            Ok(n) => n,
            Err(e) => {
                ok = fail(e);
                0
            }
        };
        let variable_cost = match number_field(rec, row, Field::VariableCost)
            .and_then(|v| check_variable_cost(row, v).map(|_| v))
        {
            Ok(v) => v,
            Err(e) => {
                ok = fail(e);
                0.0
            }
        };
        let duration_hours = match number_field(rec, row, Field::DurationHours)
            .and_then(|v| check_duration(row, v).map(|_| v))
        {
            Ok(v) => v,
            Err(e) => {
                ok = fail(e);
                0.0
            }
        };

        if ok {
            services.push(Service {
                display_name,
                original_name: text_field(rec, Field::OriginalName)
                    .filter(|s| !s.trim().is_empty()),
                expected_cases,
                variable_cost,
                duration_hours,
            });
        } else {
            // keep the name so duplicates across partially-bad rows are still caught
            services.push(Service::new(display_name, 0, 0.0, 1.0));
        }
    }
    let dups = duplicate_names(services.iter().map(|s| s.display_name.as_str()));
    if !dups.is_empty() {
        report.push(ValidationError::DuplicateName(dups));
    }
    report.into_result().map(|_| services)
}

fn text_field(rec: &RawRecord, field: Field) -> Option<String> {
    match rec.get(field.key())? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn number_field(rec: &RawRecord, row: usize, field: Field) -> Result<f64, ValidationError> {
    let parsed = match rec.get(field.key()) {
        None | Some(Value::Null) => return Err(ValidationError::MissingField { row, field }),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or(ValidationError::NonNumericField { row, field })
}

fn whole_cases(row: usize, value: f64) -> Result<u32, ValidationError> {
    let field = Field::ExpectedCases;
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { row, field });
    }
    if value.fract() != 0.0 || value > f64::from(u32::MAX) {
        return Err(ValidationError::NonNumericField { row, field });
    }
    Ok(value as u32)
}

fn check_variable_cost(row: usize, value: f64) -> Result<(), ValidationError> {
    let field = Field::VariableCost;
    if !value.is_finite() {
        return Err(ValidationError::NonNumericField { row, field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { row, field });
    }
    Ok(())
}

fn check_duration(row: usize, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonNumericField {
            row,
            field: Field::DurationHours,
        });
    }
    if value <= 0.0 {
        return Err(ValidationError::NonPositiveDuration { row });
    }
    Ok(())
}

/// Names that occur more than once, in first-seen order. Blank names are
/// reported separately and skipped here.
fn duplicate_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for (i, name) in names.enumerate() {
        if name.trim().is_empty() {
            continue;
        }
        seen.entry(name).or_insert((i, 0)).1 += 1;
    }
    let mut dups: Vec<(usize, &str)> = seen
        .into_iter()
        .filter(|(_, (_, count))| *count > 1)
        .map(|(name, (first, _))| (first, name))
        .collect();
    dups.sort_unstable();
    dups.into_iter().map(|(_, name)| name.to_string()).collect()
}

/// Monthly fixed costs by category. Only the total feeds the pricing engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedCosts {
    pub rent: Decimal,
    pub salaries: Decimal,
    pub utilities: Decimal,
    pub insurance: Decimal,
    pub marketing: Decimal,
    pub other: Decimal,
}

impl FixedCosts {
    /// A pool with everything booked under `other`.
    pub fn lump_sum(amount: Decimal) -> Self {
        Self {
            rent: Decimal::ZERO,
            salaries: Decimal::ZERO,
            utilities: Decimal::ZERO,
            insurance: Decimal::ZERO,
            marketing: Decimal::ZERO,
            other: amount,
        }
    }

    pub fn categories(&self) -> [(&'static str, Decimal); 6] {
        [
            ("rent", self.rent),
            ("salaries", self.salaries),
            ("utilities", self.utilities),
            ("insurance", self.insurance),
            ("marketing", self.marketing),
            ("other", self.other),
        ]
    }

    pub fn total(&self) -> Decimal {
        self.categories().iter().map(|(_, v)| *v).sum()
    }
}

impl Default for FixedCosts {
    fn default() -> Self {
        Self {
            rent: Decimal::new(15_000, 0),
            salaries: Decimal::new(25_000, 0),
            utilities: Decimal::new(5_000, 0),
            insurance: Decimal::new(2_000, 0),
            marketing: Decimal::new(1_500, 0),
            other: Decimal::new(1_000, 0),
        }
    }
}

/// Clinic-wide pricing inputs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClinicSettings {
    pub fixed_costs: FixedCosts,
    /// Markup on total cost per case, e.g. 0.35 = 35%.
    pub base_margin: f64,
}

impl Default for ClinicSettings {
    fn default() -> Self {
        Self {
            fixed_costs: FixedCosts::default(),
            base_margin: 0.35,
        }
    }
}

/// Settings errors.
#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("fixed cost `{0}` cannot be negative")]
    NegativeFixedCost(&'static str),
    #[error("margin must be finite and >= 0, got {0}")]
    InvalidMargin(f64),
}

impl ClinicSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        for (name, value) in self.fixed_costs.categories() {
            if value < Decimal::ZERO {
                return Err(SettingsError::NegativeFixedCost(name));
            }
        }
        if !self.base_margin.is_finite() || self.base_margin < 0.0 {
            return Err(SettingsError::InvalidMargin(self.base_margin));
        }
        Ok(())
    }

    /// The fixed-cost pool handed to the engine.
    pub fn total_fixed_cost(&self) -> f64 {
        // NaN is rejected by the engine, so an unrepresentable total fails closed.
        self.fixed_costs.total().to_f64().unwrap_or(f64::NAN)
    }
}

/// The default procedure list for a small dental clinic.
pub fn default_services() -> Vec<Service> {
    [
        ("تنظيف وتلميع", "Scaling & Polishing", 80, 100.0, 0.75),
        ("حشو كومبوزيت", "Composite Filling", 60, 200.0, 1.0),
        ("حشو أملغم", "Amalgam Filling", 20, 150.0, 0.75),
        ("علاج عصب (ضرس)", "Root Canal Therapy (Molar)", 30, 450.0, 2.0),
        ("خلع (عادي)", "Simple Extraction", 50, 80.0, 0.5),
        ("خلع (جراحي)", "Surgical Extraction", 15, 300.0, 1.5),
        ("تركيبة بورسلين", "Porcelain Crown (PFM)", 25, 600.0, 1.5),
        ("تركيبة زيركون", "Zirconia Crown", 15, 1000.0, 1.5),
        ("تبييض الأسنان (عيادة)", "In-Office Teeth Whitening", 20, 700.0, 1.5),
        ("زراعة أسنان (جراحة فقط)", "Dental Implant (Surgery)", 10, 2500.0, 2.0),
    ]
    .into_iter()
    .map(|(orig, name, cases, cost, hours)| {
        Service::new(name, cases, cost, hours).with_original_name(orig)
    })
    .collect()
}
