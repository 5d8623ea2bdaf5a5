//! Explicit application state for one shell session.
//!
//! The session owns the editable inputs and the most recent pricing run. Any edit
//! drops the cached run, so analysis can never read results that disagree with
//! the current inputs.

use clinic_core::{
    validate_services, ClinicSettings, FixedCosts, Service, SettingsError, ValidationReport,
};
use clinic_pricing::{
    compute_pricing, simulate, Baseline, CaseRange, PortfolioSummary, PricingError, Scenario,
    ScenarioError, ScenarioOutcome, SensitivityCurve, ServiceResult,
};
use persistence::AppData;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("pricing has not been calculated for the current inputs")]
    NotCalculated,
    #[error("service `{0}` not found")]
    UnknownService(String),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Pricing(#[from] PricingError),
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
}

/// A pricing run and the inputs it was computed from.
#[derive(Debug)]
struct Calculation {
    results: Vec<ServiceResult>,
    total_fixed_cost: f64,
    margin: f64,
}

#[derive(Debug)]
pub struct Session {
    settings: ClinicSettings,
    services: Vec<Service>,
    last: Option<Calculation>,
}

impl Session {
    pub fn new(settings: ClinicSettings, services: Vec<Service>) -> Self {
        Self {
            settings,
            services,
            last: None,
        }
    }

    pub fn from_data(data: AppData) -> Self {
        Self::new(data.settings, data.services)
    }

    pub fn to_data(&self) -> AppData {
        AppData {
            settings: self.settings.clone(),
            services: self.services.clone(),
        }
    }

    pub fn settings(&self) -> &ClinicSettings {
        &self.settings
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.display_name == name)
    }

    pub fn is_calculated(&self) -> bool {
        self.last.is_some()
    }

    /// Replace the service with the same display name, or append it.
    pub fn upsert_service(&mut self, service: Service) {
        match self
            .services
            .iter_mut()
            .find(|s| s.display_name == service.display_name)
        {
            Some(existing) => *existing = service,
            None => self.services.push(service),
        }
        self.invalidate();
    }

    pub fn remove_service(&mut self, name: &str) -> Option<Service> {
        let idx = self.services.iter().position(|s| s.display_name == name)?;
        self.invalidate();
        Some(self.services.remove(idx))
    }

    pub fn replace_services(&mut self, services: Vec<Service>) {
        self.services = services;
        self.invalidate();
    }

    pub fn set_margin(&mut self, margin: f64) {
        self.settings.base_margin = margin;
        self.invalidate();
    }

    pub fn set_fixed_costs(&mut self, fixed_costs: FixedCosts) {
        self.settings.fixed_costs = fixed_costs;
        self.invalidate();
    }

    fn invalidate(&mut self) {
        if self.last.take().is_some() {
            debug!("inputs changed; cached pricing dropped");
        }
    }

    /// Problems that would block `calculate`.
    pub fn validate(&self) -> Result<(), ValidationReport> {
        validate_services(&self.services)
    }

    /// Price the current inputs and cache the run.
    pub fn calculate(&mut self) -> Result<&[ServiceResult], SessionError> {
        self.last = None;
        self.settings.validate()?;
        let total_fixed_cost = self.settings.total_fixed_cost();
        let margin = self.settings.base_margin;
        let results = compute_pricing(&self.services, total_fixed_cost, margin)?;
        info!(
            services = results.len(),
            total_fixed_cost, margin, "pricing calculated"
        );
        let calc = self.last.insert(Calculation {
            results,
            total_fixed_cost,
            margin,
        });
        Ok(&calc.results)
    }

    fn calculation(&self) -> Result<&Calculation, SessionError> {
        self.last.as_ref().ok_or(SessionError::NotCalculated)
    }

    pub fn results(&self) -> Result<&[ServiceResult], SessionError> {
        Ok(&self.calculation()?.results)
    }

    pub fn summary(&self) -> Result<PortfolioSummary, SessionError> {
        let calc = self.calculation()?;
        Ok(PortfolioSummary::from_results(
            &calc.results,
            calc.total_fixed_cost,
        ))
    }

    /// Sensitivity curve for one service using the cached allocation and margin.
    /// Without a range, one is derived from the service's expected volume.
    pub fn sensitivity(
        &self,
        name: &str,
        range: Option<CaseRange>,
    ) -> Result<SensitivityCurve, SessionError> {
        let calc = self.calculation()?;
        let result = calc
            .results
            .iter()
            .find(|r| r.name() == name)
            .ok_or_else(|| SessionError::UnknownService(name.to_string()))?;
        let range = range.unwrap_or_else(|| CaseRange::around(result.service.expected_cases));
        Ok(SensitivityCurve::for_result(result, calc.margin, &range))
    }

    /// Run a what-if against the cached run without touching the session inputs.
    pub fn simulate(&self, scenario: &Scenario) -> Result<ScenarioOutcome, SessionError> {
        let calc = self.calculation()?;
        let base = Baseline {
            services: &self.services,
            results: &calc.results,
            total_fixed_cost: calc.total_fixed_cost,
            margin: calc.margin,
        };
        Ok(simulate(&base, scenario)?)
    }
}
