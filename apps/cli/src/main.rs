#![deny(warnings)]

//! Headless CLI: price a clinic's services, inspect break-even and sensitivity,
//! and run what-if scenarios against the last pricing run.

use anyhow::{bail, Result};
use clap::Parser;
use clinic_cli::args::CliArgs;
use clinic_cli::session::{Session, SessionError};
use clinic_cli::{config, render};
use clinic_core::ClinicSettings;
use clinic_pricing::{PortfolioSummary, ScenarioOutcome, SensitivityCurve, ServiceResult};
use persistence::{default_data_path, Store};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Everything one invocation computed, for `--json`.
#[derive(Serialize)]
struct Report<'a> {
    settings: &'a ClinicSettings,
    total_fixed_cost: f64,
    summary: &'a PortfolioSummary,
    results: &'a [ServiceResult],
    sensitivity: Option<&'a SensitivityCurve>,
    scenario: Option<&'a ScenarioOutcome>,
}

fn load_session(args: &CliArgs, store: &Store) -> Result<Session> {
    let data = match &args.scenario_file {
        Some(path) => config::load_scenario_file(path)?,
        None => store.load()?,
    };
    let mut session = Session::from_data(data);
    if let Some(margin) = args.margin {
        session.set_margin(margin);
    }
    Ok(session)
}

fn sensitivity(args: &CliArgs, session: &Session) -> Result<Option<SensitivityCurve>> {
    let Some(name) = &args.sensitivity else {
        return Ok(None);
    };
    let service = session
        .service(name)
        .ok_or_else(|| SessionError::UnknownService(name.clone()))?;
    let range = args.case_range(service.expected_cases)?;
    Ok(Some(session.sensitivity(name, range)?))
}

fn main() -> Result<()> {
    // Logging goes to stderr so `--json` output stays parseable.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();
    info!(?args, "starting CLI");

    let store = Store::new(args.data.clone().unwrap_or_else(|| default_data_path().into()));
    if args.reset && store.reset()? {
        info!(path = %store.path().display(), "data reset to defaults");
    }
    let mut session = load_session(&args, &store)?;

    if let Err(report) = session.validate() {
        for err in report.errors() {
            eprintln!("  - {err}");
        }
        bail!("cannot price services: {} problem(s)", report.len());
    }
    session.calculate()?;
    let summary = session.summary()?;
    if !summary.overall_break_even_revenue.is_finite() {
        warn!("portfolio contribution is not positive; fixed costs are never recovered");
    }
    let curve = sensitivity(&args, &session)?;
    let outcome = match args.scenario() {
        Some(scenario) => Some(session.simulate(&scenario)?),
        None => None,
    };

    if args.json {
        let report = Report {
            settings: session.settings(),
            total_fixed_cost: summary.total_fixed_cost,
            summary: &summary,
            results: session.results()?,
            sensitivity: curve.as_ref(),
            scenario: outcome.as_ref(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", render::render_results(session.results()?));
        print!("{}", render::render_summary(&summary));
        if let Some(curve) = &curve {
            println!();
            print!("{}", render::render_sensitivity(curve));
        }
        if let Some(outcome) = &outcome {
            println!();
            print!("{}", render::render_scenario(outcome));
        }
    }

    if args.save {
        let saved_at = store.save(&session.to_data())?;
        info!(path = %store.path().display(), %saved_at, "inputs saved");
    }
    Ok(())
}
