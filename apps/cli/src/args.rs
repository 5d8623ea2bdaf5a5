use clap::Parser;
use clinic_pricing::{CaseRange, RangeError, Scenario, ServiceOverride};
use std::ffi::OsString;
use std::path::PathBuf;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    " ",
    env!("BUILD_DATE"),
    ")"
);

fn finite(raw: &str) -> Result<f64, String> {
    let v: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("`{raw}` is not a valid number"))?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err("value must be finite".to_string())
    }
}

/// Price a clinic's services, inspect break-even and sensitivity, and run
/// what-if scenarios against the last pricing run.
#[derive(Debug, Default, PartialEq, Parser)]
#[command(
    name = "clinic-cli",
    version = VERSION,
    after_help = "Set RUST_LOG to adjust logging, e.g. RUST_LOG=debug."
)]
pub struct CliArgs {
    /// Saved data file [default: clinic_data.json]
    #[arg(long, value_name = "PATH")]
    pub data: Option<PathBuf>,
    /// Load settings and services from a YAML or JSON file
    #[arg(long = "scenario", value_name = "PATH")]
    pub scenario_file: Option<PathBuf>,
    /// Override the base margin, e.g. 0.35
    #[arg(long, value_name = "FRACTION", value_parser = finite)]
    pub margin: Option<f64>,

    /// Price/break-even curve for one service
    #[arg(long, value_name = "NAME")]
    pub sensitivity: Option<String>,
    /// Smallest case count on the curve (derived when omitted)
    #[arg(long = "min", value_name = "N", requires = "sensitivity")]
    pub min_cases: Option<i64>,
    /// Largest case count on the curve (derived when omitted)
    #[arg(long = "max", value_name = "N", requires = "sensitivity")]
    pub max_cases: Option<i64>,
    /// Case count increment (derived when omitted)
    #[arg(long, value_name = "N", requires = "sensitivity")]
    pub step: Option<i64>,

    /// What-if margin
    #[arg(long, value_name = "FRACTION", value_parser = finite)]
    pub simulate_margin: Option<f64>,
    /// What-if fixed-cost total
    #[arg(long, value_name = "EGP", value_parser = finite)]
    pub simulate_fixed_cost: Option<f64>,
    /// What-if service to modify
    #[arg(long = "override", value_name = "NAME")]
    pub override_name: Option<String>,
    /// Variable cost for the overridden service
    #[arg(long, value_name = "EGP", value_parser = finite, requires = "override_name")]
    pub override_cost: Option<f64>,
    /// Expected cases for the overridden service
    #[arg(long, value_name = "N", requires = "override_name")]
    pub override_cases: Option<u32>,
    /// Duration in hours for the overridden service
    #[arg(long, value_name = "HOURS", value_parser = finite, requires = "override_name")]
    pub override_duration: Option<f64>,

    /// Print a JSON report instead of tables
    #[arg(long)]
    pub json: bool,
    /// Write the inputs back to the data file
    #[arg(long)]
    pub save: bool,
    /// Delete the data file before loading
    #[arg(long)]
    pub reset: bool,
}

/// Parse command-line arguments (without the program name).
pub fn parse_args<I, T>(args: I) -> Result<CliArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let argv = std::iter::once(OsString::from("clinic-cli"))
        .chain(args.into_iter().map(Into::into));
    CliArgs::try_parse_from(argv)
}

impl CliArgs {
    /// The what-if requested on the command line, if any.
    pub fn scenario(&self) -> Option<Scenario> {
        let service_override = self.override_name.as_ref().map(|name| ServiceOverride {
            variable_cost: self.override_cost,
            expected_cases: self.override_cases,
            duration_hours: self.override_duration,
            ..ServiceOverride::new(name.clone())
        });
        let scenario = Scenario {
            fixed_cost: self.simulate_fixed_cost,
            margin: self.simulate_margin,
            service_override,
        };
        (scenario != Scenario::default()).then_some(scenario)
    }

    /// An explicit case range, with missing bounds taken from the range derived
    /// around `expected_cases`. `None` when no bound was given.
    pub fn case_range(&self, expected_cases: u32) -> Result<Option<CaseRange>, RangeError> {
        if self.min_cases.is_none() && self.max_cases.is_none() && self.step.is_none() {
            return Ok(None);
        }
        let derived = CaseRange::around(expected_cases);
        CaseRange::new(
            self.min_cases.unwrap_or(derived.min()),
            self.max_cases.unwrap_or(derived.max()),
            self.step.unwrap_or(derived.step()),
        )
        .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<CliArgs, clap::Error> {
        parse_args(args.iter().copied())
    }

    #[test]
    fn command_definition_is_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn no_arguments_means_defaults() {
        let args = parse(&[]).unwrap();
        assert_eq!(args, CliArgs::default());
        assert!(args.scenario().is_none());
        assert_eq!(args.case_range(10), Ok(None));
    }

    #[test]
    fn parses_every_flag() {
        let args = parse(&[
            "--data", "d.json", "--scenario", "s.yaml", "--margin", "0.4", "--sensitivity",
            "Zirconia Crown", "--min", "5", "--max", "30", "--step", "5", "--json", "--save",
            "--reset",
        ])
        .unwrap();
        assert_eq!(args.data, Some(PathBuf::from("d.json")));
        assert_eq!(args.scenario_file, Some(PathBuf::from("s.yaml")));
        assert_eq!(args.margin, Some(0.4));
        assert_eq!(args.sensitivity.as_deref(), Some("Zirconia Crown"));
        assert!(args.json && args.save && args.reset);
        let range = args.case_range(15).unwrap().unwrap();
        assert_eq!(range.values(), vec![5, 10, 15, 20, 25, 30]);
    }

    #[test]
    fn scenario_flags_build_a_scenario() {
        let args = parse(&[
            "--simulate-margin", "0.5", "--simulate-fixed-cost", "60000", "--override",
            "Zirconia Crown", "--override-cases", "20",
        ])
        .unwrap();
        let s = args.scenario().unwrap();
        assert_eq!(s.margin, Some(0.5));
        assert_eq!(s.fixed_cost, Some(60_000.0));
        let ovr = s.service_override.unwrap();
        assert_eq!(ovr.display_name, "Zirconia Crown");
        assert_eq!(ovr.expected_cases, Some(20));
        assert_eq!(ovr.variable_cost, None);
    }

    #[test]
    fn rejects_bad_input_instead_of_coercing() {
        assert!(parse(&["--margin", "abc"]).is_err());
        assert!(parse(&["--margin", "inf"]).is_err());
        assert!(parse(&["--margin"]).is_err());
        assert!(parse(&["--override", "A", "--override-cases", "-3"]).is_err());
        assert!(parse(&["--frobnicate"]).is_err());
        assert_eq!(
            parse(&["--override-cost", "10"]).unwrap_err().kind(),
            ErrorKind::MissingRequiredArgument
        );
        assert_eq!(
            parse(&["--min", "3"]).unwrap_err().kind(),
            ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn help_and_version_stop_parsing() {
        assert_eq!(parse(&["--help"]).unwrap_err().kind(), ErrorKind::DisplayHelp);
        assert_eq!(
            parse(&["--version"]).unwrap_err().kind(),
            ErrorKind::DisplayVersion
        );
    }

    #[test]
    fn partial_range_fills_from_expected_volume() {
        let args = parse(&["--sensitivity", "A", "--max", "40"]).unwrap();
        let r = args.case_range(80).unwrap().unwrap();
        assert_eq!((r.min(), r.max(), r.step()), (16, 40, 14));
        let args = parse(&["--sensitivity", "A", "--min", "50", "--max", "40"]).unwrap();
        assert_eq!(
            args.case_range(80),
            Err(RangeError::Inverted { min: 50, max: 40 })
        );
    }

    #[test]
    fn oversized_range_is_an_error() {
        let args = parse(&[
            "--sensitivity", "A", "--min", "1", "--max", "10000000000", "--step", "1",
        ])
        .unwrap();
        assert!(matches!(
            args.case_range(80),
            Err(RangeError::TooManyPoints { .. })
        ));
        let args = parse(&["--sensitivity", "A", "--max", "10000000000"]).unwrap();
        assert!(matches!(
            args.case_range(80),
            Err(RangeError::TooManyPoints { .. })
        ));
    }
}
