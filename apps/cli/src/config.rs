//! Scenario files: clinic settings plus a service list, in YAML or JSON.

use anyhow::{Context, Result};
use clinic_core::{parse_services, ClinicSettings, RawRecord};
use persistence::AppData;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize)]
struct ScenarioFile {
    #[serde(default)]
    settings: ClinicSettings,
    services: Vec<RawRecord>,
}

/// Load and validate a scenario file. `.yaml`/`.yml` is read as YAML,
/// anything else as JSON.
pub fn load_scenario_file(path: &Path) -> Result<AppData> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading scenario file {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    );
    let file: ScenarioFile = if is_yaml {
        serde_yaml::from_str(&text)
            .with_context(|| format!("parsing YAML scenario {}", path.display()))?
    } else {
        serde_json::from_str(&text)
            .with_context(|| format!("parsing JSON scenario {}", path.display()))?
    };
    file.settings
        .validate()
        .with_context(|| format!("settings in {}", path.display()))?;
    let services = parse_services(&file.services)
        .with_context(|| format!("services in {}", path.display()))?;
    info!(
        path = %path.display(),
        services = services.len(),
        "scenario file loaded"
    );
    Ok(AppData {
        settings: file.settings,
        services,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_core::{default_services, ValidationReport};
    use std::path::PathBuf;

    fn asset(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../assets/scenarios")
            .join(name)
    }

    fn write_temp(name: &str, text: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("clinic-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn bundled_scenario_matches_defaults() {
        let data = load_scenario_file(&asset("egypt_clinic.yaml")).unwrap();
        assert_eq!(data, AppData::default());
        assert_eq!(data.services, default_services());
    }

    #[test]
    fn json_scenario_without_settings_uses_defaults() {
        let path = write_temp(
            "minimal.json",
            r#"{"services": [{"display_name": "Exam", "expected_cases": 40,
                "variable_cost": 20, "duration_hours": "0.5"}]}"#,
        );
        let data = load_scenario_file(&path).unwrap();
        assert_eq!(data.settings, ClinicSettings::default());
        assert_eq!(data.services.len(), 1);
        assert_eq!(data.services[0].duration_hours, 0.5);
    }

    #[test]
    fn invalid_services_surface_the_report() {
        let path = write_temp(
            "bad.yml",
            "services:\n  - display_name: Exam\n    expected_cases: 4\n    variable_cost: -1\n    duration_hours: 0\n",
        );
        let err = load_scenario_file(&path).unwrap_err();
        let report = err.downcast_ref::<ValidationReport>().unwrap();
        assert_eq!(report.len(), 2);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_scenario_file(&asset("does_not_exist.yaml")).is_err());
    }
}
