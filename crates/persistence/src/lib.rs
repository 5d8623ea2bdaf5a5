#![deny(warnings)]

//! Persistence layer: clinic settings and the service list as one JSON document.
//!
//! Services are stored as raw records so a hand-edited file goes through the same
//! boundary validation as grid input. Loading never substitutes defaults for bad
//! data; only a missing file falls back to the default clinic.

use chrono::{DateTime, Utc};
use clinic_core::{
    default_services, parse_services, validate_services, ClinicSettings, RawRecord, Service,
    SettingsError, ValidationReport,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Version written into every data file.
pub const FORMAT_VERSION: u32 = 1;

/// Returns the default data file used for local saves.
pub fn default_data_path() -> &'static str {
    "clinic_data.json"
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed data file: {0}")]
    Format(#[from] serde_json::Error),
    #[error("unsupported data file version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),
    #[error("invalid services: {0}")]
    Invalid(#[from] ValidationReport),
}

/// Everything the shell keeps between sessions.
#[derive(Clone, Debug, PartialEq)]
pub struct AppData {
    pub settings: ClinicSettings,
    pub services: Vec<Service>,
}

impl Default for AppData {
    fn default() -> Self {
        Self {
            settings: ClinicSettings::default(),
            services: default_services(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct DataFile {
    version: u32,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
    settings: ClinicSettings,
    services: Vec<RawRecord>,
}

/// Parse and validate a data file.
pub fn decode(text: &str) -> Result<AppData, PersistenceError> {
    let file: DataFile = serde_json::from_str(text)?;
    if file.version != FORMAT_VERSION {
        return Err(PersistenceError::UnsupportedVersion {
            found: file.version,
            expected: FORMAT_VERSION,
        });
    }
    file.settings.validate()?;
    let services = parse_services(&file.services)?;
    Ok(AppData {
        settings: file.settings,
        services,
    })
}

/// Render `data` as a data file stamped with `saved_at`.
pub fn encode(data: &AppData, saved_at: DateTime<Utc>) -> Result<String, PersistenceError> {
    data.settings.validate()?;
    validate_services(&data.services)?;
    let file = DataFile {
        version: FORMAT_VERSION,
        saved_at: Some(saved_at),
        settings: data.settings.clone(),
        services: data.services.iter().map(Service::to_record).collect(),
    };
    Ok(serde_json::to_string_pretty(&file)?)
}

/// A data file on disk.
#[derive(Clone, Debug)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load saved data, or the default clinic when nothing has been saved yet.
    pub fn load(&self) -> Result<AppData, PersistenceError> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "no saved data, using defaults");
            return Ok(AppData::default());
        }
        let text = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        let data = decode(&text).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "saved data rejected");
            e
        })?;
        info!(
            path = %self.path.display(),
            services = data.services.len(),
            "data loaded"
        );
        Ok(data)
    }

    /// Validate and write `data`, replacing any previous file.
    pub fn save(&self, data: &AppData) -> Result<DateTime<Utc>, PersistenceError> {
        let saved_at = Utc::now();
        let text = encode(data, saved_at)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        // write-then-rename so a failed save never truncates the old file
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        info!(path = %self.path.display(), services = data.services.len(), "data saved");
        Ok(saved_at)
    }

    /// Delete the data file. Returns whether there was one.
    pub fn reset(&self) -> Result<bool, PersistenceError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "saved data removed");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn io_error(&self, source: io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
