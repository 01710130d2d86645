// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::FacingPreference;
use crate::constants::{self, timing};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Persisted user configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Detection poll cadence in milliseconds
    pub poll_interval_ms: u64,
    /// Camera acquisition timeout in milliseconds (None waits forever)
    pub acquisition_timeout_ms: Option<u64>,
    /// Ownership lookup timeout in milliseconds (None waits forever)
    pub verification_timeout_ms: Option<u64>,
    /// Pause before polling resumes after an unknown code, in milliseconds
    pub rescan_delay_ms: u64,
    /// Camera asked for first
    pub preferred_facing: FacingPreference,
    /// Frames are downscaled so neither side exceeds this before detection
    pub max_detect_dimension: u32,
    /// Plant detail URL, `{id}` is replaced with the scanned plant id
    pub detail_url_template: String,
    /// Plant registry JSON used when no backend is wired in
    pub registry_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: timing::POLL_INTERVAL.as_millis() as u64,
            acquisition_timeout_ms: Some(timing::ACQUISITION_TIMEOUT.as_millis() as u64),
            verification_timeout_ms: Some(timing::VERIFICATION_TIMEOUT.as_millis() as u64),
            rescan_delay_ms: timing::RESCAN_DELAY.as_millis() as u64,
            preferred_facing: FacingPreference::Environment,
            max_detect_dimension: constants::detection::MAX_DIMENSION,
            detail_url_template: constants::DEFAULT_DETAIL_URL_TEMPLATE.to_string(),
            registry_path: None,
        }
    }
}

/// Timing and device policy the scanner state machine runs with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerSettings {
    pub poll_interval: Duration,
    pub acquisition_timeout: Option<Duration>,
    pub verification_timeout: Option<Duration>,
    pub rescan_delay: Duration,
    pub preferred_facing: FacingPreference,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Config::default().scanner_settings()
    }
}

impl Config {
    /// Default location: `$XDG_CONFIG_HOME/plantscan/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("plantscan").join("config.json"))
    }

    /// Load from the default location, falling back to defaults
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            warn!("No config directory available, using defaults");
            return Self::default();
        };

        match Self::load(&path) {
            Ok(config) => config,
            Err(AppError::Storage(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                Self::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// Load from a specific file
    pub fn load(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Write to a specific file, creating parent directories
    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        debug!(path = %path.display(), "Saved config");
        Ok(())
    }

    /// Reject values the scanner cannot run with
    pub fn validate(&self) -> AppResult<()> {
        if !self
            .detail_url_template
            .contains(constants::DETAIL_URL_PLACEHOLDER)
        {
            return Err(AppError::Config(format!(
                "detail_url_template must contain {}",
                constants::DETAIL_URL_PLACEHOLDER
            )));
        }
        Ok(())
    }

    /// Scanner timing derived from this config.
    ///
    /// A poll interval below the minimum is clamped up to it.
    pub fn scanner_settings(&self) -> ScannerSettings {
        let poll_interval =
            Duration::from_millis(self.poll_interval_ms).max(timing::MIN_POLL_INTERVAL);

        ScannerSettings {
            poll_interval,
            acquisition_timeout: self.acquisition_timeout_ms.map(Duration::from_millis),
            verification_timeout: self.verification_timeout_ms.map(Duration::from_millis),
            rescan_delay: Duration::from_millis(self.rescan_delay_ms),
            preferred_facing: self.preferred_facing,
        }
    }
}
