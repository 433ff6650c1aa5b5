//! Configuration types for Shift Warden.
//!
//! A complete configuration file looks like:
//!
//! ```toml
//! [collector]
//! base_url = "https://api.example.com"
//! token = "..."            # or set WARDEN_TOKEN
//! timeout_secs = 10
//!
//! [monitor]
//! compliant_interval_secs = 120
//! warning_interval_secs = 30
//!
//! [monitor.retry]
//! max_retries = 5
//!
//! [work_area]
//! center_latitude = 40.0
//! center_longitude = -74.0
//! radius_meters = 50.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use warden_geofence::WorkAreaConfig;
use warden_monitor::MonitorConfig;
use warden_transport::CollectorConfig;

use crate::{error::WardenError, Result};

/// Environment variable that overrides `collector.token`.
pub const TOKEN_ENV: &str = "WARDEN_TOKEN";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Compliance collector connection.
    pub collector: CollectorConfig,

    /// State machine, cadence and retry tuning.
    pub monitor: MonitorConfig,

    /// Work area to monitor. Usually supplied per shift by the caller;
    /// optional here for standalone runs.
    pub work_area: Option<WorkAreaConfig>,
}

impl WardenConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| WardenError::Config(e.to_string()))
    }

    /// Reads and parses a TOML file, then applies environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_env_token(std::env::var(TOKEN_ENV).ok());
        Ok(config)
    }

    /// Replaces the collector token when an override is present and non-empty.
    pub fn apply_env_token(&mut self, token: Option<String>) {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.collector.token = token;
        }
    }

    /// Checks every section.
    pub fn validate(&self) -> Result<()> {
        self.monitor.validate()?;
        if let Some(area) = &self.work_area {
            area.validate()?;
        }
        if self.collector.timeout_secs == 0 {
            return Err(WardenError::Config(
                "collector timeout must be at least one second".to_string(),
            ));
        }
        self.collector.heartbeat_url()?;
        Ok(())
    }

    /// The configured work area, or a config error if absent.
    pub fn require_work_area(&self) -> Result<WorkAreaConfig> {
        self.work_area
            .ok_or_else(|| WardenError::Config("no [work_area] section".to_string()))
    }
}
