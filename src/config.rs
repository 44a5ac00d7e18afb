//! Configuration management for AgileView
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files with support for environment variable overrides.

use crate::error::{AgileViewError, Result};
use crate::series::Region;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod defaults;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Octopus Energy API access
    pub octopus: OctopusConfig,

    /// Series cache backend
    pub storage: StorageConfig,

    /// Day synchronizer tuning
    pub sync: SyncConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Web server binding configuration
    pub web: WebConfig,

    /// Reference timezone that defines civil day boundaries
    pub timezone: String,

    /// Tariff region selected when a session starts (A-P)
    pub region: String,

    /// Appliances estimated on startup
    pub appliances: Vec<ApplianceConfig>,
}

/// Octopus Energy REST API parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OctopusConfig {
    /// API root, without trailing slash
    pub base_url: String,

    /// Product code of the half-hourly tariff
    pub product_code: String,

    /// Product code of the alternate (comparison) tariff
    pub alt_product_code: String,

    /// Account API key, sent as HTTP basic auth user
    pub api_key: String,

    /// Account number used to discover the meter
    pub account_number: String,

    /// Meter point administration number; discovered when empty
    pub mpan: String,

    /// Meter serial number; discovered when empty
    pub serial_number: String,

    /// Page size requested from paginated endpoints
    pub page_size: u32,

    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

/// Series cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend (sqlite or memory)
    pub backend: String,

    /// Path of the SQLite database file
    pub path: String,
}

/// Day synchronizer tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Days added to a fetch on the first load of a session
    pub initial_span_days: u32,

    /// Days added to a fetch while scrolling
    pub scroll_span_days: u32,

    /// Hour (reference timezone) after which next-day prices are published
    pub publish_hour: u32,

    /// Missing intervals tolerated for today's window
    pub partial_day_tolerance: usize,

    /// Hour of tomorrow that the latest cached price must pass for
    /// tomorrow's prices to count as available
    pub next_available_hour: u32,

    /// Slot count derived series are padded to
    pub day_intervals: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional console-specific level
    pub console_level: Option<String>,

    /// Optional file-specific level
    pub file_level: Option<String>,

    /// Path to log file
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Bind address
    pub host: String,

    /// TCP port
    pub port: u16,
}

/// Appliance declared in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplianceConfig {
    pub name: String,
    pub power_w: u32,
    pub hours: u32,
    pub minutes: u32,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yaml::from_str(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from the first default location that exists
    pub fn load() -> Result<Self> {
        let default_paths = [
            "agileview.yaml",
            "/data/agileview.yaml",
            "/etc/agileview/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Credentials from the environment win over the file
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("AGILEVIEW_API_KEY")
            && !key.trim().is_empty()
        {
            self.octopus.api_key = key.trim().to_string();
        }
        if let Ok(account) = std::env::var("AGILEVIEW_ACCOUNT_NUMBER")
            && !account.trim().is_empty()
        {
            self.octopus.account_number = account.trim().to_string();
        }
    }

    /// Parsed reference timezone
    pub fn reference_tz(&self) -> Result<Tz> {
        self.timezone.parse::<Tz>().map_err(|_| {
            AgileViewError::validation("timezone", &format!("unknown timezone {}", self.timezone))
        })
    }

    /// Parsed default region
    pub fn default_region(&self) -> Result<Region> {
        self.region.parse::<Region>()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.reference_tz()?;
        self.default_region()?;

        if self.octopus.base_url.trim().is_empty() {
            return Err(AgileViewError::validation(
                "octopus.base_url",
                "Base URL cannot be empty",
            ));
        }

        if self.octopus.product_code.trim().is_empty() {
            return Err(AgileViewError::validation(
                "octopus.product_code",
                "Product code cannot be empty",
            ));
        }

        if self.octopus.page_size == 0 {
            return Err(AgileViewError::validation(
                "octopus.page_size",
                "Must be greater than 0",
            ));
        }

        match self.storage.backend.to_lowercase().as_str() {
            "memory" => {}
            "sqlite" => {
                if self.storage.path.trim().is_empty() {
                    return Err(AgileViewError::validation(
                        "storage.path",
                        "SQLite backend needs a path",
                    ));
                }
            }
            other => {
                return Err(AgileViewError::validation(
                    "storage.backend",
                    &format!("unknown backend {}", other),
                ));
            }
        }

        if self.sync.initial_span_days == 0 || self.sync.scroll_span_days == 0 {
            return Err(AgileViewError::validation(
                "sync",
                "Widening spans must be at least one day",
            ));
        }

        if self.sync.publish_hour > 23 || self.sync.next_available_hour > 23 {
            return Err(AgileViewError::validation(
                "sync",
                "Hours must be within 0..=23",
            ));
        }

        if self.sync.day_intervals == 0 {
            return Err(AgileViewError::validation(
                "sync.day_intervals",
                "Must be greater than 0",
            ));
        }

        if self.web.port == 0 {
            return Err(AgileViewError::validation(
                "web.port",
                "Port must be greater than 0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.timezone, "Europe/London");
        assert_eq!(config.region, "A");
        assert_eq!(config.sync.initial_span_days, 3);
        assert_eq!(config.sync.scroll_span_days, 30);
        assert_eq!(config.sync.publish_hour, 16);
        assert_eq!(config.sync.partial_day_tolerance, 8);
        assert_eq!(config.octopus.page_size, 25000);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.timezone = "Mars/Olympus".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config.region = "I".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config.storage.backend = "postgres".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config.sync.publish_hour = 24;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let deserialized: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.web.port, deserialized.web.port);
        assert_eq!(config.octopus.product_code, deserialized.octopus.product_code);
    }

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let cfg: Config = serde_yaml::from_str("region: C\nsync:\n  scroll_span_days: 7\n").unwrap();
        assert_eq!(cfg.region, "C");
        assert_eq!(cfg.sync.scroll_span_days, 7);
        assert_eq!(cfg.sync.initial_span_days, 3);
        assert_eq!(cfg.timezone, "Europe/London");
    }
}
