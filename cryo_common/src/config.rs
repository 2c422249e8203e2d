//! Configuration loading for the cryostat supervisor.
//!
//! Mirrors the workspace's TOML-first configuration style: a single
//! `ConfigLoader` trait blanket-implemented for any `DeserializeOwned`
//! type, blanket `load()` from a file path, and an explicit `validate()`
//! step run once at startup before any hardware I/O begins.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calib::CalibrationTable;
use crate::consts;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parsing failed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// Trait for loading configuration from TOML files.
///
/// Provides a default implementation for any type implementing
/// `serde::de::DeserializeOwned`.
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound(path.display().to_string())
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

/// Process log verbosity, independent of the operator-facing monthly log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

fn default_adc_port() -> u16 {
    502
}

fn default_bind_addr() -> String {
    consts::DEFAULT_BIND_ADDR.to_string()
}

fn default_log_dir() -> String {
    consts::DEFAULT_LOG_DIR.to_string()
}

fn default_tick_period_ms() -> u64 {
    consts::TICK_PERIOD_MS
}

/// Network endpoints this process talks to or listens on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// ADC (Modbus-TCP) host.
    pub adc_host: String,
    /// ADC (Modbus-TCP) port.
    #[serde(default = "default_adc_port")]
    pub adc_port: u16,
    /// Observer HTTP/WebSocket bind address.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

/// Expected serial numbers for the two role slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceIdentityConfig {
    /// Expected serial number of the slot-0 controller (motors, limit switches).
    pub slot0_serial: String,
    /// Expected serial number of the slot-1 controller (reserved role).
    pub slot1_serial: String,
}

/// Per-channel calibration tables, one per ADC channel in use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    pub damper_position: [CalibrationTable; 3],
    pub stage_position: [CalibrationTable; 3],
    pub air_pressure: CalibrationTable,
}

fn default_allow_list() -> Vec<String> {
    Vec::new()
}

/// Top-level supervisor configuration, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,
    pub network: NetworkConfig,
    pub identity: DeviceIdentityConfig,
    pub calibration: CalibrationConfig,
    /// Client addresses or hostnames authorized to issue operator commands.
    /// `"*"` authorizes any address.
    #[serde(default = "default_allow_list")]
    pub allow_list: Vec<String>,
}

impl SupervisorConfig {
    /// Validate cross-field invariants not expressible through serde alone.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.adc_host.is_empty() {
            return Err(ConfigError::ValidationError(
                "network.adc_host cannot be empty".to_string(),
            ));
        }
        if self.identity.slot0_serial.is_empty() || self.identity.slot1_serial.is_empty() {
            return Err(ConfigError::ValidationError(
                "identity.slot0_serial and identity.slot1_serial must be set".to_string(),
            ));
        }
        if self.identity.slot0_serial == self.identity.slot1_serial {
            return Err(ConfigError::ValidationError(
                "identity.slot0_serial and identity.slot1_serial must differ".to_string(),
            ));
        }
        if self.tick_period_ms == 0 {
            return Err(ConfigError::ValidationError(
                "tick_period_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns true if `addr` is authorized to issue operator commands.
    pub fn is_authorized(&self, addr: &str) -> bool {
        self.allow_list.iter().any(|a| a == "*" || a == addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calib::CalibrationPoint;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample_table() -> CalibrationTable {
        CalibrationTable::new(vec![
            CalibrationPoint { raw: 0.0, calibrated: 0.0 },
            CalibrationPoint { raw: 1.0, calibrated: 1.0 },
        ])
        .unwrap()
    }

    fn sample_config() -> SupervisorConfig {
        SupervisorConfig {
            log_level: LogLevel::Info,
            log_dir: "/tmp".to_string(),
            tick_period_ms: 80,
            network: NetworkConfig {
                adc_host: "10.0.0.5".to_string(),
                adc_port: 502,
                bind_addr: "0.0.0.0:8080".to_string(),
            },
            identity: DeviceIdentityConfig {
                slot0_serial: "AVR0".to_string(),
                slot1_serial: "AVR1".to_string(),
            },
            calibration: CalibrationConfig {
                damper_position: [sample_table(), sample_table(), sample_table()],
                stage_position: [sample_table(), sample_table(), sample_table()],
                air_pressure: sample_table(),
            },
            allow_list: vec!["127.0.0.1".to_string()],
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn duplicate_slot_serials_rejected() {
        let mut cfg = sample_config();
        cfg.identity.slot1_serial = cfg.identity.slot0_serial.clone();
        assert!(matches!(cfg.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn wildcard_allow_list_authorizes_anyone() {
        let mut cfg = sample_config();
        cfg.allow_list = vec!["*".to_string()];
        assert!(cfg.is_authorized("203.0.113.7"));
    }

    #[test]
    fn non_listed_address_not_authorized() {
        let cfg = sample_config();
        assert!(!cfg.is_authorized("203.0.113.7"));
    }

    #[test]
    fn config_loader_file_not_found() {
        let result = SupervisorConfig::load(Path::new("/nonexistent/supervisor.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn config_loader_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid toml {{{{").unwrap();
        let result = SupervisorConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
