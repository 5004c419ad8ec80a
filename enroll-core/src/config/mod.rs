//! Configuration management for the enrollment client
//!
//! Defaults, a TOML file format and `ENROLL_<SECTION>_<KEY>` environment
//! overrides, validated before use.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::core_identity::DeviceType;

mod error;

pub use error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub identity_service: IdentityServiceConfig,
    pub store: StoreConfig,
    pub provisioning: ProvisioningConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// Where and how to reach the identity service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityServiceConfig {
    /// Service endpoint; `loopback` selects the in-process service
    pub endpoint: String,

    /// Upper bound for a single request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

/// Local persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the persisted user config
    pub data_dir: PathBuf,

    /// File name of the active-device config inside `data_dir`
    pub user_config_file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningConfig {
    pub default_device_type: DeviceType,

    /// Per-step bound on network suspension points (push, refresh, sync)
    #[serde(with = "humantime_serde")]
    pub step_timeout: Option<Duration>,

    /// Download secrets for offline login after a successful switch
    pub sync_secrets_after_switch: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include timestamps
    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for IdentityServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: "loopback".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            user_config_file: "config.json".to_string(),
        }
    }
}

impl StoreConfig {
    pub fn user_config_path(&self) -> PathBuf {
        self.data_dir.join(&self.user_config_file)
    }
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            default_device_type: DeviceType::Desktop,
            step_timeout: Some(Duration::from_secs(60)),
            sync_secrets_after_switch: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn env_error(var: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidEnv {
        var: var.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map(Some).map_err(|e| env_error(name, e)),
        Err(_) => Ok(None),
    }
}

fn parse_duration_var(name: &str) -> Result<Option<Duration>, ConfigError> {
    match env::var(name) {
        Ok(raw) => humantime_serde::re::humantime::parse_duration(raw.trim())
            .map(Some)
            .map_err(|e| env_error(name, e)),
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: ENROLL_<SECTION>_<KEY>
    /// Example: ENROLL_STORE_DATA_DIR=/var/lib/enroll
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `ENROLL_*` variables onto this configuration
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(endpoint) = env::var("ENROLL_IDENTITY_SERVICE_ENDPOINT") {
            self.identity_service.endpoint = endpoint;
        }
        if let Some(timeout) = parse_duration_var("ENROLL_IDENTITY_SERVICE_REQUEST_TIMEOUT")? {
            self.identity_service.request_timeout = timeout;
        }

        if let Ok(data_dir) = env::var("ENROLL_STORE_DATA_DIR") {
            self.store.data_dir = PathBuf::from(data_dir);
        }
        if let Ok(file) = env::var("ENROLL_STORE_USER_CONFIG_FILE") {
            self.store.user_config_file = file;
        }

        if let Some(device_type) = parse_var::<DeviceType>("ENROLL_PROVISIONING_DEFAULT_DEVICE_TYPE")? {
            self.provisioning.default_device_type = device_type;
        }
        if let Some(timeout) = parse_duration_var("ENROLL_PROVISIONING_STEP_TIMEOUT")? {
            self.provisioning.step_timeout = Some(timeout);
        }
        if let Some(sync) = parse_var::<bool>("ENROLL_PROVISIONING_SYNC_SECRETS_AFTER_SWITCH")? {
            self.provisioning.sync_secrets_after_switch = sync;
        }

        if let Ok(level) = env::var("ENROLL_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = parse_var::<bool>("ENROLL_LOG_JSON")? {
            self.logging.json_format = json;
        }

        if let Some(enabled) = parse_var::<bool>("ENROLL_METRICS_ENABLED")? {
            self.metrics.enabled = enabled;
        }

        Ok(())
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&contents)?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identity_service.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "identity_service.endpoint must not be empty".to_string(),
            ));
        }
        if self.identity_service.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        let file = self.store.user_config_file.trim();
        if file.is_empty() || file.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(format!(
                "Invalid user config file name: '{}'",
                self.store.user_config_file
            )));
        }

        if self.provisioning.step_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::Invalid(
                "step_timeout must be greater than 0".to_string(),
            ));
        }

        if self.logging.level.parse::<crate::logging::LogLevel>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
