//! Application configuration.
//!
//! Layered: built-in defaults, then an optional TOML file, then
//! `VALIDATE_HSDS_*` environment overrides, then CLI flags. Each layer only
//! touches the knobs it names.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Trait for abstracting environment variable access.
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use.
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("configuration validation error: {0}")]
    Validation(String),

    #[error("environment variable error: {key} = {value} - {reason}")]
    Environment {
        key: String,
        value: String,
        reason: String,
    },
}

impl From<ConfigError> for crate::error::ValidationError {
    fn from(err: ConfigError) -> Self {
        crate::error::ValidationError::Config(err.to_string())
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub validation: ValidationConfig,
    pub network: NetworkConfig,
    pub intake: IntakeConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind, e.g. "127.0.0.1:8080".
    pub bind: String,
    /// Maximum accepted request body size in MB.
    pub max_upload_mb: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            max_upload_mb: 50,
        }
    }
}

/// Validation orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    /// Number of resources validated concurrently within one request.
    pub max_concurrent: usize,
    /// Per-resource validation timeout in seconds.
    pub timeout_seconds: u64,
    /// Cap on diagnostics collected per resource.
    pub max_diagnostics: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_concurrent: num_cpus::get(),
            timeout_seconds: 30,
            max_diagnostics: 1000,
        }
    }
}

/// Remote fetch settings for descriptors and resource data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            max_retry_delay_ms: 30000,
        }
    }
}

/// Archive intake settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IntakeConfig {
    /// Directory for per-request temporaries; system temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
    /// Maximum accepted archive size in MB.
    pub max_archive_mb: u64,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            scratch_dir: None,
            max_archive_mb: 100,
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file, then apply system
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                toml::from_str(&raw)?
            }
            None => Self::default(),
        };
        config.apply_env(&SystemEnvProvider)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `VALIDATE_HSDS_*` environment overrides from the given provider.
    pub fn apply_env(&mut self, env: &dyn EnvProvider) -> Result<(), ConfigError> {
        if let Some(bind) = env.get("VALIDATE_HSDS_BIND") {
            self.server.bind = bind;
        }
        if let Some(value) = env.get("VALIDATE_HSDS_MAX_UPLOAD_MB") {
            self.server.max_upload_mb = parse_env("VALIDATE_HSDS_MAX_UPLOAD_MB", &value)?;
        }
        if let Some(value) = env.get("VALIDATE_HSDS_MAX_CONCURRENT") {
            self.validation.max_concurrent = parse_env("VALIDATE_HSDS_MAX_CONCURRENT", &value)?;
        }
        if let Some(value) = env.get("VALIDATE_HSDS_TIMEOUT_SECONDS") {
            self.validation.timeout_seconds = parse_env("VALIDATE_HSDS_TIMEOUT_SECONDS", &value)?;
        }
        if let Some(dir) = env.get("VALIDATE_HSDS_SCRATCH_DIR") {
            self.intake.scratch_dir = Some(PathBuf::from(dir));
        }
        if let Some(value) = env.get("VALIDATE_HSDS_MAX_ARCHIVE_MB") {
            self.intake.max_archive_mb = parse_env("VALIDATE_HSDS_MAX_ARCHIVE_MB", &value)?;
        }
        Ok(())
    }

    /// Reject configurations that cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "server.bind '{}' is not a socket address",
                self.server.bind
            )));
        }
        if self.validation.max_concurrent == 0 {
            return Err(ConfigError::Validation(
                "validation.max_concurrent must be greater than 0".to_string(),
            ));
        }
        if self.validation.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "validation.timeout_seconds must be greater than 0".to_string(),
            ));
        }
        if self.intake.max_archive_mb == 0 {
            return Err(ConfigError::Validation(
                "intake.max_archive_mb must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Environment {
        key: key.to_string(),
        value: value.to_string(),
        reason: "not a valid number".to_string(),
    })
}
