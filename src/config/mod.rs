//! Configuration management for herald
//!
//! Both services read the same layered configuration:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. `.env` file
//! 4. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use herald::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Downloads service listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Settings are overridden with `HERALD__<section>__<key>`:
//! - `HERALD__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `HERALD__DOWNLOADS__ORDERING=fifo`
//! - `HERALD__SERVER__API__MAX_PAYLOAD_BYTES=2MB`
//!
//! Secrets come only from `JWT_SECRET` and `DOMAIN_SECRET`.
//!
//! # Configuration File
//!
//! Loaded from `config/herald.toml` unless `HERALD_CONFIG` points elsewhere.

mod models;
mod size;
mod sources;
mod validation;

pub use models::{
    ApiLimits, Config, DownloadsConfig, EventsConfig, Secrets, ServerConfig, StorageConfig,
    StorageProvider,
};
pub use size::{ByteSize, ParseSizeError};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Missing secret: {0} is not set")]
    MissingSecret(&'static str),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or a
    /// validation rule fails. Missing secrets are not an error here.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path, secrets from the environment
    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let mut config = sources::load_from_sources(path.as_ref())?;
        sources::load_secrets(&mut config);
        validation::validate(&config)?;
        Ok(config)
    }

    /// Secret for event payload signatures and private event reads
    pub fn jwt_secret(&self) -> Result<&str, ConfigError> {
        self.secrets
            .jwt_secret
            .as_deref()
            .ok_or(ConfigError::MissingSecret("JWT_SECRET"))
    }

    /// Secret for cluster tokens on download batches
    pub fn domain_secret(&self) -> Result<&str, ConfigError> {
        self.secrets
            .domain_secret
            .as_deref()
            .ok_or(ConfigError::MissingSecret("DOMAIN_SECRET"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("herald.toml");
        fs::write(&config_path, "[downloads]\nmax_attempts = 2\n").unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.downloads.max_attempts, 2);
        assert_eq!(config.downloads.retry_backoff_ms, 500);
    }

    #[test]
    fn test_validation_runs_on_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("herald.toml");
        fs::write(&config_path, "[downloads]\nmax_attempts = 0\n").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result,
            Err(ConfigError::ValidationError(ValidationError::NoAttempts))
        ));
    }

    #[test]
    fn test_missing_secret_is_reported_on_access() {
        let config = Config::default();
        assert!(matches!(
            config.domain_secret(),
            Err(ConfigError::MissingSecret("DOMAIN_SECRET"))
        ));

        let config = Config {
            secrets: Secrets {
                jwt_secret: Some("s3cret".to_string()),
                domain_secret: None,
            },
            ..Config::default()
        };
        assert_eq!(config.jwt_secret().unwrap(), "s3cret");
    }
}
