use super::models::{Config, StorageProvider};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("downloads.max_attempts must be at least 1")]
    NoAttempts,

    #[error("downloads.user_agent must not be empty")]
    EmptyUserAgent,

    #[error("{field} must be positive")]
    ZeroTimeout { field: &'static str },

    #[error("server.api.{field} must be positive")]
    ZeroLimit { field: &'static str },

    #[error("storage.root must be set for the local provider")]
    MissingStorageRoot,
}

pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_downloads(config)?;
    validate_timeouts(config)?;
    validate_api_limits(config)?;
    validate_storage(config)?;
    Ok(())
}

fn validate_downloads(config: &Config) -> Result<(), ValidationError> {
    if config.downloads.max_attempts == 0 {
        return Err(ValidationError::NoAttempts);
    }
    if config.downloads.user_agent.trim().is_empty() {
        return Err(ValidationError::EmptyUserAgent);
    }
    Ok(())
}

fn validate_timeouts(config: &Config) -> Result<(), ValidationError> {
    let timeouts = [
        ("downloads.connect_timeout_secs", config.downloads.connect_timeout_secs),
        ("downloads.request_timeout_secs", config.downloads.request_timeout_secs),
        ("downloads.listener_write_timeout_ms", config.downloads.listener_write_timeout_ms),
        ("events.listener_write_timeout_ms", config.events.listener_write_timeout_ms),
    ];

    match timeouts.into_iter().find(|&(_, value)| value == 0) {
        Some((field, _)) => Err(ValidationError::ZeroTimeout { field }),
        None => Ok(()),
    }
}

fn validate_api_limits(config: &Config) -> Result<(), ValidationError> {
    if config.server.api.max_urls_per_batch == 0 {
        return Err(ValidationError::ZeroLimit {
            field: "max_urls_per_batch",
        });
    }
    if config.server.api.max_payload_bytes.as_u64() == 0 {
        return Err(ValidationError::ZeroLimit {
            field: "max_payload_bytes",
        });
    }
    Ok(())
}

fn validate_storage(config: &Config) -> Result<(), ValidationError> {
    if config.storage.provider == StorageProvider::Local
        && config.storage.root.as_os_str().is_empty()
    {
        return Err(ValidationError::MissingStorageRoot);
    }
    Ok(())
}
