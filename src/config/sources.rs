use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::{Path, PathBuf};

const CONFIG_ENV_VAR: &str = "HERALD_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/herald.toml";
const ENV_PREFIX: &str = "HERALD";
const ENV_SEPARATOR: &str = "__";

const JWT_SECRET_VAR: &str = "JWT_SECRET";
const DOMAIN_SECRET_VAR: &str = "DOMAIN_SECRET";

/// Load configuration with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(&config_path)?;
    load_secrets(&mut config);
    Ok(config)
}

/// Secrets are never read from TOML, only from the environment
pub fn load_secrets(config: &mut Config) {
    config.secrets.jwt_secret = non_empty_var(JWT_SECRET_VAR);
    config.secrets.domain_secret = non_empty_var(DOMAIN_SECRET_VAR);
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Load configuration from a specific path plus `HERALD__*` overrides
pub fn load_from_sources(config_path: &Path) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!(path = %config_path.display(), "Loading configuration");
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            path = %config_path.display(),
            "Configuration file not found, using defaults and environment overrides"
        );
    }

    // HERALD__DOWNLOADS__MAX_ATTEMPTS -> downloads.max_attempts
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
