use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "MEDIARELAY_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/mediarelay.toml";
const ENV_PREFIX: &str = "MEDIARELAY";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(config_path)?;
    load_secrets(&mut config, |key| env::var(key).ok());

    Ok(config)
}

/// Fill remote-worker settings from the environment.
///
/// The token is only ever read here. Repository and public URL may also come
/// from the TOML file, in which case the file wins.
pub(crate) fn load_secrets(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(token) = non_empty("GITHUB_TOKEN") {
        config.remote.token = Some(token);
    }

    if config.remote.repository.is_none() {
        config.remote.repository = non_empty("GITHUB_REPOSITORY");
    }

    if config.remote.public_base_url.is_none() {
        config.remote.public_base_url = non_empty("PUBLIC_BASE_URL")
            .or_else(|| non_empty("SPACE_HOST").map(|host| format!("https://{host}")));
    }
}

/// Load configuration from a specific path and environment
/// Useful for testing with custom config files
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // MEDIARELAY__RETENTION__ARTIFACT_TTL_SECS -> retention.artifact_ttl_secs
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}
