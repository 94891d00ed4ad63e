//! Configuration management for mediarelay
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use mediarelay::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `MEDIARELAY__<section>__<key>`
//!
//! Examples:
//! - `MEDIARELAY__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `MEDIARELAY__EXTRACTOR__MAX_FILESIZE=50MB`
//! - `MEDIARELAY__RETENTION__ARTIFACT_TTL_SECS=600`
//!
//! Remote worker settings are read from `GITHUB_TOKEN`, `GITHUB_REPOSITORY`
//! and `PUBLIC_BASE_URL` (or `SPACE_HOST`). When any of them is missing the
//! relay runs without remote fallback.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/mediarelay.toml`.
//! This can be overridden using the `MEDIARELAY_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    Config, ExtractorConfig, FingerprintConfig, RemoteConfig, RetentionConfig, ServerConfig,
    default_fingerprints,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or validation
    /// fails. Missing remote-worker credentials are not an error.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path, skipping secret lookup
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
