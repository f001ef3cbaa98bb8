use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid msg_limit: {0}. Must be at least 1")]
    InvalidMsgLimit(u32),

    #[error("Oracle base_url must be an http(s) URL, got '{0}'")]
    InvalidBaseUrl(String),

    #[error("Invalid oracle_timeout_secs: {0}. Must be at least 1")]
    InvalidOracleTimeout(u64),

    #[error("Provider '{0}' has no model configured")]
    MissingModel(String),

    #[error("Invalid rate limit for provider '{0}': {1}. Must be zero or positive")]
    InvalidRateLimit(String, f64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database url cannot be empty")]
    EmptyDatabaseUrl,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must not exceed max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Directory searched by [`ConfigLoader::load`].
    pub const RESOURCES_DIR: &'static str = "resources";

    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. resources/config.yaml
    /// 3. resources/credentials.yaml (API keys)
    /// 4. Environment variables (SHERLOCK_* prefix, `__` separates nesting)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(Self::RESOURCES_DIR)
    }

    /// Load `config.yaml` and `credentials.yaml` from `dir`. Missing files
    /// are skipped.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Config> {
        let dir = dir.as_ref();
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("credentials.yaml")))
            .merge(Env::prefixed("SHERLOCK_").split("__"))
            .extract()
            .with_context(|| format!("Failed to load configuration from {}", dir.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.msg_limit == 0 {
            return Err(ConfigError::InvalidMsgLimit(config.msg_limit));
        }

        if !(config.base_url.starts_with("http://") || config.base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(config.base_url.clone()));
        }

        if config.oracle_timeout_secs == 0 {
            return Err(ConfigError::InvalidOracleTimeout(config.oracle_timeout_secs));
        }

        for (name, provider) in &config.providers {
            if provider.model.trim().is_empty() {
                return Err(ConfigError::MissingModel(name.clone()));
            }
            if !provider.rate_limit_secs.is_finite() || provider.rate_limit_secs < 0.0 {
                return Err(ConfigError::InvalidRateLimit(name.clone(), provider.rate_limit_secs));
            }
        }

        if config.database.url.is_empty() {
            return Err(ConfigError::EmptyDatabaseUrl);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.retry.initial_backoff_ms > config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        Ok(())
    }
}
