use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::domain::errors::ErrorClass;

/// Main configuration structure for the benchmark client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Base URL of the oracle server API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Maximum number of model turns in the investigation phase
    #[serde(default = "default_msg_limit")]
    pub msg_limit: u32,

    /// Restrict the problem set to a named subset
    #[serde(default)]
    pub subset: Option<String>,

    /// Timeout for oracle requests in seconds
    #[serde(default = "default_oracle_timeout_secs")]
    pub oracle_timeout_secs: u64,

    /// Per-provider settings, keyed by provider name
    #[serde(default = "default_providers")]
    pub providers: BTreeMap<String, ProviderConfig>,

    /// API keys keyed by provider name (normally from credentials.yaml)
    #[serde(default)]
    pub api_keys: BTreeMap<String, String>,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Retry policy for transient provider errors
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_base_url() -> String {
    "http://localhost:3000/api/".to_string()
}

const fn default_msg_limit() -> u32 {
    50
}

const fn default_oracle_timeout_secs() -> u64 {
    60
}

fn default_providers() -> BTreeMap<String, ProviderConfig> {
    let mut providers = BTreeMap::new();
    providers.insert(
        "anthropic".to_string(),
        ProviderConfig::new("claude-3-7-sonnet-20250219"),
    );
    providers.insert("openai".to_string(), ProviderConfig::new("gpt-4o"));
    providers.insert(
        "fireworks".to_string(),
        ProviderConfig::new("accounts/fireworks/models/deepseek-r1"),
    );
    providers.insert("google".to_string(), ProviderConfig::new("gemini-2.5-pro"));
    providers
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            msg_limit: default_msg_limit(),
            subset: None,
            oracle_timeout_secs: default_oracle_timeout_secs(),
            providers: default_providers(),
            api_keys: BTreeMap::new(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Settings of a configured provider.
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// API key for a provider: credentials first, then `<NAME>_API_KEY`.
    pub fn api_key(&self, provider: &str) -> Option<String> {
        self.api_keys
            .get(provider)
            .cloned()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(format!("{}_API_KEY", provider.to_uppercase())).ok())
    }

    /// Credential-free configuration persisted with a run.
    ///
    /// Top-level settings minus `providers` and `api_keys`, with the active
    /// provider's settings merged in at the top level.
    pub fn snapshot(&self, provider: &str) -> Value {
        let mut snapshot = serde_json::Map::new();

        if let Ok(Value::Object(top)) = serde_json::to_value(self) {
            for (key, value) in top {
                if key != "providers" && key != "api_keys" {
                    snapshot.insert(key, value);
                }
            }
        }

        if let Some(Ok(Value::Object(settings))) = self.provider(provider).map(serde_json::to_value) {
            snapshot.extend(settings);
        }

        snapshot.insert("provider".to_string(), Value::String(provider.to_string()));
        Value::Object(snapshot)
    }

    /// Overlay a stored snapshot onto this configuration.
    ///
    /// Keys naming a top-level setting replace it; keys naming a provider
    /// setting replace that setting for `provider`. Credentials are never
    /// read from the snapshot and unknown keys are ignored.
    pub fn restore_snapshot(&mut self, provider: &str, snapshot: &Value) -> Result<(), serde_json::Error> {
        let Value::Object(stored) = snapshot else {
            return Ok(());
        };

        let Value::Object(mut top) = serde_json::to_value(&*self)? else {
            return Ok(());
        };
        let mut settings = match self.provider(provider) {
            Some(existing) => serde_json::to_value(existing)?,
            None => Value::Object(serde_json::Map::new()),
        };

        for (key, value) in stored {
            if key == "providers" || key == "api_keys" || key == "provider" {
                continue;
            }
            if top.contains_key(key) {
                top.insert(key.clone(), value.clone());
            } else if let Value::Object(fields) = &mut settings {
                fields.insert(key.clone(), value.clone());
            }
        }

        let mut restored: Config = serde_json::from_value(Value::Object(top))?;
        if settings.get("model").is_some() {
            restored
                .providers
                .insert(provider.to_string(), serde_json::from_value(settings)?);
        }
        restored.api_keys = std::mem::take(&mut self.api_keys);
        *self = restored;
        Ok(())
    }
}

/// Settings for one model provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProviderConfig {
    /// Model identifier sent to the provider
    pub model: String,

    /// Minimum seconds between the end of one model call and the next
    #[serde(default)]
    pub rate_limit_secs: f64,

    /// Override of the provider API base URL
    #[serde(default)]
    pub api_base_url: Option<String>,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Extended-thinking token budget (Anthropic)
    #[serde(default)]
    pub thinking_budget: Option<u32>,

    /// Extra fields merged into every request body
    #[serde(default)]
    pub extra_body: Option<Value>,

    /// Error classes the dispatcher retries
    #[serde(default)]
    pub retry_on: Vec<ErrorClass>,

    /// Request timeout in seconds
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_provider_timeout_secs() -> u64 {
    600
}

impl ProviderConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            rate_limit_secs: 0.0,
            api_base_url: None,
            temperature: None,
            max_tokens: None,
            thinking_budget: None,
            extra_body: None,
            retry_on: Vec::new(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// `SQLite` connection URL
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_url() -> String {
    "sqlite:.sherlockbench/sherlockbench.db".to_string()
}

const fn default_max_connections() -> u32 {
    1
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for daily-rotated log files; stderr only when unset
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    10_000
}

const fn default_max_backoff_ms() -> u64 {
    300_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}
