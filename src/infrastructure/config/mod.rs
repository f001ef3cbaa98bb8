//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - YAML file loading (settings and credentials)
//! - Environment variable overrides
//! - Configuration validation

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
