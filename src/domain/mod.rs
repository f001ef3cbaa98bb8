//! Domain layer for the benchmark client
//!
//! This module contains the conversation and run models and the port traits
//! that adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult, ErrorClass, OracleError, ProviderError};
