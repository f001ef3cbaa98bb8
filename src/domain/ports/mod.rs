//! Port trait definitions (Hexagonal Architecture)
//!
//! - ModelProvider: LLM provider calls and response normalization
//! - Oracle: benchmark server operations
//! - RunRepository: durable run and attempt records

pub mod model_provider;
pub mod oracle;
pub mod run_repository;

pub use model_provider::ModelProvider;
pub use oracle::Oracle;
pub use run_repository::{FailedRun, RunRepository};
