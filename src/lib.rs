//! SherlockBench client
//!
//! Drives an LLM through the SherlockBench benchmark: for each attempt the
//! model first investigates a hidden function by calling it as a tool, then
//! predicts its outputs for inputs chosen by the oracle server.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): transcript, attempt and run models, errors and ports
//! - **Service Layer** (`services`): completion dispatch, the investigation and
//!   verification loops, and the run orchestrator
//! - **Adapters** (`adapters`): model providers, the HTTP oracle and the SQLite run store
//! - **Infrastructure Layer** (`infrastructure`): configuration loading and logging
//! - **CLI Layer** (`cli`): command-line interface

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{DomainError, DomainResult, ErrorClass, OracleError, ProviderError};
pub use domain::models::{
    Attempt, AttemptRecord, Config, FailureSnapshot, Message, NormalizedTurn, ResumeMode,
    RunSummary, Transcript, TurnElement,
};
pub use domain::ports::{ModelProvider, Oracle, RunRepository};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{CompletionDispatcher, RunOrchestrator, RunOutcome, RunRequest};
