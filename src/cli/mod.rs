//! Command-line interface.

pub mod commands;
pub mod display;
pub mod output;
pub mod types;

pub use types::{Cli, ResumeArg};
