//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber. Logs go to
//! stderr so the attempt transcript printed on stdout stays readable, with
//! an optional daily-rotated JSON file.

pub mod logger;

pub use logger::{LogFormat, LoggerImpl};
