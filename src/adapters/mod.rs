//! Adapters for the systems the benchmark client talks to.

pub mod oracle;
pub mod providers;
pub mod sqlite;
