//! Common test utilities for integration tests
//!
//! Provides shared fixtures used across the integration test files.

#![allow(dead_code)]

use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

use sherlockbench::adapters::sqlite::{create_migrated_test_pool, SqliteRunRepository};
use sherlockbench::domain::models::{Attempt, Verdict, VerificationCase};

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Attempt with fresh id and the given argument types.
pub fn attempt(arg_types: &[&str]) -> Attempt {
    Attempt::new(
        Uuid::new_v4(),
        arg_types.iter().map(|t| (*t).to_string()).collect(),
    )
}

pub fn case(inputs: Vec<Value>, output_type: &str) -> VerificationCase {
    VerificationCase {
        inputs,
        output_type: output_type.to_string(),
    }
}

/// Verification script of `verdicts.len()` integer cases.
pub fn integer_cases(verdicts: &[Verdict]) -> Vec<(VerificationCase, Verdict)> {
    verdicts
        .iter()
        .enumerate()
        .map(|(i, verdict)| (case(vec![Value::from(i as i64)], "integer"), verdict.clone()))
        .collect()
}

/// Prediction text as a model would answer it.
pub fn prediction_json(expected: Value) -> String {
    serde_json::json!({"thoughts": "following the pattern", "expected_output": expected}).to_string()
}

/// Run repository over an in-memory store with migrations applied.
pub async fn repository() -> Arc<SqliteRunRepository> {
    let pool = create_migrated_test_pool()
        .await
        .expect("Failed to create test pool");
    Arc::new(SqliteRunRepository::new(pool))
}
