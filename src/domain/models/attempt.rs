//! Attempt domain model.
//!
//! An attempt is one trial of investigating and verifying a single hidden
//! function. Attempts are created by the oracle and handed to the client in
//! the `start-run` response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// An attempt as issued by the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    #[serde(rename = "attempt-id")]
    pub id: Uuid,

    /// Declared argument types of the mystery function, in positional order
    #[serde(rename = "arg-spec", alias = "fn-args", default)]
    pub arg_spec: Vec<String>,

    /// Number of test calls the oracle will answer, if bounded
    #[serde(rename = "test-limit", default, skip_serializing_if = "Option::is_none")]
    pub test_limit: Option<u32>,

    /// Fields this client does not interpret, kept so snapshots round-trip
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Attempt {
    pub fn new(id: Uuid, arg_spec: Vec<String>) -> Self {
        Self {
            id,
            arg_spec,
            test_limit: None,
            extra: Map::new(),
        }
    }

    pub fn with_test_limit(mut self, limit: u32) -> Self {
        self.test_limit = Some(limit);
        self
    }
}

/// Status of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    #[default]
    Pending,
    Succeeded,
    Failed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn from_verification(passed: bool) -> Self {
        if passed {
            Self::Succeeded
        } else {
            Self::Failed
        }
    }
}

/// The attempt currently being processed, and where it sits in the run.
///
/// Passed explicitly through the orchestrator's per-attempt boundary so the
/// failure handler knows which attempt was in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptScope {
    pub attempt: Attempt,
    /// Index within the run's remaining-attempts list
    pub index: usize,
    pub started: Instant,
}

impl AttemptScope {
    pub fn enter(attempt: Attempt, index: usize) -> Self {
        Self {
            attempt,
            index,
            started: Instant::now(),
        }
    }
}

/// Durable record of a finished attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub run_id: Uuid,
    pub attempt_id: Uuid,
    pub status: AttemptStatus,
    pub elapsed: Duration,
    pub tool_calls: u32,
    /// Model calls consumed by this attempt
    pub api_calls: u64,
    /// Complete console transcript of the attempt
    pub log: String,
    pub completed_at: DateTime<Utc>,
}

impl AttemptRecord {
    pub fn succeeded(&self) -> bool {
        self.status == AttemptStatus::Succeeded
    }
}
