//! Run repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AttemptRecord, FailureSnapshot, ProblemName, Run, RunResult};

/// A run record that stopped on an unrecovered error.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedRun {
    pub run: Run,
    pub failure: FailureSnapshot,
}

/// Repository interface for run persistence.
#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Create a new run record.
    async fn create_run(&self, run: &Run) -> DomainResult<()>;

    /// Get a run together with its failure snapshot, if it has one.
    async fn get_failed_run(&self, run_id: Uuid) -> DomainResult<Option<FailedRun>>;

    /// Finished attempts of a run, oldest first.
    async fn list_attempts(&self, run_id: Uuid) -> DomainResult<Vec<AttemptRecord>>;

    /// Record a finished attempt.
    async fn record_attempt(&self, record: &AttemptRecord) -> DomainResult<()>;

    /// Store the failure snapshot of a run.
    async fn save_failure(&self, run_id: Uuid, snapshot: &FailureSnapshot) -> DomainResult<()>;

    /// Record which problem each attempt exercised.
    async fn add_problem_names(&self, names: &[ProblemName]) -> DomainResult<()>;

    /// Store final results and mark the run complete.
    async fn save_result(&self, result: &RunResult) -> DomainResult<()>;
}
