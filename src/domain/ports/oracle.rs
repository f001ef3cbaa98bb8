//! Oracle port - interface to the benchmark server.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::errors::OracleError;
use crate::domain::models::{
    Prediction, ProblemSetCatalog, RunCompletion, StartRunRequest, StartedRun, Verdict,
    VerificationCase,
};

/// The benchmark authority that hides the function, answers test calls and
/// judges predictions.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Start a new run, or re-open an existing one.
    async fn start_run(&self, request: &StartRunRequest) -> Result<StartedRun, OracleError>;

    /// Call the hidden function. Returns the oracle's reply as-is; the
    /// function's result is in its `output` field when the call succeeded.
    async fn test_function(
        &self,
        run_id: Uuid,
        attempt_id: Uuid,
        args: &[Value],
    ) -> Result<Value, OracleError>;

    /// Next verification case, or `None` when there are no more.
    async fn next_verification(
        &self,
        run_id: Uuid,
        attempt_id: Uuid,
    ) -> Result<Option<VerificationCase>, OracleError>;

    /// Submit a prediction for the current verification case.
    async fn attempt_verification(
        &self,
        run_id: Uuid,
        attempt_id: Uuid,
        prediction: &Prediction,
    ) -> Result<Verdict, OracleError>;

    /// Finish the run and fetch its score.
    async fn complete_run(&self, run_id: Uuid) -> Result<RunCompletion, OracleError>;

    /// Reset an attempt so it can be run again. Returns whether the oracle
    /// reported success.
    async fn reset_attempt(&self, run_id: Uuid, attempt_id: Uuid) -> Result<bool, OracleError>;

    /// Problem sets available on this oracle.
    async fn problem_sets(&self) -> Result<ProblemSetCatalog, OracleError>;
}
