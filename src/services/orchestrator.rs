//! Run Orchestrator - lifecycle of one benchmark run.
//!
//! A run is started (or re-opened, or resumed from a stored failure
//! snapshot), its attempts are processed one after another through the
//! investigation and verification loops, and the oracle is finally asked to
//! score it. Any error escaping an attempt is captured in a
//! [`FailureSnapshot`] that a later invocation can resume from.

use chrono::Utc;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::dispatcher::CompletionDispatcher;
use super::investigation::InvestigationLoop;
use super::progress::RunProgress;
use super::prompts::initial_transcript;
use super::transcript_printer::TranscriptPrinter;
use super::verification::VerificationLoop;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Attempt, AttemptRecord, AttemptScope, AttemptStatus, Config, FailureSnapshot, ResumeMode, Run,
    RunResult, RunSummary, RunTarget, StartRunRequest,
};
use crate::domain::ports::{FailedRun, Oracle, RunRepository};

/// What the caller asked to run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub provider: String,
    pub target: RunTarget,
    pub attempts_per_problem: Option<u32>,
    pub resume: Option<ResumeMode>,
}

/// A run ready to have its attempts processed.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRun {
    pub run: Run,
    /// Attempts still to be processed, in order
    pub attempts: Vec<Attempt>,
    /// Model calls already spent by attempts recorded in earlier sessions
    pub prior_api_calls: u64,
    pub resumed: bool,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(RunSummary),
    Failed { run_id: Uuid, snapshot: FailureSnapshot },
}

impl RunOutcome {
    pub fn run_id(&self) -> Uuid {
        match self {
            Self::Completed(summary) => summary.run_id,
            Self::Failed { run_id, .. } => *run_id,
        }
    }
}

pub struct RunOrchestrator {
    oracle: Arc<dyn Oracle>,
    repository: Arc<dyn RunRepository>,
    config: Config,
    show_progress: bool,
    echo: bool,
}

impl RunOrchestrator {
    pub fn new(oracle: Arc<dyn Oracle>, repository: Arc<dyn RunRepository>, config: Config) -> Self {
        Self {
            oracle,
            repository,
            config,
            show_progress: true,
            echo: true,
        }
    }

    /// Suppress the progress line and the console transcript. Attempt logs
    /// are still recorded.
    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self.echo = false;
        self
    }

    /// Effective configuration, including settings restored on resume.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Prepare, build the dispatcher from the effective configuration, then
    /// execute.
    pub async fn run<F>(&mut self, request: &RunRequest, build_dispatcher: F) -> DomainResult<RunOutcome>
    where
        F: FnOnce(&Config) -> DomainResult<CompletionDispatcher>,
    {
        let prepared = self.prepare(request).await?;
        let dispatcher = build_dispatcher(&self.config)?;
        self.execute(prepared, &dispatcher).await
    }

    /// Start a new run, re-open an existing one, or resume a failed one.
    #[instrument(skip(self, request), fields(provider = %request.provider))]
    pub async fn prepare(&mut self, request: &RunRequest) -> DomainResult<PreparedRun> {
        match (&request.target, request.resume) {
            (RunTarget::ProblemSet(_), Some(_)) => Err(DomainError::InvalidArgument(
                "--resume requires a run id".to_string(),
            )),
            (RunTarget::ExistingRun(run_id), Some(mode)) => {
                match self.repository.get_failed_run(*run_id).await? {
                    Some(failed) => self.resume(&request.provider, failed, mode).await,
                    None => {
                        self.announce(format!("\n### SYSTEM: No interrupted run found with id: {run_id}"));
                        self.start(request).await
                    }
                }
            }
            _ => self.start(request).await,
        }
    }

    async fn start(&self, request: &RunRequest) -> DomainResult<PreparedRun> {
        let provider_config = self.config.provider(&request.provider).ok_or_else(|| {
            DomainError::Configuration(format!("no settings for provider '{}'", request.provider))
        })?;
        let model_identifier = format!("{}/{}", request.provider, provider_config.model);

        let (problem_set, existing_run_id) = match &request.target {
            RunTarget::ProblemSet(id) => (Some(id.clone()), None),
            RunTarget::ExistingRun(id) => (None, Some(*id)),
        };

        let started = self
            .oracle
            .start_run(&StartRunRequest {
                client_id: model_identifier.clone(),
                problem_set: problem_set.clone(),
                existing_run_id,
                subset: self.config.subset.clone().filter(|s| !s.is_empty()),
                attempts_per_problem: request.attempts_per_problem,
            })
            .await?;

        self.announce(format!(
            "Starting {} benchmark with run-id: {}",
            started.run_type, started.run_id
        ));

        let mut config = self.config.snapshot(&request.provider);
        if let Value::Object(fields) = &mut config {
            fields.insert("run_type".to_string(), Value::String(started.run_type.clone()));
            fields.insert(
                "benchmark_version".to_string(),
                Value::String(started.benchmark_version.clone()),
            );
        }

        let run = Run {
            id: started.run_id,
            model_identifier,
            problem_set,
            benchmark_version: started.benchmark_version,
            run_type: started.run_type,
            started_at: Utc::now(),
            config,
        };
        self.repository.create_run(&run).await?;
        info!(run_id = %run.id, attempts = started.attempts.len(), "Run started");

        Ok(PreparedRun {
            run,
            attempts: started.attempts,
            prior_api_calls: 0,
            resumed: false,
        })
    }

    async fn resume(&mut self, provider: &str, failed: FailedRun, mode: ResumeMode) -> DomainResult<PreparedRun> {
        let FailedRun { run, failure } = failed;
        self.announce(format!("\n### SYSTEM: Found interrupted run with id: {}", run.id));

        match (failure.current_attempt_id(), mode) {
            (Some(attempt_id), ResumeMode::Retry) => {
                self.announce(format!("\n### SYSTEM: Attempting to reset failed attempt: {attempt_id}"));
                if !self.oracle.reset_attempt(run.id, attempt_id).await? {
                    return Err(DomainError::ResumeResetFailed(attempt_id));
                }
                self.announce(format!("\n### SYSTEM: Successfully reset attempt {attempt_id}"));
            }
            (Some(attempt_id), ResumeMode::Skip) => {
                self.announce(format!("\n### SYSTEM: Will skip failed attempt: {attempt_id}"));
            }
            (None, _) => {
                warn!(run_id = %run.id, "Failure snapshot names no in-flight attempt");
                self.announce(
                    "\n### SYSTEM WARNING: Could not find which attempt failed, will continue from where we left off.",
                );
            }
        }

        self.config
            .restore_snapshot(provider, &run.config)
            .map_err(|e| DomainError::Configuration(format!("stored run config is unusable: {e}")))?;

        if failure.all_attempts.is_empty() {
            return Err(DomainError::ResumeUnavailable {
                run_id: run.id,
                reason: "the failure snapshot has no attempt list".to_string(),
            });
        }

        let recorded = self.repository.list_attempts(run.id).await?;
        let completed: HashSet<Uuid> = recorded.iter().map(|r| r.attempt_id).collect();
        let prior_api_calls: u64 = recorded.iter().map(|r| r.api_calls).sum();
        let attempts = failure.remaining_attempts(&completed, mode);

        self.announce(format!("Resuming {} benchmark with run-id: {}", run.run_type, run.id));
        if let Some(index) = failure.current_attempt_index {
            self.announce(format!(
                "Failed at attempt index {index} of {}",
                failure.all_attempts.len()
            ));
        }
        self.announce(format!("Found {} completed attempts", recorded.len()));
        self.announce(format!("Remaining attempts to process: {}", attempts.len()));
        info!(run_id = %run.id, mode = mode.as_str(), remaining = attempts.len(), "Resuming run");

        Ok(PreparedRun {
            run,
            attempts,
            prior_api_calls,
            resumed: true,
        })
    }

    /// Process every attempt, then complete the run.
    ///
    /// Errors escaping an attempt or the completion step are snapshotted and
    /// returned as [`RunOutcome::Failed`].
    #[instrument(skip(self, prepared, dispatcher), fields(run_id = %prepared.run.id))]
    pub async fn execute(&self, prepared: PreparedRun, dispatcher: &CompletionDispatcher) -> DomainResult<RunOutcome> {
        let session_start = Utc::now();
        let run_id = prepared.run.id;
        let progress = if self.show_progress {
            RunProgress::new(prepared.attempts.len())
        } else {
            RunProgress::hidden(prepared.attempts.len())
        };

        for (index, attempt) in prepared.attempts.iter().enumerate() {
            progress.start_attempt(index + 1);
            let scope = AttemptScope::enter(attempt.clone(), index);

            if let Err(err) = self.process_attempt(run_id, &scope, dispatcher).await {
                progress.finish();
                return Ok(self.fail(run_id, &err, Some(&scope), &prepared.attempts).await);
            }
        }
        progress.finish();

        match self.complete(&prepared, dispatcher, session_start).await {
            Ok(summary) => Ok(RunOutcome::Completed(summary)),
            Err(err) => Ok(self.fail(run_id, &err, None, &prepared.attempts).await),
        }
    }

    #[instrument(skip(self, scope, dispatcher), fields(attempt_id = %scope.attempt.id, index = scope.index))]
    async fn process_attempt(
        &self,
        run_id: Uuid,
        scope: &AttemptScope,
        dispatcher: &CompletionDispatcher,
    ) -> DomainResult<AttemptRecord> {
        let attempt = &scope.attempt;
        let start_api_calls = dispatcher.total_call_count();
        let mut printer = if self.echo {
            TranscriptPrinter::new()
        } else {
            TranscriptPrinter::silent()
        };
        let arg_spec = Value::from(attempt.arg_spec.clone());

        printer.print(format!("\n### SYSTEM: interrogating function with args {arg_spec}"));
        let investigation = InvestigationLoop::new(self.oracle.as_ref(), dispatcher, self.config.msg_limit)
            .run(run_id, attempt, initial_transcript(attempt.test_limit), &mut printer)
            .await?;

        printer.print(format!("\n### SYSTEM: verifying function with args {arg_spec}"));
        let passed = VerificationLoop::new(self.oracle.as_ref(), dispatcher)
            .run(run_id, attempt, &investigation.transcript, &mut printer)
            .await?;

        let record = AttemptRecord {
            run_id,
            attempt_id: attempt.id,
            status: AttemptStatus::from_verification(passed),
            elapsed: scope.started.elapsed(),
            tool_calls: investigation.tool_calls,
            api_calls: dispatcher.total_call_count() - start_api_calls,
            log: printer.into_log(),
            completed_at: Utc::now(),
        };
        self.repository.record_attempt(&record).await?;
        info!(
            status = record.status.as_str(),
            tool_calls = record.tool_calls,
            api_calls = record.api_calls,
            "Attempt recorded"
        );

        Ok(record)
    }

    async fn complete(
        &self,
        prepared: &PreparedRun,
        dispatcher: &CompletionDispatcher,
        session_start: chrono::DateTime<Utc>,
    ) -> DomainResult<RunSummary> {
        let run_id = prepared.run.id;
        let completion = self.oracle.complete_run(run_id).await?;
        self.repository.add_problem_names(&completion.problem_names).await?;

        let total_api_calls = prepared.prior_api_calls + dispatcher.total_call_count();
        self.repository
            .save_result(&RunResult {
                run_id,
                started_at: session_start,
                finished_at: Utc::now(),
                score: completion.score,
                percent: completion.percent,
                total_api_calls,
            })
            .await?;

        info!(
            numerator = completion.score.numerator,
            denominator = completion.score.denominator,
            total_api_calls,
            "Run complete"
        );

        let run_time = match completion.run_time {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        };

        Ok(RunSummary {
            run_id,
            model_identifier: prepared.run.model_identifier.clone(),
            run_time,
            score: completion.score,
            percent: completion.percent,
            total_api_calls,
        })
    }

    /// Snapshot an escaped error. Failing to persist the snapshot is logged;
    /// the run is reported as failed either way.
    async fn fail(
        &self,
        run_id: Uuid,
        err: &DomainError,
        scope: Option<&AttemptScope>,
        attempts: &[Attempt],
    ) -> RunOutcome {
        error!(run_id = %run_id, error_type = err.kind(), error = %err, "Run failed");

        let snapshot = FailureSnapshot::capture(err, scope, attempts);
        if let Err(save_err) = self.repository.save_failure(run_id, &snapshot).await {
            error!(run_id = %run_id, error = %save_err, "Failed to save failure information");
        }

        RunOutcome::Failed { run_id, snapshot }
    }

    fn announce(&self, message: impl AsRef<str>) {
        if self.echo {
            println!("{}", message.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::oracle::MockOracle;
    use crate::adapters::providers::mock::{MockProvider, MockTurn};
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteRunRepository};
    use crate::domain::models::{Score, Verdict, VerificationCase};
    use serde_json::json;
    use std::time::Duration;

    fn request(target: RunTarget) -> RunRequest {
        RunRequest {
            provider: "anthropic".to_string(),
            target,
            attempts_per_problem: None,
            resume: None,
        }
    }

    async fn repository() -> Arc<SqliteRunRepository> {
        Arc::new(SqliteRunRepository::new(create_migrated_test_pool().await.unwrap()))
    }

    #[tokio::test]
    async fn test_single_attempt_run_completes() {
        let attempt = Attempt::new(Uuid::new_v4(), vec!["integer".to_string()]);
        let oracle = Arc::new(MockOracle::new(vec![attempt.clone()]));
        oracle
            .script_verification(
                attempt.id,
                vec![(
                    VerificationCase {
                        inputs: vec![json!(4)],
                        output_type: "integer".to_string(),
                    },
                    Verdict::Done,
                )],
            )
            .await;
        let provider = Arc::new(MockProvider::new(vec![
            MockTurn::new()
                .tool_call("t1", json!({"a": 1}))
                .with_latency(Duration::from_millis(20)),
            MockTurn::new().text("It doubles.").with_latency(Duration::from_millis(20)),
            MockTurn::new()
                .text(r#"{"thoughts": "double", "expected_output": 8}"#)
                .with_latency(Duration::from_millis(20)),
        ]));
        let repo = repository().await;

        let mut orchestrator = RunOrchestrator::new(oracle.clone(), repo.clone(), Config::default()).quiet();
        let outcome = orchestrator
            .run(&request(RunTarget::ProblemSet("easy3".to_string())), |_| {
                Ok(CompletionDispatcher::new(provider.clone(), Duration::ZERO))
            })
            .await
            .unwrap();

        let RunOutcome::Completed(summary) = outcome else {
            panic!("expected a completed run");
        };
        assert_eq!(summary.score, Score { numerator: 1, denominator: 1 });
        assert_eq!(summary.total_api_calls, 3);
        assert_eq!(summary.model_identifier, "anthropic/claude-3-7-sonnet-20250219");

        let records = repo.list_attempts(summary.run_id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].succeeded());
        assert_eq!(records[0].tool_calls, 1);
        assert!(records[0].elapsed >= Duration::from_millis(60));
        assert!(records[0].log.contains("interrogating function with args"));
    }

    #[tokio::test]
    async fn test_resume_flag_requires_run_id() {
        let oracle = Arc::new(MockOracle::new(vec![]));
        let mut orchestrator = RunOrchestrator::new(oracle, repository().await, Config::default()).quiet();

        let mut req = request(RunTarget::ProblemSet("easy3".to_string()));
        req.resume = Some(ResumeMode::Skip);
        let err = orchestrator.prepare(&req).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_unknown_provider_is_a_configuration_error() {
        let oracle = Arc::new(MockOracle::new(vec![]));
        let mut orchestrator = RunOrchestrator::new(oracle, repository().await, Config::default()).quiet();

        let mut req = request(RunTarget::ProblemSet("easy3".to_string()));
        req.provider = "nobody".to_string();
        let err = orchestrator.prepare(&req).await.unwrap_err();
        assert!(matches!(err, DomainError::Configuration(_)));
    }
}
