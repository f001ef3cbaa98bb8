//! Scripted in-memory oracle for tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::OracleError;
use crate::domain::models::{
    Attempt, Prediction, ProblemName, ProblemSetCatalog, RunCompletion, Score, StartRunRequest,
    StartedRun, Verdict, VerificationCase,
};
use crate::domain::ports::Oracle;

type HiddenFunction = dyn Fn(&[Value]) -> Value + Send + Sync;

/// One call received by the mock, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleCall {
    StartRun(StartRunRequest),
    TestFunction { attempt_id: Uuid, args: Vec<Value> },
    NextVerification { attempt_id: Uuid },
    AttemptVerification { attempt_id: Uuid, prediction: Value },
    CompleteRun { run_id: Uuid },
    ResetAttempt { attempt_id: Uuid },
    ProblemSets,
}

#[derive(Default)]
struct MockOracleState {
    calls: Vec<OracleCall>,
    cases: HashMap<Uuid, VecDeque<(VerificationCase, Verdict)>>,
    outcomes: HashMap<Uuid, bool>,
    failing: HashSet<Uuid>,
}

/// Oracle that hides a Rust closure and judges predictions from a script.
///
/// Each attempt gets a queue of `(case, verdict)` pairs. `next_verification`
/// peeks the head of the queue and `attempt_verification` pops it, returning
/// the scripted verdict regardless of the prediction.
#[derive(Clone)]
pub struct MockOracle {
    run_id: Uuid,
    attempts: Vec<Attempt>,
    function: Arc<HiddenFunction>,
    reset_succeeds: bool,
    catalog: ProblemSetCatalog,
    state: Arc<RwLock<MockOracleState>>,
}

impl MockOracle {
    pub fn new(attempts: Vec<Attempt>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            attempts,
            function: Arc::new(|args: &[Value]| json!({"output": args})),
            reset_succeeds: true,
            catalog: ProblemSetCatalog::default(),
            state: Arc::new(RwLock::new(MockOracleState::default())),
        }
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    /// Hidden function answering `test-function`. The closure returns the
    /// whole reply, so `{"output": ...}` on success.
    pub fn with_function<F>(mut self, function: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        self.function = Arc::new(function);
        self
    }

    pub fn with_reset_result(mut self, succeeds: bool) -> Self {
        self.reset_succeeds = succeeds;
        self
    }

    pub fn with_catalog(mut self, catalog: ProblemSetCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Script the verification phase of one attempt.
    pub async fn script_verification(&self, attempt_id: Uuid, cases: Vec<(VerificationCase, Verdict)>) {
        let mut state = self.state.write().await;
        state.cases.insert(attempt_id, cases.into_iter().collect());
    }

    /// Make every `test-function` call for this attempt fail with HTTP 500.
    pub async fn fail_attempt(&self, attempt_id: Uuid) {
        self.state.write().await.failing.insert(attempt_id);
    }

    pub async fn heal_attempt(&self, attempt_id: Uuid) {
        self.state.write().await.failing.remove(&attempt_id);
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub async fn calls(&self) -> Vec<OracleCall> {
        self.state.read().await.calls.clone()
    }

    pub async fn test_calls_for(&self, attempt_id: Uuid) -> usize {
        self.state
            .read()
            .await
            .calls
            .iter()
            .filter(|c| matches!(c, OracleCall::TestFunction { attempt_id: id, .. } if *id == attempt_id))
            .count()
    }

    async fn record(&self, call: OracleCall) {
        self.state.write().await.calls.push(call);
    }
}

#[async_trait]
impl Oracle for MockOracle {
    async fn start_run(&self, request: &StartRunRequest) -> Result<StartedRun, OracleError> {
        self.record(OracleCall::StartRun(request.clone())).await;
        Ok(StartedRun {
            run_id: request.existing_run_id.unwrap_or(self.run_id),
            run_type: "api".to_string(),
            benchmark_version: "test".to_string(),
            attempts: self.attempts.clone(),
        })
    }

    async fn test_function(
        &self,
        _run_id: Uuid,
        attempt_id: Uuid,
        args: &[Value],
    ) -> Result<Value, OracleError> {
        self.record(OracleCall::TestFunction {
            attempt_id,
            args: args.to_vec(),
        })
        .await;

        if self.state.read().await.failing.contains(&attempt_id) {
            return Err(OracleError::Status {
                operation: "test-function".to_string(),
                status: 500,
                body: "internal error".to_string(),
            });
        }
        Ok((self.function)(args))
    }

    async fn next_verification(
        &self,
        _run_id: Uuid,
        attempt_id: Uuid,
    ) -> Result<Option<VerificationCase>, OracleError> {
        self.record(OracleCall::NextVerification { attempt_id }).await;

        let mut state = self.state.write().await;
        let next = state
            .cases
            .get(&attempt_id)
            .and_then(|queue| queue.front())
            .map(|(case, _)| case.clone());
        if next.is_none() {
            state.outcomes.entry(attempt_id).or_insert(true);
        }
        Ok(next)
    }

    async fn attempt_verification(
        &self,
        _run_id: Uuid,
        attempt_id: Uuid,
        prediction: &Prediction,
    ) -> Result<Verdict, OracleError> {
        self.record(OracleCall::AttemptVerification {
            attempt_id,
            prediction: prediction.expected_output.clone(),
        })
        .await;

        let mut state = self.state.write().await;
        let (_, verdict) = state
            .cases
            .get_mut(&attempt_id)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| OracleError::Status {
                operation: "attempt-verification".to_string(),
                status: 400,
                body: "no verification in progress".to_string(),
            })?;

        match verdict {
            Verdict::Wrong => {
                state.outcomes.insert(attempt_id, false);
            }
            Verdict::Done => {
                state.outcomes.insert(attempt_id, true);
            }
            _ => {}
        }
        Ok(verdict)
    }

    async fn complete_run(&self, run_id: Uuid) -> Result<RunCompletion, OracleError> {
        self.record(OracleCall::CompleteRun { run_id }).await;

        let state = self.state.read().await;
        let numerator = state.outcomes.values().filter(|passed| **passed).count() as u32;
        let denominator = self.attempts.len() as u32;
        let percent = if denominator == 0 {
            0.0
        } else {
            f64::from(numerator) / f64::from(denominator) * 100.0
        };

        Ok(RunCompletion {
            run_time: json!("0:00:01"),
            score: Score {
                numerator,
                denominator,
            },
            percent,
            problem_names: self
                .attempts
                .iter()
                .enumerate()
                .map(|(i, a)| ProblemName {
                    attempt_id: a.id,
                    name: format!("problem-{}", i + 1),
                })
                .collect(),
        })
    }

    async fn reset_attempt(&self, _run_id: Uuid, attempt_id: Uuid) -> Result<bool, OracleError> {
        self.record(OracleCall::ResetAttempt { attempt_id }).await;
        if self.reset_succeeds {
            self.state.write().await.outcomes.remove(&attempt_id);
        }
        Ok(self.reset_succeeds)
    }

    async fn problem_sets(&self) -> Result<ProblemSetCatalog, OracleError> {
        self.record(OracleCall::ProblemSets).await;
        Ok(self.catalog.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(inputs: Vec<Value>) -> VerificationCase {
        VerificationCase {
            inputs,
            output_type: "integer".to_string(),
        }
    }

    #[tokio::test]
    async fn test_hidden_function_and_recording() {
        let attempt = Attempt::new(Uuid::new_v4(), vec!["integer".to_string(); 2]);
        let oracle = MockOracle::new(vec![attempt.clone()]).with_function(|args: &[Value]| {
            let sum: i64 = args.iter().filter_map(Value::as_i64).sum();
            json!({"output": sum})
        });

        let reply = oracle
            .test_function(oracle.run_id(), attempt.id, &[json!(2), json!(3)])
            .await
            .unwrap();
        assert_eq!(reply, json!({"output": 5}));
        assert_eq!(oracle.test_calls_for(attempt.id).await, 1);
    }

    #[tokio::test]
    async fn test_verification_script_and_score() {
        let first = Attempt::new(Uuid::new_v4(), vec![]);
        let second = Attempt::new(Uuid::new_v4(), vec![]);
        let oracle = MockOracle::new(vec![first.clone(), second.clone()]);
        oracle
            .script_verification(first.id, vec![(case(vec![json!(1)]), Verdict::Done)])
            .await;
        oracle
            .script_verification(second.id, vec![(case(vec![json!(2)]), Verdict::Wrong)])
            .await;

        let run_id = oracle.run_id();
        assert!(oracle.next_verification(run_id, first.id).await.unwrap().is_some());
        let verdict = oracle
            .attempt_verification(run_id, first.id, &Prediction::empty())
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Done);

        oracle.next_verification(run_id, second.id).await.unwrap();
        oracle
            .attempt_verification(run_id, second.id, &Prediction::empty())
            .await
            .unwrap();

        let completion = oracle.complete_run(run_id).await.unwrap();
        assert_eq!(completion.score, Score { numerator: 1, denominator: 2 });
        assert_eq!(completion.problem_names.len(), 2);
    }

    #[tokio::test]
    async fn test_failing_attempt() {
        let attempt = Attempt::new(Uuid::new_v4(), vec![]);
        let oracle = MockOracle::new(vec![attempt.clone()]);
        oracle.fail_attempt(attempt.id).await;
        assert!(oracle.test_function(oracle.run_id(), attempt.id, &[]).await.is_err());

        oracle.heal_attempt(attempt.id).await;
        assert!(oracle.test_function(oracle.run_id(), attempt.id, &[]).await.is_ok());
    }
}
