//! Failure snapshots persisted when a run stops on an unrecovered error.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error as StdError;
use uuid::Uuid;

use super::attempt::{Attempt, AttemptScope};
use super::run::ResumeMode;
use crate::domain::errors::DomainError;

/// Everything needed to resume a failed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureSnapshot {
    pub error_type: String,
    pub error_message: String,
    /// Rendered error chain
    pub traceback: String,
    pub current_attempt: Option<Attempt>,
    #[serde(default)]
    pub current_attempt_index: Option<usize>,
    /// The run's attempt list at failure time
    #[serde(default)]
    pub all_attempts: Vec<Attempt>,
}

impl FailureSnapshot {
    /// Capture an error together with the in-flight attempt, if any.
    pub fn capture(error: &DomainError, scope: Option<&AttemptScope>, all_attempts: &[Attempt]) -> Self {
        Self {
            error_type: error.kind().to_string(),
            error_message: error.to_string(),
            traceback: render_error_chain(error),
            current_attempt: scope.map(|s| s.attempt.clone()),
            current_attempt_index: scope.map(|s| s.index),
            all_attempts: all_attempts.to_vec(),
        }
    }

    pub fn current_attempt_id(&self) -> Option<Uuid> {
        self.current_attempt.as_ref().map(|a| a.id)
    }

    /// Attempts still to be processed when the run is resumed.
    ///
    /// Already completed attempts are dropped; with [`ResumeMode::Skip`] the
    /// attempt that was in flight is dropped too. Order is preserved.
    pub fn remaining_attempts(&self, completed: &HashSet<Uuid>, mode: ResumeMode) -> Vec<Attempt> {
        let skipped = match mode {
            ResumeMode::Skip => self.current_attempt_id(),
            ResumeMode::Retry => None,
        };

        self.all_attempts
            .iter()
            .filter(|a| !completed.contains(&a.id))
            .filter(|a| Some(a.id) != skipped)
            .cloned()
            .collect()
    }
}

/// Render an error and its sources, one per line.
pub fn render_error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut lines = vec![format!("Error: {error}")];
    let mut source = error.source();
    while let Some(cause) = source {
        lines.push(format!("Caused by: {cause}"));
        source = cause.source();
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::{ErrorClass, ProviderError};

    fn attempts(n: usize) -> Vec<Attempt> {
        (0..n)
            .map(|_| Attempt::new(Uuid::new_v4(), vec!["integer".to_string()]))
            .collect()
    }

    fn snapshot_with_current(all: &[Attempt], current: usize) -> FailureSnapshot {
        let scope = AttemptScope::enter(all[current].clone(), current);
        FailureSnapshot::capture(
            &DomainError::MessageLimitExceeded { limit: 50 },
            Some(&scope),
            all,
        )
    }

    #[test]
    fn test_capture_records_scope() {
        let all = attempts(3);
        let snapshot = snapshot_with_current(&all, 1);
        assert_eq!(snapshot.error_type, "MessageLimitExceeded");
        assert_eq!(snapshot.current_attempt_id(), Some(all[1].id));
        assert_eq!(snapshot.current_attempt_index, Some(1));
        assert_eq!(snapshot.all_attempts.len(), 3);
    }

    #[test]
    fn test_capture_without_scope() {
        let err: DomainError = ProviderError::new("openai", ErrorClass::Network, "reset").into();
        let snapshot = FailureSnapshot::capture(&err, None, &[]);
        assert!(snapshot.current_attempt.is_none());
        assert!(snapshot.traceback.starts_with("Error: openai request failed"));
    }

    #[test]
    fn test_remaining_attempts_skip() {
        let all = attempts(4);
        let snapshot = snapshot_with_current(&all, 2);
        let completed: HashSet<Uuid> = [all[0].id, all[1].id].into_iter().collect();

        let remaining = snapshot.remaining_attempts(&completed, ResumeMode::Skip);
        assert_eq!(remaining, vec![all[3].clone()]);
    }

    #[test]
    fn test_remaining_attempts_retry() {
        let all = attempts(4);
        let snapshot = snapshot_with_current(&all, 2);
        let completed: HashSet<Uuid> = [all[0].id, all[1].id].into_iter().collect();

        let remaining = snapshot.remaining_attempts(&completed, ResumeMode::Retry);
        assert_eq!(remaining, vec![all[2].clone(), all[3].clone()]);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let all = attempts(1);
        let snapshot = snapshot_with_current(&all, 0);
        let value = serde_json::to_value(&snapshot).unwrap();
        assert!(value.get("error_type").is_some());
        assert!(value.get("traceback").is_some());
        assert_eq!(value["current_attempt"]["attempt-id"], all[0].id.to_string());
        assert_eq!(value["all_attempts"].as_array().unwrap().len(), 1);
    }
}
