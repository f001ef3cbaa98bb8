//! Run domain model.
//!
//! A run is an ordered collection of attempts executed under one
//! configuration against one problem set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::attempt::Attempt;
use crate::domain::errors::{DomainError, DomainResult};

/// How to treat the attempt that was in flight when a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResumeMode {
    /// Leave the failed attempt out of the resumed run
    Skip,
    /// Ask the oracle to reset the failed attempt, then run it again
    Retry,
}

impl ResumeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Retry => "retry",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "skip" => Some(Self::Skip),
            "retry" => Some(Self::Retry),
            _ => None,
        }
    }
}

/// What the positional CLI argument refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunTarget {
    /// Start a new run on this problem set
    ProblemSet(String),
    /// Continue an existing run
    ExistingRun(Uuid),
}

impl RunTarget {
    /// A hyphenated UUID is an existing run; anything else is a problem-set id.
    pub fn parse(arg: &str) -> DomainResult<Self> {
        let arg = arg.trim();
        if arg.is_empty() {
            return Err(DomainError::InvalidArgument(
                "a problem-set id or run id is required".to_string(),
            ));
        }

        if is_hyphenated_uuid(arg) {
            if let Ok(id) = Uuid::parse_str(arg) {
                return Ok(Self::ExistingRun(id));
            }
        }
        Ok(Self::ProblemSet(arg.to_string()))
    }

    pub fn run_id(&self) -> Option<Uuid> {
        match self {
            Self::ExistingRun(id) => Some(*id),
            Self::ProblemSet(_) => None,
        }
    }
}

fn is_hyphenated_uuid(s: &str) -> bool {
    const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];
    let parts: Vec<&str> = s.split('-').collect();
    parts.len() == GROUPS.len()
        && parts
            .iter()
            .zip(GROUPS)
            .all(|(part, len)| part.len() == len && part.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Body of the oracle's `start-run` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StartRunRequest {
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem_set: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_run_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts_per_problem: Option<u32>,
}

/// The oracle's answer to `start-run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StartedRun {
    pub run_id: Uuid,
    pub run_type: String,
    pub benchmark_version: String,
    pub attempts: Vec<Attempt>,
}

/// Persistent run metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    /// `provider/model`
    pub model_identifier: String,
    pub problem_set: Option<String>,
    pub benchmark_version: String,
    pub run_type: String,
    pub started_at: DateTime<Utc>,
    /// Credential-free configuration the run was started with
    pub config: Value,
}

/// Fraction of attempts judged correct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub numerator: u32,
    pub denominator: u32,
}

/// Maps an attempt to the name of the problem it exercised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemName {
    #[serde(rename = "attempt-id")]
    pub attempt_id: Uuid,
    #[serde(rename = "problem-name")]
    pub name: String,
}

/// The oracle's answer to `complete-run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunCompletion {
    #[serde(default)]
    pub run_time: Value,
    pub score: Score,
    pub percent: f64,
    #[serde(default)]
    pub problem_names: Vec<ProblemName>,
}

/// Final results persisted when a run completes.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub score: Score,
    pub percent: f64,
    pub total_api_calls: u64,
}

impl RunResult {
    pub fn elapsed_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

/// What the caller is told about a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub model_identifier: String,
    pub run_time: String,
    pub score: Score,
    pub percent: f64,
    pub total_api_calls: u64,
}

/// One entry of the problem-set catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemSet {
    pub name: String,
    pub id: String,
}

/// Problem sets offered by the oracle, grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemSetCatalog {
    #[serde(rename = "problem-sets", default)]
    pub categories: BTreeMap<String, Vec<ProblemSet>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_run_target_parsing() {
        let id = Uuid::new_v4();
        assert_eq!(
            RunTarget::parse(&id.to_string()).unwrap(),
            RunTarget::ExistingRun(id)
        );
        assert_eq!(
            RunTarget::parse(&id.to_string().to_uppercase()).unwrap(),
            RunTarget::ExistingRun(id)
        );
        assert_eq!(
            RunTarget::parse("sherlock1").unwrap(),
            RunTarget::ProblemSet("sherlock1".to_string())
        );
        // Unhyphenated UUIDs are problem-set ids, not runs.
        assert_eq!(
            RunTarget::parse(&id.simple().to_string()).unwrap(),
            RunTarget::ProblemSet(id.simple().to_string())
        );
        assert!(RunTarget::parse("  ").is_err());
    }

    #[test]
    fn test_resume_mode() {
        assert_eq!(ResumeMode::from_str("Retry"), Some(ResumeMode::Retry));
        assert_eq!(ResumeMode::Skip.as_str(), "skip");
        assert_eq!(ResumeMode::from_str("later"), None);
    }

    #[test]
    fn test_start_run_request_body() {
        let request = StartRunRequest {
            client_id: "anthropic/claude".to_string(),
            problem_set: Some("easy3".to_string()),
            attempts_per_problem: Some(2),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "client-id": "anthropic/claude",
                "problem-set": "easy3",
                "attempts-per-problem": 2,
            })
        );
    }

    #[test]
    fn test_run_completion_parsing() {
        let completion: RunCompletion = serde_json::from_value(json!({
            "run-time": "0:12:03",
            "score": {"numerator": 3, "denominator": 4},
            "percent": 75.0,
            "problem-names": [{"attempt-id": Uuid::nil(), "problem-name": "add"}],
        }))
        .unwrap();
        assert_eq!(completion.score.numerator, 3);
        assert_eq!(completion.problem_names[0].name, "add");
    }

    #[test]
    fn test_catalog_parsing() {
        let catalog: ProblemSetCatalog = serde_json::from_value(json!({
            "problem-sets": {
                "Sherlock": [{"name": "Easy 3", "id": "easy3"}],
            }
        }))
        .unwrap();
        assert_eq!(catalog.categories["Sherlock"][0].id, "easy3");
    }
}
