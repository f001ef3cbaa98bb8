//! Console blocks printed at the end of a run.

use console::style;
use uuid::Uuid;

use crate::domain::models::{FailureSnapshot, RunSummary};

/// Result block for a completed run.
pub fn render_summary(summary: &RunSummary) -> String {
    let mut lines = vec![
        format!(
            "\n### SYSTEM: run complete for model `{}`.",
            summary.model_identifier
        ),
        format!(
            "Final score: {} / {}",
            style(summary.score.numerator).bold(),
            summary.score.denominator
        ),
        format!("Percent: {}", summary.percent),
    ];
    if !summary.run_time.is_empty() {
        lines.push(format!("Run time: {}", summary.run_time));
    }
    lines.push(format!("Total API calls: {}", summary.total_api_calls));
    lines.join("\n")
}

/// Diagnostic block for a failed run, followed by the commands that resume it.
pub fn render_failure(provider: &str, run_id: Uuid, snapshot: &FailureSnapshot) -> String {
    let mut lines = vec![
        style("\n### SYSTEM ERROR: An uncaught exception occurred")
            .red()
            .bold()
            .to_string(),
        format!("Error type: {}", snapshot.error_type),
        format!("Error message: {}", snapshot.error_message),
    ];
    if let Some(attempt_id) = snapshot.current_attempt_id() {
        lines.push(format!("In-flight attempt: {attempt_id}"));
    }
    lines.push("The error has been recorded in the database.".to_string());
    lines.push(String::new());
    lines.push(resume_commands(provider, run_id));
    lines.join("\n")
}

pub fn resume_commands(provider: &str, run_id: Uuid) -> String {
    [
        "### SYSTEM INFO: Run failed. To resume this run, use one of the following:".to_string(),
        format!("  sherlockbench {provider} {run_id} --resume=skip   # Skip the failed attempt"),
        format!("  sherlockbench {provider} {run_id} --resume=retry  # Retry the failed attempt"),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::DomainError;
    use crate::domain::models::{Attempt, AttemptScope, Score};

    #[test]
    fn test_summary_block() {
        let summary = RunSummary {
            run_id: Uuid::new_v4(),
            model_identifier: "openai/gpt-4o".to_string(),
            run_time: "0:03:10".to_string(),
            score: Score {
                numerator: 3,
                denominator: 4,
            },
            percent: 75.0,
            total_api_calls: 41,
        };
        let text = console::strip_ansi_codes(&render_summary(&summary)).to_string();
        assert!(text.contains("run complete for model `openai/gpt-4o`"));
        assert!(text.contains("Final score: 3 / 4"));
        assert!(text.contains("Percent: 75"));
    }

    #[test]
    fn test_failure_block_includes_resume_commands() {
        let run_id = Uuid::new_v4();
        let attempt = Attempt::new(Uuid::new_v4(), vec![]);
        let scope = AttemptScope::enter(attempt.clone(), 0);
        let snapshot = FailureSnapshot::capture(
            &DomainError::MessageLimitExceeded { limit: 50 },
            Some(&scope),
            &[attempt.clone()],
        );

        let text = console::strip_ansi_codes(&render_failure("anthropic", run_id, &snapshot)).to_string();
        assert!(text.contains("Error type: MessageLimitExceeded"));
        assert!(text.contains(&attempt.id.to_string()));
        assert!(text.contains(&format!("sherlockbench anthropic {run_id} --resume=skip")));
        assert!(text.contains(&format!("sherlockbench anthropic {run_id} --resume=retry")));
    }
}
