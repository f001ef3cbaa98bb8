//! Investigation phase: the model tests the mystery function through tool
//! calls until it stops calling the tool or runs out of turns.

use serde_json::Value;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::dispatcher::CompletionDispatcher;
use super::transcript_printer::TranscriptPrinter;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    normalize_args, Attempt, CompletionRequest, ToolInvocation, ToolResult, ToolSchema, Transcript,
};
use crate::domain::ports::Oracle;

/// Output recorded when the oracle's reply carries no `output`.
pub const TOOL_ERROR_SENTINEL: &str = "Error calling tool";

/// Result of a completed investigation.
#[derive(Debug, Clone)]
pub struct InvestigationOutcome {
    pub transcript: Transcript,
    /// Number of tool invocations answered
    pub tool_calls: u32,
}

pub struct InvestigationLoop<'a> {
    oracle: &'a dyn Oracle,
    dispatcher: &'a CompletionDispatcher,
    msg_limit: u32,
}

impl<'a> InvestigationLoop<'a> {
    pub fn new(oracle: &'a dyn Oracle, dispatcher: &'a CompletionDispatcher, msg_limit: u32) -> Self {
        Self {
            oracle,
            dispatcher,
            msg_limit,
        }
    }

    /// Let the model test the function until it answers without a tool call.
    ///
    /// Fails with [`DomainError::MessageLimitExceeded`] when every one of the
    /// `msg_limit` turns called the tool.
    #[instrument(skip(self, attempt, transcript, printer), fields(attempt_id = %attempt.id))]
    pub async fn run(
        &self,
        run_id: Uuid,
        attempt: &Attempt,
        mut transcript: Transcript,
        printer: &mut TranscriptPrinter,
    ) -> DomainResult<InvestigationOutcome> {
        let tools = [ToolSchema::mystery_function(&attempt.arg_spec)];
        let mut tool_calls: u32 = 0;

        for turn_index in 0..self.msg_limit {
            let request = CompletionRequest::new(transcript.messages()).with_tools(&tools);
            let turn = self.dispatcher.next_normalized_turn(&request).await?;

            printer.print("\n--- LLM ---");
            printer.indented_print(turn.text.as_deref().unwrap_or_default());

            if turn.has_tool_invocations() {
                printer.print("\n### SYSTEM: calling tool");

                let assistant = turn.to_assistant_message(true);
                assistant.check_tool_invocations()?;

                let mut results = Vec::with_capacity(turn.tool_invocations.len());
                for invocation in &turn.tool_invocations {
                    results.push(self.call_tool(run_id, attempt.id, invocation, printer).await?);
                    tool_calls += 1;
                }

                transcript.push_tool_exchange(assistant, results)?;
                debug!(turn = turn_index + 1, tool_calls, "Tool exchange appended");
            } else {
                printer.print(format!("\n### SYSTEM: The tool was used {tool_calls} times."));
                transcript.push(turn.to_assistant_message(false));

                return Ok(InvestigationOutcome {
                    transcript,
                    tool_calls,
                });
            }
        }

        Err(DomainError::MessageLimitExceeded {
            limit: self.msg_limit,
        })
    }

    async fn call_tool(
        &self,
        run_id: Uuid,
        attempt_id: Uuid,
        invocation: &ToolInvocation,
        printer: &mut TranscriptPrinter,
    ) -> DomainResult<ToolResult> {
        let args = normalize_args(&invocation.arguments);
        let reply = self.oracle.test_function(run_id, attempt_id, &args).await?;

        let output = reply
            .get("output")
            .cloned()
            .unwrap_or_else(|| Value::String(TOOL_ERROR_SENTINEL.to_string()));

        printer.indented_print(format!("{} → {}", format_args_list(&args), output));

        Ok(ToolResult {
            invocation_id: invocation.id.clone(),
            content: serde_json::to_string(&output)?,
        })
    }
}

fn format_args_list(args: &[Value]) -> String {
    args.iter().map(Value::to_string).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_args_list() {
        let args = vec![serde_json::json!(1), serde_json::json!("two")];
        assert_eq!(format_args_list(&args), r#"1, "two""#);
        assert_eq!(format_args_list(&[]), "");
    }
}
