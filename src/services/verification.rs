//! Verification phase: the model predicts outputs for inputs chosen by the
//! oracle, which judges each prediction.

use serde_json::Value;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::dispatcher::CompletionDispatcher;
use super::prompts::verification_message;
use super::transcript_printer::TranscriptPrinter;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    prediction_schema, value_list_to_map, Attempt, CompletionRequest, Message, Prediction,
    Transcript, Verdict, VerificationCase,
};
use crate::domain::ports::Oracle;

/// Total parse attempts per verification case.
pub const MAX_PARSE_ATTEMPTS: u32 = 3;

pub struct VerificationLoop<'a> {
    oracle: &'a dyn Oracle,
    dispatcher: &'a CompletionDispatcher,
}

impl<'a> VerificationLoop<'a> {
    pub fn new(oracle: &'a dyn Oracle, dispatcher: &'a CompletionDispatcher) -> Self {
        Self { oracle, dispatcher }
    }

    /// Run every verification case of an attempt.
    ///
    /// Returns `false` as soon as a prediction is judged wrong, `true` once
    /// the oracle reports `done` or runs out of cases.
    #[instrument(skip(self, attempt, transcript, printer), fields(attempt_id = %attempt.id))]
    pub async fn run(
        &self,
        run_id: Uuid,
        attempt: &Attempt,
        transcript: &Transcript,
        printer: &mut TranscriptPrinter,
    ) -> DomainResult<bool> {
        let lead_in = transcript.last().cloned().ok_or_else(|| {
            DomainError::TranscriptInvariant("verification needs a prior transcript".to_string())
        })?;

        while let Some(case) = self.oracle.next_verification(run_id, attempt.id).await? {
            printer.print("\n### SYSTEM: inputs:");
            printer.indented_print(Value::Array(case.inputs.clone()).to_string());

            let prediction = self.predict(&lead_in, &case).await?;

            printer.print("\n--- LLM ---");
            printer.indented_print(&prediction.thoughts);
            printer.print("");
            printer.indented_print(format!("`{}`", display_value(&prediction.expected_output)));

            let verdict = self
                .oracle
                .attempt_verification(run_id, attempt.id, &prediction)
                .await?;

            match verdict {
                Verdict::Wrong => {
                    printer.print("\n### SYSTEM: WRONG");
                    return Ok(false);
                }
                Verdict::Done => {
                    printer.print("\n### SYSTEM: CORRECT");
                    return Ok(true);
                }
                Verdict::Correct => printer.print("\n### SYSTEM: CORRECT"),
                Verdict::Other(status) => {
                    warn!(status = %status, "Unrecognised verification status, continuing");
                    printer.print("\n### SYSTEM: CORRECT");
                }
            }
        }

        Ok(true)
    }

    /// Ask for a structured prediction, retrying malformed output.
    async fn predict(&self, lead_in: &Message, case: &VerificationCase) -> DomainResult<Prediction> {
        let messages = [
            lead_in.clone(),
            verification_message(&value_list_to_map(&case.inputs), &case.output_type),
        ];
        let schema = prediction_schema(&case.output_type);
        let request = CompletionRequest::new(&messages).with_response_schema(&schema);

        for attempt in 1..=MAX_PARSE_ATTEMPTS {
            let turn = self.dispatcher.next_normalized_turn(&request).await?;

            match parse_prediction(turn.text.as_deref()) {
                Ok(prediction) => return Ok(prediction),
                Err(err) => {
                    warn!(attempt, max = MAX_PARSE_ATTEMPTS, error = %err, "Could not parse prediction");
                    debug!(response = ?turn.text, "Unparseable prediction");
                }
            }
        }

        Ok(Prediction::empty())
    }
}

/// Remove a Markdown code fence wrapped around a JSON payload.
///
/// Strips a leading ```` ```json ```` (or bare ```` ``` ````) and a trailing
/// ```` ``` ````, then surrounding whitespace.
pub fn strip_code_fence(response: &str) -> &str {
    let mut cleaned = response.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest.trim();
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest.trim();
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest.trim();
    }
    cleaned
}

/// Parse the model's structured answer.
///
/// Missing text and missing `thoughts` or `expected_output` keys count as
/// malformed output.
pub fn parse_prediction(response: Option<&str>) -> DomainResult<Prediction> {
    let response = response.ok_or_else(|| {
        DomainError::MalformedStructuredOutput("response has no text".to_string())
    })?;

    let value: Value = serde_json::from_str(strip_code_fence(response))
        .map_err(|e| DomainError::MalformedStructuredOutput(e.to_string()))?;

    let thoughts = match value.get("thoughts") {
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => {
            return Err(DomainError::MalformedStructuredOutput(
                "missing key 'thoughts'".to_string(),
            ))
        }
    };

    let expected_output = value.get("expected_output").cloned().ok_or_else(|| {
        DomainError::MalformedStructuredOutput("missing key 'expected_output'".to_string())
    })?;

    Ok(Prediction {
        thoughts,
        expected_output,
    })
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
