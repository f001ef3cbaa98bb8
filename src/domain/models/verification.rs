//! Verification phase domain model.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// An input vector the model must predict the output for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationCase {
    #[serde(rename = "next-verification")]
    pub inputs: Vec<Value>,

    #[serde(rename = "output-type")]
    pub output_type: String,
}

/// The oracle's judgement of one prediction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Correct,
    /// Terminates the attempt as a failure
    Wrong,
    /// Correct, and this was the last case
    Done,
    /// A status literal this client does not recognise; treated as correct
    Other(String),
}

impl Verdict {
    pub fn from_status(status: &str) -> Self {
        match status {
            "correct" => Self::Correct,
            "wrong" => Self::Wrong,
            "done" => Self::Done,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Correct => "correct",
            Self::Wrong => "wrong",
            Self::Done => "done",
            Self::Other(status) => status,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The model's structured answer for one verification case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub thoughts: String,
    pub expected_output: Value,
}

impl Prediction {
    /// Placeholder submitted when the model never produced parseable output.
    pub fn empty() -> Self {
        Self {
            thoughts: String::new(),
            expected_output: Value::String(String::new()),
        }
    }
}

/// JSON schema for a prediction whose `expected_output` has `output_type`.
pub fn prediction_schema(output_type: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "thoughts": { "type": "string" },
            "expected_output": { "type": output_type },
        },
        "required": ["thoughts", "expected_output"],
        "additionalProperties": false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_parsing() {
        assert_eq!(Verdict::from_status("correct"), Verdict::Correct);
        assert_eq!(Verdict::from_status("wrong"), Verdict::Wrong);
        assert_eq!(Verdict::from_status("done"), Verdict::Done);
        assert_eq!(
            Verdict::from_status("partial"),
            Verdict::Other("partial".to_string())
        );
        assert_eq!(Verdict::from_status("partial").to_string(), "partial");
    }

    #[test]
    fn test_case_from_oracle_json() {
        let case: VerificationCase = serde_json::from_value(json!({
            "next-verification": [1, "two"],
            "output-type": "integer",
        }))
        .unwrap();
        assert_eq!(case.inputs, vec![json!(1), json!("two")]);
        assert_eq!(case.output_type, "integer");
    }

    #[test]
    fn test_prediction_schema() {
        let schema = prediction_schema("boolean");
        assert_eq!(schema["properties"]["expected_output"]["type"], "boolean");
        assert_eq!(schema["required"], json!(["thoughts", "expected_output"]));
    }

    #[test]
    fn test_empty_prediction() {
        let prediction = Prediction::empty();
        assert!(prediction.thoughts.is_empty());
        assert_eq!(prediction.expected_output, json!(""));
    }
}
