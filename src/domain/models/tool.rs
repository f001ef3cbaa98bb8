//! The `mystery_function` tool offered to the model during investigation.
//!
//! The model sees the hidden function as a tool whose parameters carry
//! arbitrary, stable keys (`a`, `b`, `c`, ...). The keys are chosen so that
//! their alphabetical order equals the declared argument order; the
//! positional argument vector sent to the oracle is always recovered by
//! sorting keys, never by trusting the order the model used.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Name of the single tool offered during the investigation phase.
pub const MYSTERY_FUNCTION: &str = "mystery_function";

const MYSTERY_FUNCTION_DESCRIPTION: &str = "Use this tool to test the mystery function.";

/// Key assigned to the argument at `index`.
///
/// `a`..`z` for the first 26 arguments, then `za`..`zz`, `zza`.. so that
/// byte-wise ordering of the keys always matches positional order.
pub fn argument_key(index: usize) -> String {
    let letter = char::from(b'a' + (index % 26) as u8);
    let mut key = "z".repeat(index / 26);
    key.push(letter);
    key
}

/// Assign a key to every declared argument type, formatted as JSON schema
/// properties (`{"a": {"type": "integer"}, ...}`).
pub fn list_to_map(arg_spec: &[String]) -> Map<String, Value> {
    arg_spec
        .iter()
        .enumerate()
        .map(|(i, arg_type)| (argument_key(i), json!({ "type": arg_type })))
        .collect()
}

/// Assign a key to every value of an input vector (`{"a": 5, "b": 3}`).
pub fn value_list_to_map(values: &[Value]) -> Map<String, Value> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| (argument_key(i), value.clone()))
        .collect()
}

/// Convert keyed arguments into a positional vector ordered by key.
pub fn normalize_args<'a, I>(arguments: I) -> Vec<Value>
where
    I: IntoIterator<Item = (&'a String, &'a Value)>,
{
    let mut pairs: Vec<(&String, &Value)> = arguments.into_iter().collect();
    pairs.sort_by(|(a, _), (b, _)| a.cmp(b));
    pairs.into_iter().map(|(_, value)| value.clone()).collect()
}

/// Provider-neutral description of a tool the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON schema of the tool's input object
    pub parameters: Value,
}

impl ToolSchema {
    /// Build the `mystery_function` tool for an attempt's argument specification.
    pub fn mystery_function(arg_spec: &[String]) -> Self {
        let properties = list_to_map(arg_spec);
        let required: Vec<Value> = properties.keys().cloned().map(Value::String).collect();

        Self {
            name: MYSTERY_FUNCTION.to_string(),
            description: MYSTERY_FUNCTION_DESCRIPTION.to_string(),
            parameters: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }
}
