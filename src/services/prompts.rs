//! Prompts sent to the model.

use serde_json::{Map, Value};

use crate::domain::models::{Message, Transcript, MYSTERY_FUNCTION};

/// Opening message of an attempt's investigation.
pub fn initial_transcript(test_limit: Option<u32>) -> Transcript {
    let budget = match test_limit {
        Some(limit) => format!("You may test the function up to {limit} times. "),
        None => String::new(),
    };

    let text = format!(
        "You are investigating a hidden function called {MYSTERY_FUNCTION}. \
         You can call it with the `{MYSTERY_FUNCTION}` tool to see what it outputs \
         for the arguments you choose. {budget}\
         Test it thoroughly until you are confident you know exactly what it does. \
         When you are done testing, do not call the tool again. Instead, describe \
         what the function does in plain words. You will then be asked to predict \
         its output for some inputs you have not seen."
    );

    Transcript::from_messages(vec![Message::user_text(text)])
}

/// Request for a prediction on one verification case.
pub fn verification_message(inputs: &Map<String, Value>, output_type: &str) -> Message {
    let inputs = Value::Object(inputs.clone());

    Message::user_text(format!(
        "Given these inputs to the mystery function:\n{inputs}\n\n\
         What will the function output? The output is of type `{output_type}`. \
         Respond with a JSON object with two keys: `thoughts`, your reasoning \
         about the function, and `expected_output`, the exact output you predict."
    ))
}
