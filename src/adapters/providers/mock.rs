//! Scripted model provider for testing.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::domain::errors::{ErrorClass, ProviderError};
use crate::domain::models::{
    CompletionRequest, Message, RawCompletion, ReasoningBlock, RedactedReasoning, ToolInvocation,
    TurnElement,
};
use crate::domain::ports::ModelProvider;

/// One scripted model turn.
#[derive(Debug, Clone, Default)]
pub struct MockTurn {
    elements: Vec<Value>,
    failure: Option<ErrorClass>,
    latency: Duration,
}

impl MockTurn {
    pub fn new() -> Self {
        Self::default()
    }

    /// A turn that fails with the given class.
    pub fn failure(class: ErrorClass) -> Self {
        Self {
            failure: Some(class),
            ..Default::default()
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.elements.push(json!({"kind": "text", "text": text.into()}));
        self
    }

    pub fn reasoning(mut self, text: impl Into<String>, signature: Option<&str>) -> Self {
        self.elements
            .push(json!({"kind": "reasoning", "text": text.into(), "signature": signature}));
        self
    }

    pub fn redacted(mut self) -> Self {
        self.elements.push(json!({"kind": "redacted"}));
        self
    }

    /// Request a `mystery_function` call with keyed arguments.
    pub fn tool_call(self, id: impl Into<String>, arguments: Value) -> Self {
        self.named_tool_call(id, crate::domain::models::MYSTERY_FUNCTION, arguments)
    }

    pub fn named_tool_call(mut self, id: impl Into<String>, name: &str, arguments: Value) -> Self {
        self.elements.push(json!({
            "kind": "tool_call",
            "id": id.into(),
            "name": name,
            "arguments": arguments,
        }));
        self
    }

    /// An element kind no adapter understands.
    pub fn unknown(mut self, kind: &str) -> Self {
        self.elements.push(json!({"kind": kind}));
        self
    }

    /// Simulated time the call takes.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

/// What the provider was asked.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
    pub response_schema: Option<Value>,
}

/// Model provider that replays a script of turns.
pub struct MockProvider {
    model: String,
    script: Arc<RwLock<VecDeque<MockTurn>>>,
    requests: Arc<RwLock<Vec<RecordedRequest>>>,
    call_starts: Arc<RwLock<Vec<Instant>>>,
}

impl MockProvider {
    pub fn new(turns: Vec<MockTurn>) -> Self {
        Self {
            model: "mock-model".to_string(),
            script: Arc::new(RwLock::new(turns.into())),
            requests: Arc::new(RwLock::new(Vec::new())),
            call_starts: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Append more turns to the script.
    pub async fn push_turns(&self, turns: impl IntoIterator<Item = MockTurn>) {
        self.script.write().await.extend(turns);
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.read().await.clone()
    }

    pub async fn call_starts(&self) -> Vec<Instant> {
        self.call_starts.read().await.clone()
    }

    pub async fn remaining_turns(&self) -> usize {
        self.script.read().await.len()
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<RawCompletion, ProviderError> {
        self.call_starts.write().await.push(Instant::now());
        self.requests.write().await.push(RecordedRequest {
            messages: request.messages.to_vec(),
            tool_names: request.tools.iter().map(|t| t.name.clone()).collect(),
            response_schema: request.response_schema.cloned(),
        });

        let turn = self.script.write().await.pop_front().ok_or_else(|| {
            ProviderError::new("mock", ErrorClass::Other, "mock script exhausted")
        })?;

        if !turn.latency.is_zero() {
            tokio::time::sleep(turn.latency).await;
        }

        match turn.failure {
            Some(class) => Err(ProviderError::new("mock", class, format!("scripted {class} failure"))),
            None => Ok(RawCompletion(json!({ "elements": turn.elements }))),
        }
    }

    fn decompose(&self, completion: &RawCompletion) -> Vec<TurnElement> {
        completion
            .body()
            .get("elements")
            .and_then(Value::as_array)
            .map(|elements| elements.iter().map(decompose_element).collect())
            .unwrap_or_default()
    }
}

fn decompose_element(element: &Value) -> TurnElement {
    let kind = element.get("kind").and_then(Value::as_str).unwrap_or_default();
    let text = || {
        element
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    match kind {
        "text" => TurnElement::Text(text()),
        "reasoning" => TurnElement::Reasoning(ReasoningBlock {
            text: text(),
            signature: element
                .get("signature")
                .and_then(Value::as_str)
                .map(str::to_string),
        }),
        "redacted" => TurnElement::RedactedReasoning(RedactedReasoning::default()),
        "tool_call" => TurnElement::ToolInvocation(ToolInvocation {
            id: element
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            name: element
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            arguments: element
                .get("arguments")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_else(Map::new),
        }),
        other => TurnElement::Other(other.to_string()),
    }
}
