//! OpenAI-compatible Chat Completions provider.
//!
//! Serves OpenAI itself and compatible hosts such as Fireworks and Gemini;
//! they differ only in base URL, key and the extra body fields they accept.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;

use super::{status_error, transport_error};
use crate::domain::errors::{DomainError, DomainResult, ErrorClass, ProviderError};
use crate::domain::models::{
    CompletionRequest, ContentBlock, Message, ProviderConfig, RawCompletion, ReasoningBlock, Role,
    ToolInvocation, TurnElement,
};
use crate::domain::ports::ModelProvider;

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// Configuration for an OpenAI-compatible provider.
#[derive(Debug, Clone)]
pub struct OpenAiCompatConfig {
    /// Provider name reported in errors and client ids
    pub name: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Fields merged into the top level of every request body
    pub extra_body: Option<Value>,
}

impl OpenAiCompatConfig {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_key: None,
            base_url: base_url.into(),
            model: model.into(),
            timeout_secs: 600,
            temperature: None,
            max_tokens: None,
            extra_body: None,
        }
    }

    pub fn from_provider_config(name: &str, default_base_url: &str, config: &ProviderConfig) -> Self {
        Self {
            timeout_secs: config.timeout_secs,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            extra_body: config.extra_body.clone(),
            ..Self::new(
                name,
                config.api_base_url.as_deref().unwrap_or(default_base_url),
                &config.model,
            )
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

/// OpenAI-compatible Chat Completions provider.
pub struct OpenAiCompatProvider {
    config: OpenAiCompatConfig,
    client: Client,
}

impl OpenAiCompatProvider {
    pub fn new(config: OpenAiCompatConfig) -> DomainResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DomainError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    fn build_body(&self, request: &CompletionRequest<'_>) -> Value {
        let mut body = Map::new();
        body.insert("model".to_string(), json!(self.config.model));
        body.insert(
            "messages".to_string(),
            Value::Array(request.messages.iter().flat_map(to_wire_messages).collect()),
        );

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        }
                    })
                })
                .collect();
            body.insert("tools".to_string(), Value::Array(tools));
        }

        if let Some(schema) = request.response_schema {
            body.insert(
                "response_format".to_string(),
                json!({
                    "type": "json_schema",
                    "json_schema": {"name": "prediction", "schema": schema, "strict": true},
                }),
            );
        }

        if let Some(temperature) = self.config.temperature {
            body.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(max_tokens) = self.config.max_tokens {
            body.insert("max_tokens".to_string(), json!(max_tokens));
        }
        if let Some(Value::Object(extra)) = &self.config.extra_body {
            for (key, value) in extra {
                body.insert(key.clone(), value.clone());
            }
        }

        Value::Object(body)
    }
}

/// One transcript message becomes one or more chat messages: tool results
/// each get their own `tool` message.
fn to_wire_messages(message: &Message) -> Vec<Value> {
    match message.role {
        Role::User => {
            let mut wire: Vec<Value> = message
                .tool_results_iter()
                .map(|result| {
                    json!({
                        "role": "tool",
                        "tool_call_id": result.invocation_id,
                        "content": result.content,
                    })
                })
                .collect();
            if let Some(text) = message.text() {
                wire.push(json!({"role": "user", "content": text}));
            }
            wire
        }
        Role::Assistant => {
            let mut wire = Map::new();
            wire.insert("role".to_string(), json!("assistant"));
            wire.insert(
                "content".to_string(),
                message.text().map_or(Value::Null, Value::String),
            );

            let calls: Vec<Value> = message
                .content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::ToolInvocation(invocation) => Some(json!({
                        "id": invocation.id,
                        "type": "function",
                        "function": {
                            "name": invocation.name,
                            "arguments": Value::Object(invocation.arguments.clone()).to_string(),
                        }
                    })),
                    _ => None,
                })
                .collect();
            if !calls.is_empty() {
                wire.insert("tool_calls".to_string(), Value::Array(calls));
            }

            vec![Value::Object(wire)]
        }
    }
}

/// Split a leading `<think>...</think>` section off the visible content.
fn split_inline_reasoning(content: &str) -> (Option<String>, String) {
    let trimmed = content.trim_start();
    if let Some(rest) = trimmed.strip_prefix(THINK_OPEN) {
        if let Some(end) = rest.find(THINK_CLOSE) {
            let reasoning = rest[..end].trim().to_string();
            let visible = rest[end + THINK_CLOSE.len()..].trim().to_string();
            return (Some(reasoning).filter(|r| !r.is_empty()), visible);
        }
    }
    (None, content.to_string())
}

fn parse_arguments(raw: Option<&Value>) -> Map<String, Value> {
    match raw {
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => map,
            _ => Map::from_iter([("raw".to_string(), Value::String(s.clone()))]),
        },
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}

#[async_trait]
impl ModelProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<RawCompletion, ProviderError> {
        let name = self.config.name.as_str();
        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            ProviderError::new(name, ErrorClass::Authentication, "API key not set")
        })?;

        let body = self.build_body(request);
        debug!(provider = name, model = %self.config.model, "Sending chat completion request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url.trim_end_matches('/')))
            .header(header::CONTENT_TYPE, "application/json")
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(name, &e))?;

        if !response.status().is_success() {
            return Err(status_error(name, response).await);
        }

        let value: Value = response.json().await.map_err(|e| {
            ProviderError::new(name, ErrorClass::MalformedResponse, format!("Failed to parse response: {e}"))
        })?;

        let has_choice = value
            .get("choices")
            .and_then(Value::as_array)
            .is_some_and(|choices| !choices.is_empty());
        if !has_choice {
            return Err(ProviderError::new(
                name,
                ErrorClass::MalformedResponse,
                "no choices in response",
            ));
        }

        Ok(RawCompletion(value))
    }

    fn decompose(&self, completion: &RawCompletion) -> Vec<TurnElement> {
        let Some(message) = completion.body().pointer("/choices/0/message") else {
            return Vec::new();
        };

        let mut elements = Vec::new();

        let reasoning = message
            .get("reasoning_content")
            .or_else(|| message.get("reasoning"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty());
        if let Some(text) = reasoning {
            elements.push(TurnElement::Reasoning(ReasoningBlock {
                text: text.to_string(),
                signature: None,
            }));
        }

        if let Some(content) = message.get("content").and_then(Value::as_str) {
            let (inline_reasoning, visible) = split_inline_reasoning(content);
            if let Some(text) = inline_reasoning {
                elements.push(TurnElement::Reasoning(ReasoningBlock {
                    text,
                    signature: None,
                }));
            }
            if !visible.is_empty() {
                elements.push(TurnElement::Text(visible));
            }
        }

        if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
            for call in calls {
                let function = call.get("function");
                elements.push(TurnElement::ToolInvocation(ToolInvocation {
                    id: call
                        .get("id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    name: function
                        .and_then(|f| f.get("name"))
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    arguments: parse_arguments(function.and_then(|f| f.get("arguments"))),
                }));
            }
        }

        elements
    }
}
