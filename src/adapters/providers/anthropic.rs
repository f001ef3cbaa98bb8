//! Anthropic Messages API provider.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use super::{status_error, transport_error};
use crate::domain::errors::{DomainError, DomainResult, ErrorClass, ProviderError};
use crate::domain::models::{
    CompletionRequest, ContentBlock, Message, ProviderConfig, RawCompletion, ReasoningBlock,
    RedactedReasoning, Role, ToolInvocation, ToolSchema, TurnElement,
};
use crate::domain::ports::ModelProvider;

const PROVIDER: &str = "anthropic";

/// Configuration for the Anthropic provider.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: Option<String>,
    /// API base URL.
    pub base_url: String,
    pub model: String,
    /// API version header.
    pub api_version: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    /// Extended-thinking budget; thinking is off when unset.
    pub thinking_budget: Option<u32>,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-3-7-sonnet-20250219".to_string(),
            api_version: "2023-06-01".to_string(),
            timeout_secs: 600,
            max_tokens: 8192,
            temperature: None,
            thinking_budget: None,
        }
    }
}

impl AnthropicConfig {
    pub fn from_provider_config(config: &ProviderConfig) -> Self {
        let defaults = Self::default();
        // max_tokens must leave room for the thinking budget.
        let max_tokens = config.max_tokens.unwrap_or_else(|| {
            defaults.max_tokens + config.thinking_budget.unwrap_or_default()
        });

        Self {
            base_url: config.api_base_url.clone().unwrap_or(defaults.base_url),
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
            max_tokens,
            temperature: config.temperature,
            thinking_budget: config.thinking_budget,
            ..defaults
        }
    }

    /// Create config with explicit API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Create config with custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Create config with custom model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Content block on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WireBlock {
    #[serde(rename = "thinking")]
    Thinking {
        thinking: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    #[serde(rename = "redacted_thinking")]
    RedactedThinking {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<String>,
    },
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse { id: String, name: String, input: Value },
    #[serde(rename = "tool_result")]
    ToolResult { tool_use_id: String, content: String },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Vec<WireBlock>,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a Value,
}

#[derive(Debug, Serialize)]
struct Thinking {
    #[serde(rename = "type")]
    kind: &'static str,
    budget_tokens: u32,
}

/// Request to the Messages API.
#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<Thinking>,
}

/// Anthropic Messages API provider.
pub struct AnthropicProvider {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicConfig) -> DomainResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DomainError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    fn build_request<'a>(&'a self, request: &'a CompletionRequest<'_>) -> MessagesRequest<'a> {
        // The Messages API has no structured-output switch; the schema is
        // passed as a system instruction instead.
        let system = request.response_schema.map(|schema| {
            format!("Respond only with a JSON object conforming to this JSON schema:\n{schema}")
        });

        MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            messages: request.messages.iter().map(to_wire_message).collect(),
            tools: request.tools.iter().map(to_wire_tool).collect(),
            system,
            temperature: self.config.temperature,
            thinking: self.config.thinking_budget.map(|budget_tokens| Thinking {
                kind: "enabled",
                budget_tokens,
            }),
        }
    }
}

fn to_wire_message(message: &Message) -> WireMessage {
    let role = match message.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };

    let content = message
        .content
        .iter()
        .map(|block| match block {
            ContentBlock::Reasoning(reasoning) => WireBlock::Thinking {
                thinking: reasoning.text.clone(),
                signature: reasoning.signature.clone(),
            },
            ContentBlock::RedactedReasoning(redacted) => WireBlock::RedactedThinking {
                data: redacted.data.clone(),
            },
            ContentBlock::Text { text } => WireBlock::Text { text: text.clone() },
            ContentBlock::ToolInvocation(invocation) => WireBlock::ToolUse {
                id: invocation.id.clone(),
                name: invocation.name.clone(),
                input: Value::Object(invocation.arguments.clone()),
            },
            ContentBlock::ToolResult(result) => WireBlock::ToolResult {
                tool_use_id: result.invocation_id.clone(),
                content: result.content.clone(),
            },
        })
        .collect();

    WireMessage { role, content }
}

fn to_wire_tool(tool: &ToolSchema) -> WireTool<'_> {
    WireTool {
        name: &tool.name,
        description: &tool.description,
        input_schema: &tool.parameters,
    }
}

fn decompose_block(block: &Value) -> TurnElement {
    let kind = || {
        block
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string()
    };

    match serde_json::from_value::<WireBlock>(block.clone()) {
        Ok(WireBlock::Thinking { thinking, signature }) => TurnElement::Reasoning(ReasoningBlock {
            text: thinking,
            signature,
        }),
        Ok(WireBlock::RedactedThinking { data }) => {
            TurnElement::RedactedReasoning(RedactedReasoning { data })
        }
        Ok(WireBlock::Text { text }) => TurnElement::Text(text),
        Ok(WireBlock::ToolUse { id, name, input }) => {
            let arguments = match input {
                Value::Object(map) => map,
                Value::Null => Map::new(),
                other => Map::from_iter([("raw".to_string(), other)]),
            };
            TurnElement::ToolInvocation(ToolInvocation { id, name, arguments })
        }
        Ok(WireBlock::ToolResult { .. } | WireBlock::Unknown) | Err(_) => TurnElement::Other(kind()),
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<RawCompletion, ProviderError> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            ProviderError::new(PROVIDER, ErrorClass::Authentication, "ANTHROPIC_API_KEY not set")
        })?;

        let body = self.build_request(request);
        debug!(model = %self.config.model, messages = body.messages.len(), "Sending Anthropic request");

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url.trim_end_matches('/')))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, &e))?;

        if !response.status().is_success() {
            return Err(status_error(PROVIDER, response).await);
        }

        let value: Value = response.json().await.map_err(|e| {
            ProviderError::new(PROVIDER, ErrorClass::MalformedResponse, format!("Failed to parse response: {e}"))
        })?;

        if value.get("content").and_then(Value::as_array).is_none() {
            return Err(ProviderError::new(
                PROVIDER,
                ErrorClass::MalformedResponse,
                "response has no content array",
            ));
        }

        Ok(RawCompletion(value))
    }

    fn decompose(&self, completion: &RawCompletion) -> Vec<TurnElement> {
        completion
            .body()
            .get("content")
            .and_then(Value::as_array)
            .map(|blocks| blocks.iter().map(decompose_block).collect())
            .unwrap_or_default()
    }
}
