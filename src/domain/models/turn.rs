//! Provider-neutral view of a single model turn.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use super::tool::ToolSchema;
use super::transcript::{ContentBlock, Message, ReasoningBlock, RedactedReasoning, Role, ToolInvocation};

/// Completion body exactly as the provider returned it.
///
/// Only the provider that produced it knows its shape; everything else goes
/// through [`NormalizedTurn`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawCompletion(pub Value);

impl RawCompletion {
    pub fn body(&self) -> &Value {
        &self.0
    }
}

/// Request for the next model turn.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub messages: &'a [Message],
    /// Tools the model may call; empty when none are offered
    pub tools: &'a [ToolSchema],
    /// JSON schema the response must conform to, for structured output
    pub response_schema: Option<&'a Value>,
}

impl<'a> CompletionRequest<'a> {
    pub fn new(messages: &'a [Message]) -> Self {
        Self {
            messages,
            tools: &[],
            response_schema: None,
        }
    }

    pub fn with_tools(mut self, tools: &'a [ToolSchema]) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_response_schema(mut self, schema: &'a Value) -> Self {
        self.response_schema = Some(schema);
        self
    }
}

/// One content element of a provider completion, classified by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnElement {
    Reasoning(ReasoningBlock),
    RedactedReasoning(RedactedReasoning),
    Text(String),
    ToolInvocation(ToolInvocation),
    /// A kind this client does not understand
    Other(String),
}

/// Uniform decomposition of a model turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedTurn {
    pub reasoning: Option<ReasoningBlock>,
    pub redacted_reasoning: Option<RedactedReasoning>,
    pub text: Option<String>,
    pub tool_invocations: Vec<ToolInvocation>,
}

impl NormalizedTurn {
    /// Fold classified elements into a turn.
    ///
    /// The first reasoning block, redacted marker and text element win; tool
    /// invocations are kept in order; unknown kinds are dropped. An invocation
    /// whose id is missing or already taken in this turn gets `call_<n>`.
    pub fn from_elements<I>(elements: I) -> Self
    where
        I: IntoIterator<Item = TurnElement>,
    {
        let mut turn = Self::default();
        let mut seen_ids = HashSet::new();
        for element in elements {
            match element {
                TurnElement::Reasoning(block) => {
                    turn.reasoning.get_or_insert(block);
                }
                TurnElement::RedactedReasoning(marker) => {
                    turn.redacted_reasoning.get_or_insert(marker);
                }
                TurnElement::Text(text) => {
                    turn.text.get_or_insert(text);
                }
                TurnElement::ToolInvocation(mut invocation) => {
                    if invocation.id.is_empty() || seen_ids.contains(&invocation.id) {
                        invocation.id = synthetic_invocation_id(turn.tool_invocations.len(), &seen_ids);
                    }
                    seen_ids.insert(invocation.id.clone());
                    turn.tool_invocations.push(invocation);
                }
                TurnElement::Other(_) => {}
            }
        }
        turn
    }

    pub fn has_tool_invocations(&self) -> bool {
        !self.tool_invocations.is_empty()
    }

    /// Compose the assistant message for this turn.
    ///
    /// Order is reasoning, redacted marker, text, then tool invocations when
    /// `include_invocations` is set.
    pub fn to_assistant_message(&self, include_invocations: bool) -> Message {
        let mut content = Vec::new();

        if let Some(reasoning) = &self.reasoning {
            content.push(ContentBlock::Reasoning(reasoning.clone()));
        }
        if let Some(redacted) = &self.redacted_reasoning {
            content.push(ContentBlock::RedactedReasoning(redacted.clone()));
        }
        if let Some(text) = &self.text {
            content.push(ContentBlock::Text { text: text.clone() });
        }
        if include_invocations {
            content.extend(
                self.tool_invocations
                    .iter()
                    .cloned()
                    .map(ContentBlock::ToolInvocation),
            );
        }

        Message {
            role: Role::Assistant,
            content,
        }
    }
}

fn synthetic_invocation_id(position: usize, taken: &HashSet<String>) -> String {
    (position..)
        .map(|n| format!("call_{n}"))
        .find(|id| !taken.contains(id))
        .unwrap_or_default()
}
