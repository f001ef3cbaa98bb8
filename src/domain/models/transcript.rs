//! Conversation transcript domain model.
//!
//! A transcript is an append-only sequence of messages exchanged with the
//! model while one attempt is processed. It is owned by the investigation and
//! verification loops and discarded once the attempt completes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::domain::errors::{DomainError, DomainResult};

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Visible chain-of-thought returned by reasoning models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningBlock {
    pub text: String,
    /// Provider signature that must be echoed back with the block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Opaque marker for reasoning the provider chose not to reveal.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RedactedReasoning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// A call of a named tool requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Provider-assigned id used to correlate the result
    pub id: String,
    pub name: String,
    /// Arguments keyed by the names the model chose
    pub arguments: Map<String, Value>,
}

/// The answer to a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub invocation_id: String,
    /// JSON-serialized tool output
    pub content: String,
}

/// One piece of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Reasoning(ReasoningBlock),
    RedactedReasoning(RedactedReasoning),
    Text { text: String },
    ToolInvocation(ToolInvocation),
    ToolResult(ToolResult),
}

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    /// A user message with a single text block.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    /// A user message answering tool invocations.
    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self {
            role: Role::User,
            content: results.into_iter().map(ContentBlock::ToolResult).collect(),
        }
    }

    /// Tool invocations carried by this message, in order.
    pub fn tool_invocations(&self) -> impl Iterator<Item = &ToolInvocation> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolInvocation(invocation) => Some(invocation),
            _ => None,
        })
    }

    /// Check that this is an assistant message whose tool invocation ids are
    /// non-empty and distinct.
    pub fn check_tool_invocations(&self) -> DomainResult<()> {
        if self.role != Role::Assistant {
            return Err(DomainError::TranscriptInvariant(
                "tool invocations must come from an assistant message".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for invocation in self.tool_invocations() {
            if invocation.id.is_empty() {
                return Err(DomainError::TranscriptInvariant(
                    "tool invocation without an id".to_string(),
                ));
            }
            if !seen.insert(invocation.id.as_str()) {
                return Err(DomainError::TranscriptInvariant(format!(
                    "duplicate tool invocation id {}",
                    invocation.id
                )));
            }
        }
        Ok(())
    }

    /// Tool results carried by this message, in order.
    pub fn tool_results_iter(&self) -> impl Iterator<Item = &ToolResult> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolResult(result) => Some(result),
            _ => None,
        })
    }

    /// Concatenated text blocks, if any.
    pub fn text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }
}

/// Ordered, append-only conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Append a message that is not part of a tool exchange.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append an assistant turn together with the user message answering its
    /// tool invocations.
    ///
    /// Every invocation must be answered by exactly one result carrying its
    /// id. Results may arrive in any order; they are stored in invocation
    /// order.
    pub fn push_tool_exchange(
        &mut self,
        assistant: Message,
        mut results: Vec<ToolResult>,
    ) -> DomainResult<()> {
        assistant.check_tool_invocations()?;

        let invocation_ids: Vec<&str> = assistant.tool_invocations().map(|i| i.id.as_str()).collect();
        if invocation_ids.len() != results.len() {
            return Err(DomainError::TranscriptInvariant(format!(
                "{} tool invocations answered by {} results",
                invocation_ids.len(),
                results.len()
            )));
        }

        let mut ordered = Vec::with_capacity(results.len());
        for id in &invocation_ids {
            let position = results
                .iter()
                .position(|r| r.invocation_id == *id)
                .ok_or_else(|| {
                    DomainError::TranscriptInvariant(format!("no result for tool invocation {id}"))
                })?;
            ordered.push(results.swap_remove(position));
        }

        self.messages.push(assistant);
        self.messages.push(Message::tool_results(ordered));
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}
