//! Domain errors for the SherlockBench client.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Normalized classification of a model-provider failure.
///
/// Providers report transient failures in different ways (HTTP status codes,
/// error payload types, transport errors). Adapters map every failure onto one
/// of these classes so the completion dispatcher can decide whether to retry
/// without knowing which provider produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// 429 or an explicit rate-limit error payload
    RateLimited,
    /// Provider is overloaded (Anthropic 529)
    Overloaded,
    /// Any other 5xx response
    ServerError,
    /// Request timed out
    Timeout,
    /// Connection could not be established or was reset
    Network,
    /// 400/404/422: the request itself is wrong
    InvalidRequest,
    /// 401/403
    Authentication,
    /// Provider answered but the body could not be understood
    MalformedResponse,
    /// Anything else
    Other,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::Overloaded => "overloaded",
            Self::ServerError => "server_error",
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::InvalidRequest => "invalid_request",
            Self::Authentication => "authentication",
            Self::MalformedResponse => "malformed_response",
            Self::Other => "other",
        }
    }

    /// Classify an HTTP status code returned by a provider.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimited,
            529 => Self::Overloaded,
            408 => Self::Timeout,
            401 | 403 => Self::Authentication,
            400 | 404 | 413 | 422 => Self::InvalidRequest,
            500..=599 => Self::ServerError,
            _ => Self::Other,
        }
    }

    /// Classes that are worth retrying by default.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Overloaded | Self::ServerError | Self::Timeout | Self::Network
        )
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed call to a model provider.
#[derive(Debug, Clone, Error)]
#[error("{provider} request failed ({class}): {message}")]
pub struct ProviderError {
    pub provider: String,
    pub class: ErrorClass,
    pub message: String,
}

impl ProviderError {
    pub fn new(provider: impl Into<String>, class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            class,
            message: message.into(),
        }
    }
}

/// A failed exchange with the oracle server.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Oracle request to {operation} failed: {message}")]
    Transport { operation: String, message: String },

    #[error("Oracle returned HTTP {status} for {operation}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("Could not decode oracle response from {operation}: {message}")]
    Decode { operation: String, message: String },

    #[error("Oracle response from {operation} is missing field '{field}'")]
    MissingField { operation: String, field: String },
}

/// Domain-level errors that can occur while running a benchmark.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("LLM ran out of messages after {limit} turns")]
    MessageLimitExceeded { limit: u32 },

    #[error("LLM did not call the {tool} tool when it was required")]
    ToolAbsent { tool: String },

    #[error("Transcript invariant violated: {0}")]
    TranscriptInvariant(String),

    #[error("Malformed structured output: {0}")]
    MalformedStructuredOutput(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to reset attempt {0} on the oracle")]
    ResumeResetFailed(Uuid),

    #[error("Run {run_id} cannot be resumed: {reason}")]
    ResumeUnavailable { run_id: Uuid, reason: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl DomainError {
    /// Stable name of the error variant, stored as `error_type` in failure snapshots.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MessageLimitExceeded { .. } => "MessageLimitExceeded",
            Self::ToolAbsent { .. } => "ToolAbsent",
            Self::TranscriptInvariant(_) => "TranscriptInvariant",
            Self::MalformedStructuredOutput(_) => "MalformedStructuredOutput",
            Self::Provider(_) => "ProviderError",
            Self::Oracle(_) => "OracleError",
            Self::DatabaseError(_) => "DatabaseError",
            Self::SerializationError(_) => "SerializationError",
            Self::Configuration(_) => "ConfigurationError",
            Self::ResumeResetFailed(_) => "ResumeResetFailed",
            Self::ResumeUnavailable { .. } => "ResumeUnavailable",
            Self::InvalidArgument(_) => "InvalidArgument",
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
