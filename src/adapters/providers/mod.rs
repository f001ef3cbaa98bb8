//! Model provider adapters.
//!
//! Each adapter owns one provider's wire format: it builds requests from the
//! transcript and decomposes completions into [`TurnElement`]s.
//!
//! [`TurnElement`]: crate::domain::models::TurnElement

pub mod anthropic;
pub mod mock;
pub mod openai;

pub use anthropic::{AnthropicConfig, AnthropicProvider};
pub use mock::{MockProvider, MockTurn};
pub use openai::{OpenAiCompatConfig, OpenAiCompatProvider};

use std::sync::Arc;

use crate::domain::errors::{DomainError, DomainResult, ErrorClass, ProviderError};
use crate::domain::models::ProviderConfig;
use crate::domain::ports::ModelProvider;

/// Base URL of the OpenAI API.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Base URL of the Fireworks OpenAI-compatible API.
pub const FIREWORKS_BASE_URL: &str = "https://api.fireworks.ai/inference/v1";

/// Base URL of Gemini's OpenAI-compatible endpoint.
pub const GOOGLE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Providers this client can drive.
pub const SUPPORTED_PROVIDERS: [&str; 4] = ["anthropic", "openai", "fireworks", "google"];

/// Build the adapter for a named provider.
pub fn build_provider(
    name: &str,
    config: &ProviderConfig,
    api_key: Option<String>,
) -> DomainResult<Arc<dyn ModelProvider>> {
    let api_key = api_key.filter(|k| !k.is_empty()).ok_or_else(|| {
        DomainError::Configuration(format!(
            "no API key for provider '{name}' (set api_keys.{name} in credentials.yaml or {}_API_KEY)",
            name.to_uppercase()
        ))
    })?;

    let provider: Arc<dyn ModelProvider> = match name {
        "anthropic" => Arc::new(AnthropicProvider::new(
            AnthropicConfig::from_provider_config(config).with_api_key(api_key),
        )?),
        "openai" => Arc::new(OpenAiCompatProvider::new(
            OpenAiCompatConfig::from_provider_config("openai", OPENAI_BASE_URL, config)
                .with_api_key(api_key),
        )?),
        "fireworks" => Arc::new(OpenAiCompatProvider::new(
            OpenAiCompatConfig::from_provider_config("fireworks", FIREWORKS_BASE_URL, config)
                .with_api_key(api_key),
        )?),
        "google" => Arc::new(OpenAiCompatProvider::new(
            OpenAiCompatConfig::from_provider_config("google", GOOGLE_BASE_URL, config)
                .with_api_key(api_key),
        )?),
        other => {
            return Err(DomainError::Configuration(format!(
                "unknown provider '{other}' (supported: {})",
                SUPPORTED_PROVIDERS.join(", ")
            )))
        }
    };

    Ok(provider)
}

/// Classify a transport-level failure.
pub(crate) fn transport_error(provider: &str, err: &reqwest::Error) -> ProviderError {
    let class = if err.is_timeout() {
        ErrorClass::Timeout
    } else if err.is_connect() || err.is_request() {
        ErrorClass::Network
    } else if err.is_decode() {
        ErrorClass::MalformedResponse
    } else {
        ErrorClass::Other
    };
    ProviderError::new(provider, class, err.to_string())
}

/// Turn a non-success HTTP response into a classified error.
pub(crate) async fn status_error(provider: &str, response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ProviderError::new(provider, classify_status(status, &body), format!("HTTP {status}: {body}"))
}

/// Status classification, refined by the error type some providers put in
/// the body (`{"error": {"type": "overloaded_error"}}`).
pub(crate) fn classify_status(status: u16, body: &str) -> ErrorClass {
    let error_type = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("type").or_else(|| e.get("code")))
                .and_then(|t| t.as_str())
                .map(str::to_string)
        });

    match error_type.as_deref() {
        Some("overloaded_error") => ErrorClass::Overloaded,
        Some("rate_limit_error" | "rate_limit_exceeded") => ErrorClass::RateLimited,
        _ => ErrorClass::from_status(status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status_uses_body_type() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert_eq!(classify_status(500, body), ErrorClass::Overloaded);
        assert_eq!(classify_status(429, "not json"), ErrorClass::RateLimited);
        assert_eq!(classify_status(502, ""), ErrorClass::ServerError);
    }

    #[test]
    fn test_build_provider_requires_key() {
        let config = ProviderConfig::new("gpt-4o");
        let err = build_provider("openai", &config, None).err().unwrap();
        assert!(matches!(err, DomainError::Configuration(_)));
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_google_requires_key() {
        let config = ProviderConfig::new("gemini-2.5-pro");
        let err = build_provider("google", &config, None).err().unwrap();
        assert!(err.to_string().contains("GOOGLE_API_KEY"));
    }

    #[test]
    fn test_build_provider_rejects_unknown() {
        let config = ProviderConfig::new("x");
        let err = build_provider("cohere", &config, Some("key".to_string()))
            .err()
            .unwrap();
        assert!(err.to_string().contains("unknown provider 'cohere'"));
    }

    #[test]
    fn test_build_known_providers() {
        for name in SUPPORTED_PROVIDERS {
            let config = ProviderConfig::new("some-model");
            let provider = build_provider(name, &config, Some("key".to_string())).unwrap();
            assert_eq!(provider.name(), name);
            assert_eq!(provider.model(), "some-model");
        }
    }
}
