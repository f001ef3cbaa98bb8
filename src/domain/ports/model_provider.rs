//! Model provider port - interface for LLM backends.

use async_trait::async_trait;

use crate::domain::errors::ProviderError;
use crate::domain::models::{CompletionRequest, NormalizedTurn, RawCompletion, TurnElement};

/// A model provider the benchmark can talk to.
///
/// Implementations own the provider's wire format in both directions: they
/// translate the transcript into a request and classify the elements of the
/// returned completion. Nothing else in the crate looks inside a
/// [`RawCompletion`].
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name used in client identifiers and logs (`anthropic`, `openai`, ...).
    fn name(&self) -> &str;

    /// Model identifier sent to the provider.
    fn model(&self) -> &str;

    /// Ask the model for its next turn.
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<RawCompletion, ProviderError>;

    /// Classify every content element of a completion, in order.
    fn decompose(&self, completion: &RawCompletion) -> Vec<TurnElement>;

    /// Uniform view of a completion.
    fn normalize(&self, completion: &RawCompletion) -> NormalizedTurn {
        NormalizedTurn::from_elements(self.decompose(completion))
    }
}
