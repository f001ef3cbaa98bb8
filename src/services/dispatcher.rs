//! Completion dispatcher.
//!
//! Single entry point for "ask the model for the next turn". Wraps a
//! [`ModelProvider`] with a fixed-interval gate, a process-wide call counter
//! and optional retries of configured transient failures.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, warn};

use super::retry::{RecoverableErrors, RetryPolicy};
use crate::domain::errors::ProviderError;
use crate::domain::models::{CompletionRequest, NormalizedTurn, ProviderConfig, RawCompletion};
use crate::domain::ports::ModelProvider;

/// Enforces a minimum interval between the end of one call and the start of
/// the next.
///
/// Not a token bucket: there is no burst allowance.
#[derive(Debug)]
pub struct IntervalGate {
    interval: Duration,
    last_call_end: Mutex<Option<Instant>>,
}

impl IntervalGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_call_end: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the interval since the last recorded call end has elapsed.
    pub async fn wait(&self) {
        let last = *self.last_call_end.lock().await;
        if let Some(end) = last {
            let ready_at = end + self.interval;
            if ready_at > Instant::now() {
                debug!(wait_ms = (ready_at - Instant::now()).as_millis() as u64, "Rate limit gate waiting");
                sleep_until(ready_at).await;
            }
        }
    }

    /// Record that a call just finished.
    pub async fn mark_call_end(&self) {
        *self.last_call_end.lock().await = Some(Instant::now());
    }
}

/// Rate-limited, counted access to a model provider.
pub struct CompletionDispatcher {
    provider: Arc<dyn ModelProvider>,
    gate: IntervalGate,
    call_count: AtomicU64,
    retry_policy: RetryPolicy,
    recoverable: RecoverableErrors,
}

impl CompletionDispatcher {
    /// Dispatcher with the given gate interval and no retries.
    pub fn new(provider: Arc<dyn ModelProvider>, interval: Duration) -> Self {
        Self {
            provider,
            gate: IntervalGate::new(interval),
            call_count: AtomicU64::new(0),
            retry_policy: RetryPolicy::disabled(),
            recoverable: RecoverableErrors::none(),
        }
    }

    /// Dispatcher configured from a provider's settings.
    pub fn from_config(
        provider: Arc<dyn ModelProvider>,
        provider_config: &ProviderConfig,
        retry_policy: RetryPolicy,
    ) -> Self {
        let interval = Duration::from_secs_f64(provider_config.rate_limit_secs.max(0.0));
        Self::new(provider, interval)
            .with_retry(retry_policy, RecoverableErrors::from_provider_config(provider_config))
    }

    pub fn with_retry(mut self, policy: RetryPolicy, recoverable: RecoverableErrors) -> Self {
        self.retry_policy = policy;
        self.recoverable = recoverable;
        self
    }

    pub fn provider(&self) -> &dyn ModelProvider {
        self.provider.as_ref()
    }

    /// Total provider calls made through this dispatcher, including failed ones.
    pub fn total_call_count(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Ask the provider for the next turn.
    ///
    /// Every provider invocation waits for the gate and increments the call
    /// counter, whether it succeeds or not. Failures whose class is
    /// recoverable are retried with backoff until the policy gives up.
    pub async fn next_turn(&self, request: &CompletionRequest<'_>) -> Result<RawCompletion, ProviderError> {
        let mut attempt = 0;

        loop {
            self.gate.wait().await;
            let result = self.provider.complete(request).await;
            self.gate.mark_call_end().await;
            let total = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;

            match result {
                Ok(completion) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "Provider call succeeded after retries");
                    }
                    debug!(total_calls = total, provider = self.provider.name(), "Provider call completed");
                    return Ok(completion);
                }
                Err(err) => {
                    if self.retry_policy.should_retry(&err, attempt, &self.recoverable) {
                        let backoff = self.retry_policy.calculate_backoff(attempt);
                        warn!(
                            "Attempt {} failed with transient error: {}. Retrying in {:?}...",
                            attempt + 1,
                            err,
                            backoff
                        );
                        sleep(backoff).await;
                        attempt += 1;
                    } else {
                        if attempt > 0 {
                            warn!("Provider call failed after {} attempts: {}", attempt + 1, err);
                        }
                        return Err(err);
                    }
                }
            }
        }
    }

    /// Ask for the next turn and normalize it with the provider's adapter.
    pub async fn next_normalized_turn(
        &self,
        request: &CompletionRequest<'_>,
    ) -> Result<NormalizedTurn, ProviderError> {
        let completion = self.next_turn(request).await?;
        Ok(self.provider.normalize(&completion))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::providers::mock::{MockProvider, MockTurn};
    use crate::domain::errors::ErrorClass;
    use crate::domain::models::Message;

    fn messages() -> Vec<Message> {
        vec![Message::user_text("hello")]
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_spaces_calls_from_previous_end() {
        let provider = Arc::new(MockProvider::new(vec![
            MockTurn::new().text("one"),
            MockTurn::new().text("two"),
            MockTurn::new().text("three"),
        ]));
        let dispatcher = CompletionDispatcher::new(provider.clone(), Duration::from_secs(5));
        let messages = messages();
        let request = CompletionRequest::new(&messages);

        for _ in 0..3 {
            dispatcher.next_turn(&request).await.unwrap();
        }

        let starts = provider.call_starts().await;
        assert_eq!(starts.len(), 3);
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(5));
        }
        assert_eq!(dispatcher.total_call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_call_is_not_delayed() {
        let provider = Arc::new(MockProvider::new(vec![MockTurn::new().text("hi")]));
        let dispatcher = CompletionDispatcher::new(provider, Duration::from_secs(30));
        let messages = messages();

        let start = Instant::now();
        dispatcher.next_turn(&CompletionRequest::new(&messages)).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_counter_increments_on_failure() {
        let provider = Arc::new(MockProvider::new(vec![MockTurn::failure(ErrorClass::InvalidRequest)]));
        let dispatcher = CompletionDispatcher::new(provider, Duration::ZERO)
            .with_retry(RetryPolicy::new(3, 1, 1), RecoverableErrors::transient());
        let messages = messages();

        let err = dispatcher.next_turn(&CompletionRequest::new(&messages)).await.unwrap_err();
        assert_eq!(err.class, ErrorClass::InvalidRequest);
        assert_eq!(dispatcher.total_call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recoverable_errors_are_retried() {
        let provider = Arc::new(MockProvider::new(vec![
            MockTurn::failure(ErrorClass::Overloaded),
            MockTurn::failure(ErrorClass::Overloaded),
            MockTurn::new().text("finally"),
        ]));
        let dispatcher = CompletionDispatcher::new(provider.clone(), Duration::ZERO)
            .with_retry(RetryPolicy::new(3, 100, 1000), RecoverableErrors::of([ErrorClass::Overloaded]));
        let messages = messages();

        let turn = dispatcher
            .next_normalized_turn(&CompletionRequest::new(&messages))
            .await
            .unwrap();
        assert_eq!(turn.text.as_deref(), Some("finally"));
        assert_eq!(dispatcher.total_call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_give_up_at_policy_limit() {
        let provider = Arc::new(MockProvider::new(vec![
            MockTurn::failure(ErrorClass::RateLimited),
            MockTurn::failure(ErrorClass::RateLimited),
            MockTurn::failure(ErrorClass::RateLimited),
            MockTurn::new().text("never reached"),
        ]));
        let dispatcher = CompletionDispatcher::new(provider, Duration::ZERO)
            .with_retry(RetryPolicy::new(2, 100, 1000), RecoverableErrors::transient());
        let messages = messages();

        let err = dispatcher.next_turn(&CompletionRequest::new(&messages)).await.unwrap_err();
        assert_eq!(err.class, ErrorClass::RateLimited);
        assert_eq!(dispatcher.total_call_count(), 3);
    }

    #[test]
    fn test_from_config_uses_rate_limit() {
        let provider = Arc::new(MockProvider::new(vec![]));
        let mut config = ProviderConfig::new("mock-model");
        config.rate_limit_secs = 1.5;

        let dispatcher = CompletionDispatcher::from_config(provider, &config, RetryPolicy::default());
        assert_eq!(dispatcher.gate.interval(), Duration::from_millis(1500));
        assert_eq!(dispatcher.total_call_count(), 0);
    }
}
