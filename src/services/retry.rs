//! Retry policy for transient model-provider failures.

use std::time::Duration;

use crate::domain::errors::{ErrorClass, ProviderError};
use crate::domain::models::{ProviderConfig, RetryConfig};

/// Error classes the dispatcher may retry.
///
/// Providers differ in how they signal transient trouble, so the set is
/// configured per provider rather than hardcoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoverableErrors {
    classes: Vec<ErrorClass>,
}

impl RecoverableErrors {
    /// Nothing is retried.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn of(classes: impl IntoIterator<Item = ErrorClass>) -> Self {
        let mut recoverable = Self::default();
        for class in classes {
            if !recoverable.classes.contains(&class) {
                recoverable.classes.push(class);
            }
        }
        recoverable
    }

    /// Every class that is transient by nature.
    pub fn transient() -> Self {
        Self::of([
            ErrorClass::RateLimited,
            ErrorClass::Overloaded,
            ErrorClass::ServerError,
            ErrorClass::Timeout,
            ErrorClass::Network,
        ])
    }

    /// The classes listed in a provider's `retry_on` setting.
    pub fn from_provider_config(config: &ProviderConfig) -> Self {
        Self::of(config.retry_on.iter().copied())
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn matches(&self, error: &ProviderError) -> bool {
        self.classes.contains(&error.class)
    }
}

/// Retry policy with capped exponential backoff
///
/// Backoff doubles with each retry: initial, 2x, 4x, ... up to the maximum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries before giving up
    max_retries: u32,
    /// Initial backoff duration in milliseconds
    initial_backoff_ms: u64,
    /// Maximum backoff duration in milliseconds
    max_backoff_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff_ms,
            max_backoff_ms: max_backoff_ms.max(initial_backoff_ms),
        }
    }

    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self::new(0, 0, 0)
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            config.initial_backoff_ms,
            config.max_backoff_ms,
        )
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Formula: min(initial_backoff * 2^attempt, max_backoff)
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let backoff_ms = self
            .initial_backoff_ms
            .saturating_mul(2_u64.saturating_pow(attempt))
            .min(self.max_backoff_ms);

        Duration::from_millis(backoff_ms)
    }

    /// Whether a failed call numbered `attempt` (0-indexed) should be retried.
    pub fn should_retry(&self, error: &ProviderError, attempt: u32, recoverable: &RecoverableErrors) -> bool {
        attempt < self.max_retries && recoverable.matches(error)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(class: ErrorClass) -> ProviderError {
        ProviderError::new("test", class, "boom")
    }

    #[test]
    fn test_backoff_calculation() {
        let policy = RetryPolicy::new(5, 1000, 60000);

        assert_eq!(policy.calculate_backoff(0), Duration::from_millis(1000));
        assert_eq!(policy.calculate_backoff(1), Duration::from_millis(2000));
        assert_eq!(policy.calculate_backoff(2), Duration::from_millis(4000));
        assert_eq!(policy.calculate_backoff(5), Duration::from_millis(32000));
        assert_eq!(policy.calculate_backoff(6), Duration::from_millis(60000));
        assert_eq!(policy.calculate_backoff(60), Duration::from_millis(60000));
    }

    #[test]
    fn test_should_retry_only_configured_classes() {
        let policy = RetryPolicy::new(3, 10, 100);
        let recoverable = RecoverableErrors::of([ErrorClass::Overloaded]);

        assert!(policy.should_retry(&error(ErrorClass::Overloaded), 0, &recoverable));
        assert!(!policy.should_retry(&error(ErrorClass::RateLimited), 0, &recoverable));
    }

    #[test]
    fn test_should_not_retry_after_max_attempts() {
        let policy = RetryPolicy::new(3, 10, 100);
        let recoverable = RecoverableErrors::transient();

        assert!(policy.should_retry(&error(ErrorClass::Timeout), 2, &recoverable));
        assert!(!policy.should_retry(&error(ErrorClass::Timeout), 3, &recoverable));
    }

    #[test]
    fn test_disabled_policy_never_retries() {
        let policy = RetryPolicy::disabled();
        assert!(!policy.should_retry(&error(ErrorClass::Network), 0, &RecoverableErrors::transient()));
    }

    #[test]
    fn test_recoverable_from_provider_config() {
        let mut config = ProviderConfig::new("model");
        config.retry_on = vec![ErrorClass::RateLimited, ErrorClass::RateLimited, ErrorClass::Network];

        let recoverable = RecoverableErrors::from_provider_config(&config);
        assert!(recoverable.matches(&error(ErrorClass::Network)));
        assert!(!recoverable.matches(&error(ErrorClass::Authentication)));
        assert!(RecoverableErrors::none().is_empty());
    }
}
