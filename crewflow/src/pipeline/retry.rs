//! Whole-run retry with a fixed (or opt-in exponential) delay.
//!
//! The executor wraps a complete pipeline run. A failure anywhere restarts
//! the run from its first stage; earlier successful stages are not kept.

use crate::errors::{CrewflowError, RetriesExhaustedError};
use crate::events::EventSink;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::time::Duration;

/// Delay strategy between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = base (constant)
    #[default]
    Fixed,
    /// delay = base * 2^(attempt - 1), capped at `max_delay_ms`
    Exponential,
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts (including the first).
    pub max_attempts: usize,
    /// Base delay between attempts in milliseconds.
    pub delay_ms: u64,
    /// Delay cap for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
    /// Backoff strategy.
    pub backoff: BackoffStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 5000,
            max_delay_ms: 60_000,
            backoff: BackoffStrategy::Fixed,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_delay_ms(mut self, delay: u64) -> Self {
        self.delay_ms = delay;
        self
    }

    /// Sets the delay cap.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff = strategy;
        self
    }
}

/// State tracking for one retry invocation.
#[derive(Debug, Default)]
pub struct RetryState {
    /// Attempts made so far.
    pub attempt: usize,
}

impl RetryState {
    /// Creates a new retry state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an attempt and returns true if more attempts remain.
    pub fn increment(&mut self, config: &RetryConfig) -> bool {
        self.attempt += 1;
        self.attempt < config.max_attempts
    }

    /// Returns true if retries are exhausted.
    #[must_use]
    pub fn is_exhausted(&self, config: &RetryConfig) -> bool {
        self.attempt >= config.max_attempts
    }

    /// The delay before the next attempt.
    #[must_use]
    pub fn delay(&self, config: &RetryConfig) -> Duration {
        let millis = match config.backoff {
            BackoffStrategy::Fixed => config.delay_ms,
            BackoffStrategy::Exponential => {
                let exponent = u32::try_from(self.attempt.saturating_sub(1)).unwrap_or(u32::MAX);
                config
                    .delay_ms
                    .saturating_mul(2u64.saturating_pow(exponent))
                    .min(config.max_delay_ms)
            }
        };
        Duration::from_millis(millis)
    }
}

/// Classification of one attempt's result.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    /// The attempt succeeded.
    Success(T),
    /// The attempt failed but another may succeed.
    Retryable(CrewflowError),
    /// The attempt failed and retrying cannot help.
    Fatal(CrewflowError),
}

impl<T> From<Result<T, CrewflowError>> for RetryOutcome<T> {
    fn from(result: Result<T, CrewflowError>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(e) if e.is_retryable() => Self::Retryable(e),
            Err(e) => Self::Fatal(e),
        }
    }
}

/// Decision taken after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry(Duration),
    /// No more attempts, give up.
    GiveUp,
}

/// Records a failed attempt and decides what to do next.
#[must_use]
pub fn should_retry(state: &mut RetryState, config: &RetryConfig) -> RetryDecision {
    if state.increment(config) {
        RetryDecision::Retry(state.delay(config))
    } else {
        RetryDecision::GiveUp
    }
}

/// Runs `operation` until it succeeds, fails fatally, or the attempt
/// budget is spent.
///
/// # Errors
///
/// Fatal errors are returned unchanged after the attempt that raised them.
/// Otherwise [`CrewflowError::RetriesExhausted`] carries the attempt count,
/// the last stage attempted and the final cause.
pub async fn execute_with_retry<T, F, Fut>(
    config: &RetryConfig,
    label: &str,
    events: &dyn EventSink,
    mut operation: F,
) -> Result<T, CrewflowError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CrewflowError>>,
{
    let mut state = RetryState::new();

    loop {
        let error = match RetryOutcome::from(operation().await) {
            RetryOutcome::Success(value) => return Ok(value),
            RetryOutcome::Fatal(e) => {
                tracing::error!(operation = label, attempt = state.attempt + 1, error = %e, "Fatal failure, not retrying");
                return Err(e);
            }
            RetryOutcome::Retryable(e) => e,
        };

        let attempt = state.attempt + 1;
        tracing::warn!(
            operation = label,
            attempt,
            max_attempts = config.max_attempts,
            stage = error.stage().unwrap_or("-"),
            error = %error,
            "Attempt failed"
        );
        events.try_emit(
            "retry.attempt_failed",
            Some(json!({
                "operation": label,
                "attempt": attempt,
                "max_attempts": config.max_attempts,
                "stage": error.stage(),
                "error": error.to_string(),
            })),
        );

        match should_retry(&mut state, config) {
            RetryDecision::Retry(delay) => {
                tracing::debug!(
                    operation = label,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Retrying after delay"
                );
                tokio::time::sleep(delay).await;
            }
            RetryDecision::GiveUp => {
                let last_stage = error.stage().map(str::to_string);
                events.try_emit(
                    "retry.exhausted",
                    Some(json!({
                        "operation": label,
                        "attempts": state.attempt,
                        "last_stage": last_stage,
                    })),
                );
                return Err(RetriesExhaustedError {
                    attempts: state.attempt,
                    last_stage,
                    source: Box::new(error),
                }
                .into());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{DependencyUnmetError, PipelineValidationError, ServiceError};
    use crate::events::{CollectingEventSink, NoOpEventSink};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    fn transient(stage: &str) -> CrewflowError {
        CrewflowError::Service {
            stage: stage.to_string(),
            source: ServiceError::transient("503"),
        }
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.delay_ms, 5000);
        assert_eq!(config.backoff, BackoffStrategy::Fixed);
    }

    #[test]
    fn test_fixed_delay_is_constant() {
        let config = RetryConfig::new().with_delay_ms(100);
        let mut state = RetryState::new();
        state.attempt = 1;
        assert_eq!(state.delay(&config), Duration::from_millis(100));
        state.attempt = 5;
        assert_eq!(state.delay(&config), Duration::from_millis(100));
    }

    #[test]
    fn test_exponential_delay_is_capped() {
        let config = RetryConfig::new()
            .with_delay_ms(100)
            .with_max_delay_ms(350)
            .with_backoff(BackoffStrategy::Exponential);
        let mut state = RetryState::new();

        state.attempt = 1;
        assert_eq!(state.delay(&config), Duration::from_millis(100));
        state.attempt = 2;
        assert_eq!(state.delay(&config), Duration::from_millis(200));
        state.attempt = 3;
        assert_eq!(state.delay(&config), Duration::from_millis(350));
    }

    #[test]
    fn test_should_retry_gives_up_at_budget() {
        let config = RetryConfig::new().with_max_attempts(2).with_delay_ms(10);
        let mut state = RetryState::new();

        assert_eq!(
            should_retry(&mut state, &config),
            RetryDecision::Retry(Duration::from_millis(10))
        );
        assert_eq!(should_retry(&mut state, &config), RetryDecision::GiveUp);
        assert!(state.is_exhausted(&config));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let config = RetryConfig::new().with_max_attempts(3).with_delay_ms(1000);
        let calls = &AtomicUsize::new(0);
        let start = Instant::now();

        let result = execute_with_retry(&config, "run", &NoOpEventSink, move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(transient("draft"))
            } else {
                Ok("artifact")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "artifact");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_after_max_attempts_without_trailing_sleep() {
        let config = RetryConfig::new().with_max_attempts(3).with_delay_ms(500);
        let calls = &AtomicUsize::new(0);
        let sink = CollectingEventSink::new();
        let start = Instant::now();

        let err = execute_with_retry(&config, "run", &sink, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(CrewflowError::from(DependencyUnmetError::new(
                "review", "plan", "rejected",
            )))
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
        let CrewflowError::RetriesExhausted(exhausted) = err else {
            panic!("expected RetriesExhausted");
        };
        assert_eq!(exhausted.attempts, 3);
        assert_eq!(exhausted.last_stage.as_deref(), Some("review"));
        assert_eq!(sink.events_of_type("retry.attempt_failed").len(), 3);
        assert_eq!(sink.events_of_type("retry.exhausted").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_is_not_retried() {
        let config = RetryConfig::new().with_max_attempts(5).with_delay_ms(500);
        let calls = &AtomicUsize::new(0);

        let err = execute_with_retry(&config, "run", &NoOpEventSink, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(CrewflowError::from(PipelineValidationError::new("missing input")))
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, CrewflowError::Configuration(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_budget() {
        let config = RetryConfig::new().with_max_attempts(1);
        let start = Instant::now();

        let err = execute_with_retry(&config, "run", &NoOpEventSink, move || async move {
            Err::<(), _>(transient("draft"))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, CrewflowError::RetriesExhausted(ref e) if e.attempts == 1));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
