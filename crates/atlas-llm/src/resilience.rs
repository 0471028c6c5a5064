//! Retry and circuit-breaker wrappers around providers
//!
//! Transient failures are retried with exponential backoff. Call outcomes
//! feed a rolling-window circuit breaker: once the failure ratio over the
//! window crosses the threshold, calls fail fast until a cooldown elapses,
//! after which a single half-open trial decides whether the breaker closes
//! again. A burst of old failures therefore cannot keep the breaker open
//! once recent calls are healthy.

use async_trait::async_trait;
use atlas_core::{
    AtlasError, AtlasResult, EmbeddingProvider, EmbeddingResponse, GeneratedText, LlmMessage,
    ModelTier, TextGenerationProvider,
};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::ResilienceConfig;

/// Exponential backoff schedule for transient failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ResilienceConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// Delay before the given retry. `attempt` is 1-based: the first retry
    /// waits `base_delay`, doubling thereafter up to `max_delay`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(20);
        let scaled = self.base_delay.saturating_mul(1u32 << exp);
        scaled.min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ResilienceConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed,
    Open { until: Instant },
    HalfOpen { trial_in_flight: bool },
}

struct BreakerInner {
    state: BreakerState,
    /// Rolling window of recent call outcomes, true = success.
    outcomes: VecDeque<bool>,
}

/// Rolling-window circuit breaker.
///
/// The lock is only ever held for bookkeeping, never across an await.
pub struct CircuitBreaker {
    service: String,
    window: usize,
    min_samples: usize,
    failure_ratio: f64,
    cooldown: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(service: impl Into<String>, config: &ResilienceConfig) -> Self {
        Self {
            service: service.into(),
            window: config.breaker_window.max(1),
            min_samples: config.breaker_min_samples.max(1),
            failure_ratio: config.breaker_failure_ratio,
            cooldown: Duration::from_secs(config.breaker_cooldown_secs),
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                outcomes: VecDeque::new(),
            }),
        }
    }

    /// Check whether a call may proceed. While open, fails fast; after the
    /// cooldown, exactly one caller is let through as the half-open trial.
    pub fn acquire(&self) -> AtlasResult<()> {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open { until } => {
                let now = Instant::now();
                if now >= until {
                    debug!(service = %self.service, "circuit breaker half-open, admitting trial");
                    inner.state = BreakerState::HalfOpen { trial_in_flight: true };
                    Ok(())
                } else {
                    Err(AtlasError::unavailable(
                        &self.service,
                        "circuit breaker open",
                        (until - now).as_secs().max(1),
                    ))
                }
            }
            BreakerState::HalfOpen { trial_in_flight } => {
                if trial_in_flight {
                    Err(AtlasError::unavailable(
                        &self.service,
                        "circuit breaker half-open, trial in flight",
                        self.cooldown.as_secs().max(1),
                    ))
                } else {
                    inner.state = BreakerState::HalfOpen { trial_in_flight: true };
                    Ok(())
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        if matches!(inner.state, BreakerState::HalfOpen { .. }) {
            debug!(service = %self.service, "half-open trial succeeded, closing breaker");
            inner.state = BreakerState::Closed;
            inner.outcomes.clear();
            return;
        }
        self.push_outcome(&mut inner, true);
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        if matches!(inner.state, BreakerState::HalfOpen { .. }) {
            warn!(service = %self.service, "half-open trial failed, reopening breaker");
            inner.state = BreakerState::Open { until: Instant::now() + self.cooldown };
            return;
        }
        self.push_outcome(&mut inner, false);
        if self.should_trip(&inner) {
            warn!(service = %self.service, "failure ratio crossed threshold, opening breaker");
            inner.state = BreakerState::Open { until: Instant::now() + self.cooldown };
            inner.outcomes.clear();
        }
    }

    pub fn is_open(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        matches!(inner.state, BreakerState::Open { .. })
    }

    fn push_outcome(&self, inner: &mut BreakerInner, success: bool) {
        if inner.outcomes.len() == self.window {
            inner.outcomes.pop_front();
        }
        inner.outcomes.push_back(success);
    }

    fn should_trip(&self, inner: &BreakerInner) -> bool {
        if inner.outcomes.len() < self.min_samples {
            return false;
        }
        let failures = inner.outcomes.iter().filter(|ok| !**ok).count();
        failures as f64 / inner.outcomes.len() as f64 >= self.failure_ratio
    }
}

/// Run `call` under the retry policy and breaker. Only transient errors are
/// retried; data errors mean the dependency answered, so they count as
/// breaker successes.
async fn call_with_resilience<T, F, Fut>(
    retry: &RetryPolicy,
    breaker: &CircuitBreaker,
    call: F,
) -> AtlasResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = AtlasResult<T>>,
{
    let mut attempt = 1;
    loop {
        breaker.acquire()?;
        match call().await {
            Ok(value) => {
                breaker.record_success();
                return Ok(value);
            }
            Err(err) if err.is_transient() => {
                breaker.record_failure();
                if attempt >= retry.max_attempts {
                    return Err(err);
                }
                let delay = retry.delay(attempt);
                debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                breaker.record_success();
                return Err(err);
            }
        }
    }
}

/// An [`EmbeddingProvider`] wrapped with retry and a circuit breaker.
pub struct ResilientEmbeddings {
    inner: Arc<dyn EmbeddingProvider>,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
}

impl ResilientEmbeddings {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, config: &ResilienceConfig) -> Self {
        let service = format!("{}-embeddings", inner.provider_name());
        Self {
            inner,
            retry: RetryPolicy::from_config(config),
            breaker: CircuitBreaker::new(service, config),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for ResilientEmbeddings {
    async fn embed(&self, text: &str) -> AtlasResult<EmbeddingResponse> {
        call_with_resilience(&self.retry, &self.breaker, || self.inner.embed(text)).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }
}

/// A [`TextGenerationProvider`] wrapped with retry and a circuit breaker.
pub struct ResilientGeneration {
    inner: Arc<dyn TextGenerationProvider>,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
}

impl ResilientGeneration {
    pub fn new(inner: Arc<dyn TextGenerationProvider>, config: &ResilienceConfig) -> Self {
        let service = format!("{}-generation", inner.provider_name());
        Self {
            inner,
            retry: RetryPolicy::from_config(config),
            breaker: CircuitBreaker::new(service, config),
        }
    }
}

#[async_trait]
impl TextGenerationProvider for ResilientGeneration {
    async fn generate(
        &self,
        system_prompt: &str,
        messages: &[LlmMessage],
        tier: ModelTier,
    ) -> AtlasResult<GeneratedText> {
        call_with_resilience(&self.retry, &self.breaker, || {
            self.inner.generate(system_prompt, messages, tier)
        })
        .await
    }

    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbeddingProvider;

    fn tight_config() -> ResilienceConfig {
        ResilienceConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
            breaker_window: 4,
            breaker_min_samples: 4,
            breaker_failure_ratio: 0.5,
            breaker_cooldown_secs: 60,
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let retry = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(500),
        };
        assert_eq!(retry.delay(1), Duration::from_millis(200));
        assert_eq!(retry.delay(2), Duration::from_millis(400));
        assert_eq!(retry.delay(3), Duration::from_millis(500));
    }

    #[test]
    fn breaker_trips_on_failure_ratio() {
        let breaker = CircuitBreaker::new("test", &tight_config());
        breaker.record_success();
        breaker.record_success();
        breaker.record_failure();
        assert!(!breaker.is_open());
        breaker.record_failure();
        assert!(breaker.is_open());
        assert!(breaker.acquire().is_err());
    }

    #[test]
    fn breaker_needs_minimum_samples() {
        let breaker = CircuitBreaker::new("test", &tight_config());
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open());
    }

    #[test]
    fn old_failures_roll_out_of_the_window() {
        let breaker = CircuitBreaker::new("test", &tight_config());
        breaker.record_failure();
        breaker.record_failure();
        // Window of 4: the two failures are displaced by four successes.
        for _ in 0..4 {
            breaker.record_success();
        }
        breaker.record_failure();
        assert!(!breaker.is_open());
    }

    #[test]
    fn half_open_admits_a_single_trial() {
        let config = ResilienceConfig {
            breaker_cooldown_secs: 0,
            ..tight_config()
        };
        let breaker = CircuitBreaker::new("test", &config);
        for _ in 0..4 {
            breaker.record_failure();
        }
        // Cooldown of zero: the first acquire becomes the half-open trial.
        assert!(breaker.acquire().is_ok());
        assert!(breaker.acquire().is_err());
        breaker.record_success();
        assert!(breaker.acquire().is_ok());
        assert!(!breaker.is_open());
    }

    #[test]
    fn failed_trial_reopens() {
        let config = ResilienceConfig {
            breaker_cooldown_secs: 0,
            ..tight_config()
        };
        let breaker = CircuitBreaker::new("test", &config);
        for _ in 0..4 {
            breaker.record_failure();
        }
        assert!(breaker.acquire().is_ok());
        breaker.record_failure();
        // Cooldown is zero, so the reopened breaker immediately admits the
        // next trial rather than failing fast.
        assert!(breaker.acquire().is_ok());
    }

    #[tokio::test]
    async fn retries_transient_failures() {
        let inner = Arc::new(MockEmbeddingProvider::with_dimensions(8));
        inner.fail_next(2);
        let resilient = ResilientEmbeddings::new(inner.clone(), &tight_config());

        let response = resilient.embed("hello world").await.unwrap();
        assert_eq!(response.embedding.len(), 8);
        assert_eq!(inner.calls().len(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let inner = Arc::new(MockEmbeddingProvider::with_dimensions(8));
        inner.fail_all(true);
        let resilient = ResilientEmbeddings::new(inner.clone(), &tight_config());

        let err = resilient.embed("hello").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(inner.calls().len(), 3);
    }
}
