//! Retries with exponential backoff behind a circuit breaker.
//!
//! Whether an error is worth another attempt comes from
//! [`ErrorExt::is_retryable`]; a server-provided delay
//! ([`ErrorExt::retry_after`]) takes precedence over the computed backoff.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use stocksent_core::{CoreError, ErrorExt};
use tokio::time::sleep;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts per operation, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Up to this fraction of the backoff is added as random jitter.
    pub jitter_factor: f64,
    /// Consecutive failed operations before the circuit opens.
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    pub fn reddit() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            jitter_factor: 0.2,
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(120),
            ..Self::default()
        }
    }

    /// Backoff before retry number `retry` (0-based), jittered and capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(retry.min(32) as i32);
        let exponential = self.base_delay.mul_f64(factor).min(self.max_delay);

        let jitter_ms = (exponential.as_millis() as f64 * self.jitter_factor.clamp(0.0, 1.0)) as u64;
        let jitter = Duration::from_millis(fastrand::u64(0..=jitter_ms));
        (exponential + jitter).min(self.max_delay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open { since: Instant },
    /// One trial request is let through after the recovery timeout.
    HalfOpen,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: CircuitState,
    consecutive_failures: u32,
    failure_threshold: u32,
    recovery_timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            failure_threshold: config.failure_threshold.max(1),
            recovery_timeout: config.recovery_timeout,
        }
    }

    /// `Err` with the remaining wait while the circuit is open.
    pub fn check(&mut self) -> Result<(), Duration> {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open { since } => {
                let elapsed = since.elapsed();
                if elapsed >= self.recovery_timeout {
                    debug!("Circuit half-open, letting a trial request through");
                    self.state = CircuitState::HalfOpen;
                    Ok(())
                } else {
                    Err(self.recovery_timeout - elapsed)
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        if self.state == CircuitState::HalfOpen {
            info!("Reddit requests recovered, circuit closed");
        }
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        let trip = match self.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => self.consecutive_failures >= self.failure_threshold,
            CircuitState::Open { .. } => false,
        };
        if trip {
            warn!(
                "Circuit opened after {} consecutive failures",
                self.consecutive_failures
            );
            self.state = CircuitState::Open {
                since: Instant::now(),
            };
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, CircuitState::Open { .. })
    }
}

/// Runs async operations with retries and one circuit breaker shared by all.
#[derive(Debug)]
pub struct RetryExecutor {
    config: RetryConfig,
    breaker: Mutex<CircuitBreaker>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            breaker: Mutex::new(CircuitBreaker::new(&config)),
            config,
        }
    }

    /// Delay before the next attempt, or `None` to give up.
    fn next_delay(&self, error: &CoreError, retry: u32) -> Option<Duration> {
        if retry + 1 >= self.config.max_attempts.max(1) || !error.is_retryable() {
            return None;
        }
        Some(
            error
                .retry_after()
                .unwrap_or_else(|| self.config.backoff(retry)),
        )
    }

    /// Run `operation` until it succeeds, fails permanently or runs out of
    /// attempts. The last error is returned unchanged.
    pub async fn execute<F, Fut, T>(&self, name: &str, operation: F) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        if let Err(wait) = lock(&self.breaker).check() {
            warn!("Skipping {}: circuit open for another {:?}", name, wait);
            return Err(CoreError::Internal {
                message: format!("circuit open after repeated Reddit failures, retry in {:?}", wait),
            });
        }

        let mut retry = 0;
        loop {
            let error = match operation().await {
                Ok(value) => {
                    lock(&self.breaker).record_success();
                    if retry > 0 {
                        info!("{} succeeded after {} retries", name, retry);
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            match self.next_delay(&error, retry) {
                Some(delay) => {
                    info!("Retrying {} in {:?}: {}", name, delay, error);
                    retry += 1;
                    sleep(delay).await;
                }
                None => {
                    lock(&self.breaker).record_failure();
                    warn!("{} failed after {} attempts: {}", name, retry + 1, error);
                    return Err(error);
                }
            }
        }
    }

    pub fn circuit_state(&self) -> CircuitState {
        lock(&self.breaker).state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use stocksent_core::RedditApiError;

    fn fast_config() -> RetryConfig {
        RetryConfig {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            ..RetryConfig::default()
        }
    }

    fn server_error() -> CoreError {
        CoreError::RedditApi(RedditApiError::ServerError { status_code: 503 })
    }

    #[test]
    fn test_breaker_opens_at_threshold() {
        let mut breaker = CircuitBreaker::new(&RetryConfig {
            failure_threshold: 2,
            ..RetryConfig::default()
        });

        breaker.record_failure();
        assert!(breaker.check().is_ok());

        breaker.record_failure();
        assert!(breaker.is_open());
        let wait = breaker.check().unwrap_err();
        assert!(wait <= Duration::from_secs(60));
    }

    #[test]
    fn test_breaker_half_open_trial() {
        let mut breaker = CircuitBreaker::new(&RetryConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::ZERO,
            ..RetryConfig::default()
        });

        breaker.record_failure();
        assert!(breaker.is_open());
        assert!(breaker.check().is_ok());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        // A failed trial reopens immediately.
        breaker.record_failure();
        assert!(breaker.is_open());

        assert!(breaker.check().is_ok());
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let config = RetryConfig {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            jitter_factor: 0.0,
            ..RetryConfig::default()
        };
        assert_eq!(config.backoff(0), Duration::from_secs(1));
        assert_eq!(config.backoff(1), Duration::from_secs(2));
        assert_eq!(config.backoff(3), Duration::from_secs(8));
        assert_eq!(config.backoff(10), Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let config = RetryConfig {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            jitter_factor: 0.5,
            ..RetryConfig::default()
        };
        for _ in 0..20 {
            let delay = config.backoff(1);
            assert!(delay >= Duration::from_secs(2));
            assert!(delay <= Duration::from_secs(3));
        }
    }

    #[test]
    fn test_server_delay_wins_over_backoff() {
        let executor = RetryExecutor::new(fast_config());
        let rate_limited = CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 7 });
        assert_eq!(
            executor.next_delay(&rate_limited, 0),
            Some(Duration::from_secs(7))
        );

        let forbidden = CoreError::RedditApi(RedditApiError::Forbidden {
            resource: "/r/private/search".to_string(),
        });
        assert_eq!(executor.next_delay(&forbidden, 0), None);

        // Out of attempts.
        assert_eq!(executor.next_delay(&server_error(), 2), None);
    }

    #[tokio::test]
    async fn test_success_after_retries() {
        let executor = RetryExecutor::new(fast_config());
        let attempts = AtomicU32::new(0);

        let result = executor
            .execute("search", || async {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(server_error())
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(executor.circuit_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let executor = RetryExecutor::new(fast_config());
        let attempts = AtomicU32::new(0);

        let result: Result<(), _> = executor
            .execute("search", || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(CoreError::RedditApi(RedditApiError::InvalidToken))
            })
            .await;

        assert!(matches!(
            result,
            Err(CoreError::RedditApi(RedditApiError::InvalidToken))
        ));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_open_circuit_blocks_requests() {
        let executor = RetryExecutor::new(RetryConfig {
            max_attempts: 1,
            failure_threshold: 1,
            ..fast_config()
        });
        let attempts = AtomicU32::new(0);
        let failing = || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(server_error())
        };

        assert!(executor.execute("search", failing).await.is_err());
        assert!(matches!(executor.circuit_state(), CircuitState::Open { .. }));

        let blocked = executor.execute("search", failing).await;
        assert!(matches!(blocked, Err(CoreError::Internal { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
