//! Client-side pacing for the Reddit OAuth API.
//!
//! Requests draw from a token bucket sized to Reddit's published budget. Each
//! response also carries the server's own count (`x-ratelimit-remaining`,
//! `x-ratelimit-reset`); when that count runs out the limiter holds every
//! request until the server window resets.

use reqwest::header::HeaderMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stocksent_core::CoreError;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::sleep;
use tracing::{debug, warn};

const REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RESET_HEADER: &str = "x-ratelimit-reset";

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window: Duration,
    /// Bucket capacity: how many requests may go out back to back.
    pub burst: u32,
    pub max_in_flight: usize,
}

impl RateLimitConfig {
    /// 100 requests per minute for OAuth clients.
    pub fn reddit_oauth() -> Self {
        Self {
            requests_per_window: 100,
            window: Duration::from_secs(60),
            burst: 10,
            max_in_flight: 4,
        }
    }

    fn refill_per_second(&self) -> f64 {
        self.requests_per_window.max(1) as f64 / self.window.as_secs_f64().max(f64::EPSILON)
    }
}

/// Server-side budget reported with a response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerQuota {
    pub remaining: f64,
    pub reset: Duration,
}

impl ServerQuota {
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let number = |name: &str| -> Option<f64> {
            headers
                .get(name)?
                .to_str()
                .ok()?
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
        };
        Some(Self {
            remaining: number(REMAINING_HEADER)?,
            reset: Duration::from_secs_f64(number(RESET_HEADER)?),
        })
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
    paused_until: Option<Instant>,
}

#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    bucket: Mutex<Bucket>,
    in_flight: Arc<Semaphore>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let in_flight = Arc::new(Semaphore::new(config.max_in_flight.max(1)));
        let bucket = Mutex::new(Bucket {
            tokens: config.burst.max(1) as f64,
            last_refill: Instant::now(),
            paused_until: None,
        });
        Self {
            config,
            bucket,
            in_flight,
        }
    }

    /// Wait for an in-flight slot and a token. The slot is held by the permit.
    pub async fn acquire(&self) -> Result<RateLimitPermit, CoreError> {
        let started = Instant::now();
        let slot = self
            .in_flight
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| CoreError::Internal {
                message: format!("rate limiter closed: {}", e),
            })?;

        while let Some(wait) = self.take_token().await {
            debug!("Rate limit reached, waiting {:?}", wait);
            sleep(wait).await;
        }

        Ok(RateLimitPermit {
            _slot: slot,
            waited: started.elapsed(),
        })
    }

    /// Reconcile the local bucket with what Reddit reported.
    pub async fn observe(&self, quota: ServerQuota) {
        let mut bucket = self.bucket.lock().await;
        if quota.remaining < 1.0 {
            warn!("Reddit request budget spent, pausing for {:?}", quota.reset);
            bucket.tokens = 0.0;
            bucket.paused_until = Some(Instant::now() + quota.reset);
        } else {
            bucket.tokens = bucket.tokens.min(quota.remaining);
        }
    }

    pub async fn status(&self) -> RateLimitStatus {
        let mut bucket = self.bucket.lock().await;
        let now = Instant::now();
        self.refill(&mut bucket, now);
        RateLimitStatus {
            available_tokens: bucket.tokens.floor() as u32,
            burst: self.config.burst,
            available_slots: self.in_flight.available_permits(),
            paused_for: bucket
                .paused_until
                .and_then(|until| until.checked_duration_since(now))
                .filter(|d| !d.is_zero()),
        }
    }

    /// `None` once a token was taken, otherwise how long to wait.
    async fn take_token(&self) -> Option<Duration> {
        let mut bucket = self.bucket.lock().await;
        let now = Instant::now();

        if let Some(until) = bucket.paused_until {
            if until > now {
                return Some(until - now);
            }
            // The server window has reset.
            bucket.paused_until = None;
            bucket.tokens = self.config.burst.max(1) as f64;
            bucket.last_refill = now;
        }

        self.refill(&mut bucket, now);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            None
        } else {
            let missing = 1.0 - bucket.tokens;
            Some(Duration::from_secs_f64(
                missing / self.config.refill_per_second(),
            ))
        }
    }

    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        if bucket.paused_until.is_some_and(|until| until > now) {
            return;
        }
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        bucket.tokens = (bucket.tokens + elapsed.as_secs_f64() * self.config.refill_per_second())
            .min(self.config.burst.max(1) as f64);
        bucket.last_refill = now;
    }
}

#[derive(Debug)]
pub struct RateLimitPermit {
    _slot: OwnedSemaphorePermit,
    pub waited: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitStatus {
    pub available_tokens: u32,
    pub burst: u32,
    pub available_slots: usize,
    /// Set while a spent server budget is holding requests back.
    pub paused_for: Option<Duration>,
}
