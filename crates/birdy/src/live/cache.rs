//! In-memory snapshot cache and upstream throttle state.
//!
//! Every time-dependent method takes `now` explicitly so callers (and tests)
//! control the clock.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::model::{AircraftState, DataSource};

/// The last snapshot served, replaced wholesale on every write.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Normalized aircraft states.
    pub payload: Arc<Vec<AircraftState>>,
    /// Monotonic capture time, for age checks.
    pub captured_at: Instant,
    /// Wall-clock capture time, for responses.
    pub captured_at_utc: DateTime<Utc>,
    /// Where the payload came from.
    pub source: DataSource,
}

impl CacheEntry {
    /// Time elapsed since capture.
    #[must_use]
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.captured_at)
    }
}

/// Timestamps that gate outbound requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitState {
    /// When a provider last answered with a rate-limit error.
    pub last_rate_limit: Option<Instant>,
    /// When a provider last answered successfully.
    pub last_successful_request: Option<Instant>,
}

/// Single-slot cache plus rate-limit bookkeeping.
#[derive(Debug)]
pub struct LiveCache {
    entry: Option<CacheEntry>,
    limits: RateLimitState,
    min_request_interval: Duration,
    rate_limit_cooldown: Duration,
}

impl LiveCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new(min_request_interval: Duration, rate_limit_cooldown: Duration) -> Self {
        Self {
            entry: None,
            limits: RateLimitState::default(),
            min_request_interval,
            rate_limit_cooldown,
        }
    }

    /// The current entry, regardless of age.
    #[must_use]
    pub fn read(&self) -> Option<&CacheEntry> {
        self.entry.as_ref()
    }

    /// Replace the current entry and return it.
    pub fn write(
        &mut self,
        payload: Arc<Vec<AircraftState>>,
        source: DataSource,
        now: Instant,
    ) -> &CacheEntry {
        self.entry.insert(CacheEntry {
            payload,
            captured_at: now,
            captured_at_utc: Utc::now(),
            source,
        })
    }

    /// Whether an entry exists and is at most `max_age` old.
    #[must_use]
    pub fn is_fresh(&self, max_age: Duration, now: Instant) -> bool {
        self.entry
            .as_ref()
            .is_some_and(|entry| entry.age(now) <= max_age)
    }

    /// Whether a rate-limit response was seen less than the cooldown ago.
    #[must_use]
    pub fn is_in_cooldown(&self, now: Instant) -> bool {
        self.cooldown_remaining(now).is_some()
    }

    /// Time left until the cooldown ends, if one is active.
    #[must_use]
    pub fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        let limited_at = self.limits.last_rate_limit?;
        let elapsed = now.saturating_duration_since(limited_at);
        (elapsed < self.rate_limit_cooldown).then(|| self.rate_limit_cooldown - elapsed)
    }

    /// Whether the last successful request is more recent than the minimum interval.
    #[must_use]
    pub fn is_below_min_interval(&self, now: Instant) -> bool {
        self.limits
            .last_successful_request
            .is_some_and(|at| now.saturating_duration_since(at) < self.min_request_interval)
    }

    /// Start a cooldown at `now`.
    pub fn record_rate_limit(&mut self, now: Instant) {
        self.limits.last_rate_limit = Some(now);
    }

    /// Stamp a successful request and clear any cooldown.
    pub fn record_success(&mut self, now: Instant) {
        self.limits.last_successful_request = Some(now);
        self.limits.last_rate_limit = None;
    }

    /// Current rate-limit timestamps.
    #[must_use]
    pub fn limits(&self) -> RateLimitState {
        self.limits
    }
}
