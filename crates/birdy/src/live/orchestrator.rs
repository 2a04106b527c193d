//! Per-request decision between cache, upstream fetch and mock data.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::cache::{CacheEntry, LiveCache};
use crate::config::{Config, Credentials};
use crate::error::Result;
use crate::feed::{self, FeedError, FeedProvider, ProviderSlot};
use crate::mock::MockGenerator;
use crate::model::{AircraftState, DataSource, LiveStats};

/// Timing and sizing knobs of the live pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveSettings {
    /// How long a snapshot is served without refetching.
    pub cache_duration: Duration,
    /// Minimum time between two successful upstream requests.
    pub min_request_interval: Duration,
    /// How long to stay away after a rate-limit response.
    pub rate_limit_cooldown: Duration,
    /// Aircraft per mock snapshot.
    pub mock_aircraft_count: usize,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            cache_duration: Duration::from_secs(30),
            min_request_interval: Duration::from_secs(10),
            rate_limit_cooldown: Duration::from_secs(300),
            mock_aircraft_count: 500,
        }
    }
}

impl LiveSettings {
    /// Read the settings from the `live` config section.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            cache_duration: config.cache_duration(),
            min_request_interval: config.min_request_interval(),
            rate_limit_cooldown: config.rate_limit_cooldown(),
            mock_aircraft_count: config.live.mock_aircraft_count,
        }
    }
}

/// Body of `GET /api/aircraft/live`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveResponse {
    pub aircraft: Arc<Vec<AircraftState>>,
    pub stats: LiveStats,
    /// Capture time of the payload.
    pub timestamp: DateTime<Utc>,
    pub from_cache: bool,
    pub data_source: DataSource,
    /// Whether any provider credential is configured.
    pub authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limited: Option<bool>,
    /// Seconds until the rate-limit cooldown ends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_time: Option<u64>,
    /// Age of a cached payload in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_age: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LiveResponse {
    fn fresh(entry: &CacheEntry, authenticated: bool) -> Self {
        Self {
            aircraft: Arc::clone(&entry.payload),
            stats: LiveStats::from_states(&entry.payload),
            timestamp: entry.captured_at_utc,
            from_cache: false,
            data_source: entry.source,
            authenticated,
            rate_limited: None,
            wait_time: None,
            cache_age: None,
            error: None,
            message: None,
        }
    }

    fn cached(entry: &CacheEntry, authenticated: bool, now: Instant) -> Self {
        Self {
            from_cache: true,
            cache_age: Some(entry.age(now).as_secs()),
            ..Self::fresh(entry, authenticated)
        }
    }

    fn rate_limited(mut self, remaining: Option<Duration>) -> Self {
        self.rate_limited = Some(true);
        self.wait_time = remaining.map(ceil_secs);
        self
    }

    fn failed(mut self, err: &FeedError, fallback: &str) -> Self {
        self.error = Some(err.to_string());
        self.message = Some(format!("{} unavailable, serving {fallback} data", err.provider()));
        self
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

/// Owns the live cache and decides how each snapshot request is served.
///
/// The cache lock is held across the upstream fetch, so concurrent requests
/// wait for one fetch instead of each issuing their own.
#[derive(Debug)]
pub struct LiveOrchestrator {
    settings: LiveSettings,
    providers: Vec<ProviderSlot>,
    mock: MockGenerator,
    cache: Mutex<LiveCache>,
}

impl LiveOrchestrator {
    /// Create an orchestrator over providers listed in preference order.
    #[must_use]
    pub fn new(settings: LiveSettings, providers: Vec<ProviderSlot>) -> Self {
        Self {
            mock: MockGenerator::new(settings.mock_aircraft_count),
            cache: Mutex::new(LiveCache::new(
                settings.min_request_interval,
                settings.rate_limit_cooldown,
            )),
            settings,
            providers,
        }
    }

    /// Build the orchestrator with the configured providers and credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &Config, credentials: &Credentials) -> Result<Self> {
        let providers = feed::providers_from_config(config, credentials)?;
        Ok(Self::new(LiveSettings::from_config(config), providers))
    }

    /// Whether any provider has a credential.
    #[must_use]
    pub fn authenticated(&self) -> bool {
        self.providers.iter().any(|slot| slot.api_key.is_some())
    }

    fn active_provider(&self) -> Option<(&dyn FeedProvider, &str)> {
        self.providers.iter().find_map(|slot| {
            slot.api_key
                .as_deref()
                .map(|key| (slot.provider.as_ref(), key))
        })
    }

    /// Serve one live snapshot request. Never fails.
    pub async fn snapshot(&self) -> LiveResponse {
        let mut cache = self.cache.lock().await;
        let authenticated = self.authenticated();
        let now = Instant::now();

        if let Some(remaining) = cache.cooldown_remaining(now) {
            if let Some(entry) = cache.read() {
                debug!(wait_secs = remaining.as_secs(), "in rate-limit cooldown, serving cache");
                return LiveResponse::cached(entry, authenticated, now).rate_limited(Some(remaining));
            }
        } else if cache.is_below_min_interval(now) {
            if let Some(entry) = cache.read() {
                debug!("below minimum request interval, serving cache");
                return LiveResponse::cached(entry, authenticated, now);
            }
        } else if cache.is_fresh(self.settings.cache_duration, now) {
            if let Some(entry) = cache.read() {
                debug!("cache fresh");
                return LiveResponse::cached(entry, authenticated, now);
            }
        }

        let mut failure = None;
        let mut limited = false;
        if let Some((provider, key)) = self.active_provider() {
            match provider.fetch(key).await {
                Ok(states) => {
                    let now = Instant::now();
                    info!(provider = provider.name(), count = states.len(), "live snapshot fetched");
                    cache.record_success(now);
                    let entry = cache.write(Arc::new(states), provider.source(), now);
                    return LiveResponse::fresh(entry, authenticated);
                }
                Err(err) if err.is_rate_limited() => {
                    let now = Instant::now();
                    warn!(provider = provider.name(), error = %err, "provider rate limited");
                    cache.record_rate_limit(now);
                    if let Some(entry) = cache.read() {
                        return LiveResponse::cached(entry, authenticated, now)
                            .rate_limited(cache.cooldown_remaining(now))
                            .failed(&err, "cached");
                    }
                    limited = true;
                    failure = Some(err);
                }
                Err(err) => {
                    warn!(provider = provider.name(), error = %err, "live fetch failed");
                    failure = Some(err);
                }
            }
        } else {
            debug!("no provider credentials configured");
        }

        let now = Instant::now();
        let states = self.mock.generate(Utc::now().timestamp());
        debug!(count = states.len(), "serving mock snapshot");
        let entry = cache.write(Arc::new(states), DataSource::Mock, now);
        let mut response = LiveResponse::fresh(entry, authenticated);
        if limited {
            response = response.rate_limited(cache.cooldown_remaining(now));
        }
        match failure {
            Some(err) => response.failed(&err, "mock"),
            None => response,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{advance, sleep};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Mode {
        Succeed(usize),
        RateLimited,
        Fail,
    }

    #[derive(Debug)]
    struct FakeProvider {
        source: DataSource,
        mode: std::sync::Mutex<Mode>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        fn new(source: DataSource, mode: Mode) -> Arc<Self> {
            Arc::new(Self {
                source,
                mode: std::sync::Mutex::new(mode),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow(source: DataSource, mode: Mode, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                source,
                mode: std::sync::Mutex::new(mode),
                delay,
                calls: AtomicUsize::new(0),
            })
        }

        fn set_mode(&self, mode: Mode) {
            *self.mode.lock().unwrap() = mode;
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FeedProvider for FakeProvider {
        fn source(&self) -> DataSource {
            self.source
        }

        async fn fetch(&self, _api_key: &str) -> std::result::Result<Vec<AircraftState>, FeedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            let mode = *self.mode.lock().unwrap();
            match mode {
                Mode::Succeed(n) => Ok((0..n)
                    .map(|i| AircraftState {
                        icao24: format!("{i:06x}"),
                        latitude: Some(10.0),
                        longitude: Some(20.0),
                        origin_country: Some("France".to_string()),
                        ..AircraftState::default()
                    })
                    .collect()),
                Mode::RateLimited => Err(FeedError::Http {
                    provider: self.name(),
                    status: 429,
                    message: "Too Many Requests".to_string(),
                }),
                Mode::Fail => Err(FeedError::Http {
                    provider: self.name(),
                    status: 503,
                    message: "Service Unavailable".to_string(),
                }),
            }
        }
    }

    fn settings() -> LiveSettings {
        LiveSettings {
            mock_aircraft_count: 25,
            ..LiveSettings::default()
        }
    }

    fn orchestrator(provider: &Arc<FakeProvider>) -> LiveOrchestrator {
        LiveOrchestrator::new(
            settings(),
            vec![ProviderSlot::new(provider.clone(), Some("key".to_string()))],
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_cold_cache_without_credentials_serves_mock() {
        let live = LiveOrchestrator::new(settings(), Vec::new());
        let response = live.snapshot().await;

        assert_eq!(response.data_source, DataSource::Mock);
        assert!(!response.authenticated);
        assert!(!response.from_cache);
        assert_eq!(response.aircraft.len(), 25);
        assert_eq!(response.stats.total, 25);
        assert!(response.error.is_none());
        assert!(response.rate_limited.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_request_within_min_interval_is_cached() {
        let provider = FakeProvider::new(DataSource::Aviationstack, Mode::Succeed(3));
        let live = orchestrator(&provider);

        let first = live.snapshot().await;
        assert!(!first.from_cache);
        assert_eq!(first.data_source, DataSource::Aviationstack);
        assert!(first.authenticated);

        advance(Duration::from_secs(5)).await;
        let second = live.snapshot().await;
        assert!(second.from_cache);
        assert_eq!(second.cache_age, Some(5));
        assert!(Arc::ptr_eq(&first.aircraft, &second.aircraft));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_cache_then_refetch_after_expiry() {
        let provider = FakeProvider::new(DataSource::Aviationstack, Mode::Succeed(3));
        let live = orchestrator(&provider);
        live.snapshot().await;

        advance(Duration::from_secs(15)).await;
        assert!(live.snapshot().await.from_cache);
        assert_eq!(provider.calls(), 1);

        advance(Duration::from_secs(16)).await;
        let response = live.snapshot().await;
        assert!(!response.from_cache);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_is_cached_but_not_a_success() {
        let live = LiveOrchestrator::new(settings(), Vec::new());
        let first = live.snapshot().await;

        advance(Duration::from_secs(1)).await;
        let second = live.snapshot().await;
        assert!(second.from_cache);
        assert!(Arc::ptr_eq(&first.aircraft, &second.aircraft));
        assert!(live
            .cache
            .lock()
            .await
            .limits()
            .last_successful_request
            .is_none());

        advance(Duration::from_secs(30)).await;
        let third = live.snapshot().await;
        assert!(!third.from_cache);
        assert!(!Arc::ptr_eq(&first.aircraft, &third.aircraft));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_without_cache_falls_back_to_mock_then_cools_down() {
        let provider = FakeProvider::new(DataSource::Aviationstack, Mode::RateLimited);
        let live = orchestrator(&provider);

        let first = live.snapshot().await;
        assert_eq!(first.data_source, DataSource::Mock);
        assert_eq!(first.rate_limited, Some(true));
        assert!(first.error.as_deref().unwrap().contains("429"));

        advance(Duration::from_secs(1)).await;
        let second = live.snapshot().await;
        assert_eq!(second.rate_limited, Some(true));
        assert!(second.from_cache);
        assert_eq!(second.wait_time, Some(299));
        assert_eq!(provider.calls(), 1);

        provider.set_mode(Mode::Succeed(4));
        advance(Duration::from_secs(299)).await;
        let third = live.snapshot().await;
        assert_eq!(provider.calls(), 2);
        assert_eq!(third.data_source, DataSource::Aviationstack);
        assert!(third.rate_limited.is_none());
        assert_eq!(third.aircraft.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_with_cache_serves_cached_provider_data() {
        let provider = FakeProvider::new(DataSource::Airlabs, Mode::Succeed(2));
        let live = orchestrator(&provider);
        let first = live.snapshot().await;

        provider.set_mode(Mode::RateLimited);
        advance(Duration::from_secs(31)).await;
        let second = live.snapshot().await;
        assert_eq!(provider.calls(), 2);
        assert!(second.from_cache);
        assert_eq!(second.rate_limited, Some(true));
        assert_eq!(second.wait_time, Some(300));
        assert_eq!(second.data_source, DataSource::Airlabs);
        assert!(Arc::ptr_eq(&first.aircraft, &second.aircraft));
        assert!(second.error.is_some());
        assert!(second.message.as_deref().unwrap().contains("cached"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_failure_does_not_start_cooldown() {
        let provider = FakeProvider::new(DataSource::Aviationstack, Mode::Fail);
        let live = orchestrator(&provider);

        let first = live.snapshot().await;
        assert_eq!(first.data_source, DataSource::Mock);
        assert!(first.rate_limited.is_none());
        assert!(first.error.as_deref().unwrap().contains("503"));
        assert!(first.message.as_deref().unwrap().contains("mock"));

        advance(Duration::from_secs(31)).await;
        live.snapshot().await;
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_keyed_provider_is_used() {
        let aviationstack = FakeProvider::new(DataSource::Aviationstack, Mode::Succeed(1));
        let airlabs = FakeProvider::new(DataSource::Airlabs, Mode::Succeed(2));
        let live = LiveOrchestrator::new(
            settings(),
            vec![
                ProviderSlot::new(aviationstack.clone(), None),
                ProviderSlot::new(airlabs.clone(), Some("key".to_string())),
            ],
        );

        let response = live.snapshot().await;
        assert_eq!(response.data_source, DataSource::Airlabs);
        assert_eq!(aviationstack.calls(), 0);
        assert_eq!(airlabs.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_share_one_fetch() {
        let provider = FakeProvider::slow(
            DataSource::Aviationstack,
            Mode::Succeed(5),
            Duration::from_secs(2),
        );
        let live = orchestrator(&provider);

        let (a, b) = tokio::join!(live.snapshot(), live.snapshot());
        assert_eq!(provider.calls(), 1);
        assert!(Arc::ptr_eq(&a.aircraft, &b.aircraft));
        assert!(a.from_cache != b.from_cache);
    }

    #[test]
    fn test_response_wire_shape() {
        let entry = CacheEntry {
            payload: Arc::new(Vec::new()),
            captured_at: Instant::now(),
            captured_at_utc: Utc::now(),
            source: DataSource::Mock,
        };
        let json = serde_json::to_value(LiveResponse::fresh(&entry, false)).unwrap();
        assert_eq!(json["dataSource"], "mock");
        assert_eq!(json["fromCache"], false);
        assert_eq!(json["authenticated"], false);
        assert_eq!(json["stats"]["total"], 0);
        assert!(json.get("rateLimited").is_none());
        assert!(json.get("waitTime").is_none());
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_ceil_secs() {
        assert_eq!(ceil_secs(Duration::from_secs(3)), 3);
        assert_eq!(ceil_secs(Duration::from_millis(2001)), 3);
        assert_eq!(ceil_secs(Duration::ZERO), 0);
    }
}
