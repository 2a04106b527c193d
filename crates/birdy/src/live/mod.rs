//! Live snapshot pipeline behind `/api/aircraft/live`.
//!
//! [`LiveOrchestrator`] serves each request from the cache, a provider fetch,
//! or the mock generator, in that order of preference.

pub mod cache;
pub mod orchestrator;

pub use cache::{CacheEntry, LiveCache, RateLimitState};
pub use orchestrator::{LiveOrchestrator, LiveResponse, LiveSettings};
