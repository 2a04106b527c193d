//! `birdy` - Flight-tracking viewer backend
//!
//! This library provides the live aircraft pipeline (provider feeds, cache,
//! rate-limit handling and mock fallback), the `SQLite` store of collected
//! snapshots and registry data, the HTTP API over both, and the collectors and
//! terminal viewer built on top of them.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod collector;
pub mod config;
pub mod error;
pub mod feed;
pub mod live;
pub mod logging;
pub mod metadata;
pub mod mock;
pub mod model;
pub mod server;
pub mod storage;
pub mod viewer;

pub use config::{Config, Credentials};
pub use error::{Error, Result};
pub use live::{LiveOrchestrator, LiveResponse};
pub use logging::init_logging;
pub use model::{AircraftState, DataSource};
pub use storage::{Store, StoreHandle};
