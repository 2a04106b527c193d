//! Configuration management for birdy.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults. Provider
//! credentials are kept out of the main configuration in a separate JSON file
//! (see [`Credentials`]).

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default credentials file name.
const CREDENTIALS_FILE_NAME: &str = "credentials.json";

/// Default data and config directory name.
const DATA_DIR_NAME: &str = "birdy";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "birdy_flights.db";

/// Environment variable overriding the aviationstack key.
pub const AVIATIONSTACK_KEY_ENV: &str = "BIRDY_AVIATIONSTACK_KEY";

/// Environment variable overriding the AirLabs key.
pub const AIRLABS_KEY_ENV: &str = "BIRDY_AIRLABS_KEY";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `BIRDY_`, sections split on `__`)
/// 2. TOML config file at `~/.config/birdy/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Live feed configuration.
    pub live: LiveConfig,
    /// Snapshot and metadata collector configuration.
    pub collector: CollectorConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the API server binds to.
    pub bind: String,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/birdy/birdy_flights.db`
    pub database_path: Option<PathBuf>,
}

/// Live feed, cache and throttle configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// How long a cached snapshot is served without refetching, in seconds.
    pub cache_duration_secs: u64,
    /// Minimum time between two successful upstream requests, in seconds.
    pub min_request_interval_secs: u64,
    /// How long to stay away from a provider after it rate-limited us, in seconds.
    pub rate_limit_cooldown_secs: u64,
    /// Timeout of one upstream request, in seconds.
    pub request_timeout_secs: u64,
    /// Number of aircraft in a synthesized snapshot.
    pub mock_aircraft_count: usize,
    /// Path to the provider credentials file.
    /// Defaults to `~/.config/birdy/credentials.json`
    pub credentials_path: Option<PathBuf>,
    /// Base URL of the aviationstack API.
    pub aviationstack_base_url: String,
    /// Base URL of the AirLabs API.
    pub airlabs_base_url: String,
}

/// Collector configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Base URL of the OpenSky Network REST API.
    pub opensky_base_url: String,
    /// Maximum concurrent metadata requests.
    pub metadata_concurrency: usize,
    /// Timeout of one OpenSky request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            cache_duration_secs: 30,
            min_request_interval_secs: 10,
            rate_limit_cooldown_secs: 300,
            request_timeout_secs: 15,
            mock_aircraft_count: 500,
            credentials_path: None, // Will be resolved to default at runtime
            aviationstack_base_url: "http://api.aviationstack.com".to_string(),
            airlabs_base_url: "https://airlabs.co".to_string(),
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            opensky_base_url: "https://opensky-network.org".to_string(),
            metadata_concurrency: 15,
            request_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("BIRDY_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(CONFIG_FILE_NAME)
    }

    /// Get the default configuration directory.
    #[must_use]
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(Error::ConfigValidation { message });

        if self.server.bind.trim().is_empty() {
            return invalid("server.bind must not be empty".to_string());
        }

        let live = &self.live;
        for (name, value) in [
            ("cache_duration_secs", live.cache_duration_secs),
            ("min_request_interval_secs", live.min_request_interval_secs),
            ("rate_limit_cooldown_secs", live.rate_limit_cooldown_secs),
            ("request_timeout_secs", live.request_timeout_secs),
        ] {
            if value == 0 {
                return invalid(format!("live.{name} must be greater than 0"));
            }
        }

        if live.rate_limit_cooldown_secs < live.min_request_interval_secs {
            return invalid(format!(
                "live.rate_limit_cooldown_secs ({}) cannot be shorter than live.min_request_interval_secs ({})",
                live.rate_limit_cooldown_secs, live.min_request_interval_secs
            ));
        }

        if live.mock_aircraft_count == 0 {
            return invalid("live.mock_aircraft_count must be greater than 0".to_string());
        }

        if self.collector.request_timeout_secs == 0 {
            return invalid("collector.request_timeout_secs must be greater than 0".to_string());
        }

        if self.collector.metadata_concurrency == 0 {
            return invalid("collector.metadata_concurrency must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the credentials file path, resolving defaults if not set.
    #[must_use]
    pub fn credentials_path(&self) -> PathBuf {
        self.live
            .credentials_path
            .clone()
            .unwrap_or_else(|| Self::default_config_dir().join(CREDENTIALS_FILE_NAME))
    }

    /// Get the cache duration as a Duration.
    #[must_use]
    pub fn cache_duration(&self) -> Duration {
        Duration::from_secs(self.live.cache_duration_secs)
    }

    /// Get the minimum upstream request interval as a Duration.
    #[must_use]
    pub fn min_request_interval(&self) -> Duration {
        Duration::from_secs(self.live.min_request_interval_secs)
    }

    /// Get the rate-limit cooldown as a Duration.
    #[must_use]
    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.live.rate_limit_cooldown_secs)
    }

    /// Get the upstream request timeout as a Duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.live.request_timeout_secs)
    }

    /// Get the OpenSky request timeout as a Duration.
    #[must_use]
    pub fn collector_timeout(&self) -> Duration {
        Duration::from_secs(self.collector.request_timeout_secs)
    }
}

/// API keys for the live flight-data providers.
///
/// Read from a JSON object such as `{"aviationstack": "...", "airlabs": "..."}`.
/// Blank values count as missing.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// aviationstack access key.
    pub aviationstack: Option<String>,
    /// AirLabs API key.
    pub airlabs: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |key: &Option<String>| key.as_ref().map(|_| "***");
        f.debug_struct("Credentials")
            .field("aviationstack", &mask(&self.aviationstack))
            .field("airlabs", &mask(&self.airlabs))
            .finish()
    }
}

impl Credentials {
    /// Load credentials from a file, then apply environment overrides.
    ///
    /// A missing file yields empty credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let from_file = Self::read_file(path)?;
        Ok(from_file.with_overrides(
            std::env::var(AVIATIONSTACK_KEY_ENV).ok(),
            std::env::var(AIRLABS_KEY_ENV).ok(),
        ))
    }

    fn read_file(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No credentials file at {}", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(Error::Credentials {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }
        };
        serde_json::from_str::<Self>(&text)
            .map(Self::normalized)
            .map_err(|e| Error::Credentials {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }

    /// Replace keys with non-blank override values.
    #[must_use]
    pub fn with_overrides(mut self, aviationstack: Option<String>, airlabs: Option<String>) -> Self {
        if let Some(key) = non_blank(aviationstack) {
            self.aviationstack = Some(key);
        }
        if let Some(key) = non_blank(airlabs) {
            self.airlabs = Some(key);
        }
        self
    }

    /// Whether any provider key is configured.
    #[must_use]
    pub fn any(&self) -> bool {
        self.aviationstack.is_some() || self.airlabs.is_some()
    }

    fn normalized(self) -> Self {
        Self {
            aviationstack: non_blank(self.aviationstack),
            airlabs: non_blank(self.airlabs),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
