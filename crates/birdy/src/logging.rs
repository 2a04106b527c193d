//! Tracing setup shared by `birdy serve`, the collectors and `birdy view`.
//!
//! The CLI's `-v`/`-q` flags pick a [`Verbosity`]; a valid `RUST_LOG` replaces
//! those directives entirely.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// How much the binary logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only (`-q`).
    Quiet,
    /// Request summaries, fetch outcomes and collector totals.
    #[default]
    Normal,
    /// Cache decisions and per-row detail (`-v`).
    Verbose,
    /// Everything, including HTTP client internals (`-vv`).
    Trace,
}

impl Verbosity {
    /// Most detailed level emitted by birdy's own targets.
    #[must_use]
    pub fn level(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// `EnvFilter` directives used when `RUST_LOG` is absent or invalid.
    ///
    /// `tower_http` request spans follow the same level, so `-v` shows one
    /// line per API call.
    #[must_use]
    pub fn default_directives(&self) -> String {
        let level = self.level();
        format!("birdy={level},birdy_viewport={level},tower_http={level}")
    }
}

/// Pick the filter: `rust_log` when it parses, the verbosity defaults otherwise.
#[must_use]
pub fn env_filter(verbosity: Verbosity, rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .map(str::trim)
        .filter(|directives| !directives.is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(verbosity.default_directives()))
}

/// Install the global subscriber.
///
/// Later calls are no-ops.
///
/// ```no_run
/// use birdy::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = env_filter(verbosity, rust_log.as_deref());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .try_init();
}

/// Route test logs through the test writer at `warn`.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
