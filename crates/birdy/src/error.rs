//! Error types for birdy.
//!
//! This module defines the crate-wide error type. Upstream feed failures have
//! their own type in [`crate::feed::FeedError`] so the live orchestrator can tell
//! rate limiting apart from other failures; they convert into [`Error::Feed`]
//! when they need to travel further.

use std::path::PathBuf;
use thiserror::Error;

use crate::feed::FeedError;

/// The main error type for birdy operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// The credentials file could not be read.
    #[error("failed to read credentials from {path}: {message}")]
    Credentials {
        /// Path to the credentials file.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    // === Request Errors ===
    /// A required request parameter is missing or malformed.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        /// Name of the parameter.
        name: &'static str,
        /// Description of the problem.
        message: String,
    },

    // === Upstream Errors ===
    /// An upstream flight-data provider failed.
    #[error(transparent)]
    Feed(#[from] FeedError),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for birdy operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create an invalid parameter error.
    #[must_use]
    pub fn invalid_parameter(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            message: message.into(),
        }
    }

    /// Check if this error was caused by the caller rather than the service.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidParameter { .. })
    }
}
