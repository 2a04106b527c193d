//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;
use std::time::Duration;

use birdy_viewport::{Bounds, ViewQuery};
use clap::{Args, Subcommand};

use crate::viewer::{ViewerOptions, DEFAULT_SERVER};

/// Serve command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to bind, overriding `server.bind`
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<String>,
}

/// View command arguments.
#[derive(Debug, Args)]
pub struct ViewCommand {
    /// Base URL of the birdy server
    #[arg(short, long, default_value = DEFAULT_SERVER)]
    pub server: String,

    /// Map zoom factor (below 0.5 coarse, below 1.0 medium)
    #[arg(short, long, default_value_t = 1.0)]
    pub zoom: f64,

    /// Visible area as south,west,north,east in degrees
    #[arg(short, long, value_name = "S,W,N,E", allow_hyphen_values = true)]
    pub bounds: Option<Bounds>,

    /// Only show aircraft whose identifier, callsign or country contains TEXT
    #[arg(long, value_name = "TEXT")]
    pub search: Option<String>,

    /// Hide aircraft on the ground
    #[arg(short, long)]
    pub airborne: bool,

    /// Seconds between refreshes
    #[arg(short, long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub refresh_secs: u64,

    /// Print one snapshot and exit
    #[arg(long)]
    pub once: bool,
}

impl ViewCommand {
    /// Viewer settings for these arguments.
    #[must_use]
    pub fn to_options(&self) -> ViewerOptions {
        ViewerOptions {
            server: self.server.clone(),
            query: ViewQuery {
                search: self.search.clone().unwrap_or_default(),
                airborne_only: self.airborne,
                bounds: self.bounds,
                zoom: self.zoom,
            },
            refresh: Duration::from_secs(self.refresh_secs),
            once: self.once,
            ..ViewerOptions::default()
        }
    }
}

/// Fetch-metadata command arguments.
#[derive(Debug, Args)]
pub struct FetchMetadataCommand {
    /// Look up at most N aircraft
    #[arg(short, long, value_name = "N")]
    pub limit: Option<usize>,
}

/// Database maintenance commands.
#[derive(Debug, Subcommand)]
pub enum DbCommand {
    /// Create the database and bring its schema up to date
    Init,

    /// Show row counts and the latest collection time
    Info {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the most frequently seen aircraft address
    IcaoStats {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
