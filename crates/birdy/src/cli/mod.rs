//! Command-line interface for birdy.
//!
//! This module provides the CLI structure for the `birdy` binary; the
//! handlers live in `main.rs`.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, DbCommand, FetchMetadataCommand, ServeCommand, ViewCommand,
};

/// birdy - Flight tracking API server, collectors and terminal map
///
/// Serves live aircraft positions with caching and rate-limit handling,
/// collects OpenSky snapshots into a local database, and renders the live
/// feed in the terminal.
#[derive(Debug, Parser)]
#[command(name = "birdy")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API server
    Serve(ServeCommand),

    /// Show live aircraft from a running server in the terminal
    View(ViewCommand),

    /// Store one OpenSky snapshot in the database
    Collect,

    /// Look up registry data for aircraft seen in the database
    FetchMetadata(FetchMetadataCommand),

    /// Inspect or initialize the database
    #[command(subcommand)]
    Db(DbCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
