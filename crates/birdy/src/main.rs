//! `birdy` - CLI for the birdy flight tracker
//!
//! This binary runs the API server, the OpenSky collectors and the terminal
//! viewer, and exposes database and configuration maintenance commands.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::Context;
use clap::Parser;

use birdy::cli::{Cli, Command, ConfigCommand, DbCommand};
use birdy::storage::Store;
use birdy::{collector, init_logging, metadata, server, viewer, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    let config_path = cli.config;
    let load_config = || Config::load_from(config_path.clone()).context("loading configuration");

    match cli.command {
        Command::Serve(serve_cmd) => {
            let mut config = load_config()?;
            if let Some(bind) = serve_cmd.bind {
                config.server.bind = bind;
            }
            server::serve(&config).await?;
        }
        Command::View(view_cmd) => {
            let options = view_cmd.to_options();
            let mut stdout = std::io::stdout();
            viewer::run(&options, &mut stdout)
                .await
                .with_context(|| format!("viewing {}", options.server))?;
        }
        Command::Collect => {
            let summary = collector::collect(&load_config()?).await?;
            println!(
                "Stored {} of {} states at {}",
                summary.stored,
                summary.seen,
                summary.collected_at.to_rfc3339()
            );
        }
        Command::FetchMetadata(cmd) => {
            let summary = metadata::fetch_missing(&load_config()?, cmd.limit).await?;
            println!(
                "Stored {} of {} aircraft ({} not found, {} failed)",
                summary.stored, summary.candidates, summary.not_found, summary.failed
            );
        }
        Command::Db(db_cmd) => handle_db(&load_config()?, &db_cmd)?,
        Command::Config(config_cmd) => handle_config(config_path.clone(), config_cmd)?,
    }
    Ok(())
}

fn handle_db(config: &Config, cmd: &DbCommand) -> anyhow::Result<()> {
    let path = config.database_path();
    match cmd {
        DbCommand::Init => {
            let store = Store::open(&path)?;
            let info = store.info()?;
            println!(
                "Database ready at {} (schema version {})",
                info.path.display(),
                info.schema_version
            );
        }
        DbCommand::Info { json } => {
            let info = Store::open_read_only(&path)?.info()?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("birdy database");
                println!("--------------");
                println!("Path:              {}", info.path.display());
                println!("Schema version:    {}", info.schema_version);
                println!("Size:              {} bytes", info.db_size_bytes);
                println!("Flight records:    {}", info.flights);
                println!("Aircraft metadata: {}", info.aircraft_metadata);
                println!(
                    "Latest collection: {}",
                    info.latest_collection.as_deref().unwrap_or("never")
                );
            }
        }
        DbCommand::IcaoStats { json } => {
            let stats = Store::open_read_only(&path)?.icao24_stats()?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                match &stats.most_common {
                    Some(top) => println!("Most common icao24: {} ({} entries)", top.name, top.count),
                    None => println!("Most common icao24: none"),
                }
                println!("Total entries:      {}", stats.total_entries);
                println!("Unique icao24:      {}", stats.unique_icao24);
            }
        }
    }
    Ok(())
}

fn handle_config(path: Option<std::path::PathBuf>, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(path).context("loading configuration")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Server]");
                println!("  Bind:                 {}", config.server.bind);
                println!();
                println!("[Storage]");
                println!("  Database path:        {}", config.database_path().display());
                println!();
                println!("[Live]");
                println!("  Cache duration:       {}s", config.live.cache_duration_secs);
                println!("  Min request interval: {}s", config.live.min_request_interval_secs);
                println!("  Rate-limit cooldown:  {}s", config.live.rate_limit_cooldown_secs);
                println!("  Request timeout:      {}s", config.live.request_timeout_secs);
                println!("  Mock aircraft:        {}", config.live.mock_aircraft_count);
                println!("  Credentials:          {}", config.credentials_path().display());
                println!();
                println!("[Collector]");
                println!("  OpenSky URL:          {}", config.collector.opensky_base_url);
                println!("  Metadata concurrency: {}", config.collector.metadata_concurrency);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.or(path).unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
