//! Terminal map viewer behind `birdy view`.
//!
//! Polls a running birdy server, narrows the snapshot with the viewport engine
//! and prints the renderable aircraft chunk by chunk.

use std::io::Write;
use std::time::Duration;

use birdy_viewport::{select, AutoRefresh, ChunkRevealer, Selection, ViewQuery};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::feed::{get_json, http_client};
use crate::live::LiveResponse;
use crate::model::AircraftState;

/// Default server the viewer polls.
pub const DEFAULT_SERVER: &str = "http://127.0.0.1:3000";

/// Settings of one viewer session.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerOptions {
    /// Base URL of the birdy server.
    pub server: String,
    /// Viewport selection inputs.
    pub query: ViewQuery,
    /// Time between polls.
    pub refresh: Duration,
    /// Stop after the first pass.
    pub once: bool,
    /// Timeout of one poll.
    pub timeout: Duration,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            query: ViewQuery::default(),
            refresh: Duration::from_secs(30),
            once: false,
            timeout: Duration::from_secs(15),
        }
    }
}

/// Client for a birdy server's live route.
#[derive(Debug, Clone)]
pub struct LiveClient {
    client: reqwest::Client,
    url: String,
}

impl LiveClient {
    /// Create a client for the server at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            url: format!("{}/api/aircraft/live", base_url.trim_end_matches('/')),
        })
    }

    /// Fetch the current live snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached or answers with
    /// something other than a live snapshot.
    pub async fn fetch(&self) -> Result<LiveResponse> {
        debug!(url = %self.url, "polling live snapshot");
        Ok(get_json("birdy", self.client.get(&self.url)).await?)
    }
}

/// Poll and print until Ctrl-C, or once when `options.once` is set.
///
/// # Errors
///
/// Returns an error if the first poll fails or output cannot be written.
/// Later poll failures are logged and retried on the next tick.
pub async fn run<W: Write>(options: &ViewerOptions, out: &mut W) -> Result<()> {
    let client = LiveClient::new(&options.server, options.timeout)?;
    let mut revealer = ChunkRevealer::default();

    render_pass(&client, &options.query, &mut revealer, out).await?;
    if options.once {
        return Ok(());
    }

    let (tx, mut ticks) = mpsc::channel::<()>(1);
    let refresh = AutoRefresh::spawn(options.refresh, move || {
        let tx = tx.clone();
        async move {
            // A pass still running absorbs this tick.
            let _ = tx.try_send(());
        }
    });
    info!(
        "Refreshing every {}s, press Ctrl-C to stop",
        options.refresh.as_secs()
    );

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            tick = ticks.recv() => {
                if tick.is_none() {
                    break;
                }
                if let Err(e) = render_pass(&client, &options.query, &mut revealer, out).await {
                    warn!(error = %e, "refresh failed");
                }
            }
        }
    }

    refresh.shutdown().await;
    Ok(())
}

/// Fetch one snapshot and print its renderable subset.
async fn render_pass<W: Write>(
    client: &LiveClient,
    query: &ViewQuery,
    revealer: &mut ChunkRevealer,
    out: &mut W,
) -> Result<()> {
    let response = client.fetch().await?;
    let selection = select(response.aircraft.as_slice(), query);

    writeln!(out, "{}", header(&response, &selection, query))?;
    let rows: Vec<String> = selection.visible.iter().map(|a| format_row(a)).collect();
    reveal(&rows, revealer, out).await?;
    out.flush()?;
    Ok(())
}

/// Print `rows` as the revealer makes them visible.
async fn reveal<W: Write>(rows: &[String], revealer: &mut ChunkRevealer, out: &mut W) -> Result<()> {
    revealer.restart(rows.len());
    let mut visible = revealer.subscribe();
    let mut printed = 0;

    loop {
        let shown = (*visible.borrow_and_update()).min(rows.len());
        if shown > printed {
            for row in &rows[printed..shown] {
                writeln!(out, "{row}")?;
            }
            printed = shown;
        }
        if printed >= rows.len() || visible.changed().await.is_err() {
            break;
        }
    }
    Ok(())
}

fn header(response: &LiveResponse, selection: &Selection<'_, AircraftState>, query: &ViewQuery) -> String {
    let mut line = format!(
        "[{}] {} of {} tracked ({} matched, cap {}) zoom {:.2}",
        response.data_source,
        selection.visible.len(),
        response.stats.total,
        selection.matched,
        selection.policy.max_display,
        query.zoom,
    );
    if response.from_cache {
        match response.cache_age {
            Some(age) => line.push_str(&format!(" | cached {age}s")),
            None => line.push_str(" | cached"),
        }
    }
    if response.rate_limited == Some(true) {
        line.push_str(" | rate limited");
        if let Some(wait) = response.wait_time {
            line.push_str(&format!(" ({wait}s)"));
        }
    }
    if let Some(message) = &response.message {
        line.push_str(&format!(" | {message}"));
    }
    line
}

fn format_row(aircraft: &AircraftState) -> String {
    let altitude = aircraft
        .baro_altitude
        .or(aircraft.geo_altitude)
        .map_or_else(|| "-".to_string(), |a| format!("{a:.0}m"));
    let speed = aircraft
        .velocity
        .map_or_else(|| "-".to_string(), |v| format!("{v:.0}m/s"));
    format!(
        "{:<6} {:<8} {:>7} {:>7} {:>8.3} {:>9.3} {}{}",
        aircraft.icao24,
        aircraft.callsign.as_deref().unwrap_or("-"),
        altitude,
        speed,
        aircraft.latitude.unwrap_or_default(),
        aircraft.longitude.unwrap_or_default(),
        aircraft.origin_country.as_deref().unwrap_or("-"),
        if aircraft.on_ground { " (ground)" } else { "" },
    )
}
