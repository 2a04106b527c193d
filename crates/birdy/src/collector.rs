//! Snapshot collector behind `birdy collect`.
//!
//! Pulls one global OpenSky snapshot and stores the usable state vectors.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::feed::opensky::OpenSkyClient;
use crate::feed::http_client;
use crate::storage::Store;

/// Outcome of one collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectSummary {
    /// State arrays in the upstream response.
    pub seen: usize,
    /// Rows written to `flights`.
    pub stored: usize,
    /// Collection time shared by every stored row.
    pub collected_at: DateTime<Utc>,
}

/// Build an OpenSky client from the collector settings.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn opensky_client(config: &Config) -> Result<OpenSkyClient> {
    let client = http_client(config.collector_timeout())?;
    Ok(OpenSkyClient::new(client, &config.collector.opensky_base_url))
}

/// Fetch one snapshot and append it to the configured database.
///
/// # Errors
///
/// Returns an error if the database cannot be opened, the fetch fails, or the
/// insert fails.
pub async fn collect(config: &Config) -> Result<CollectSummary> {
    let client = opensky_client(config)?;
    let mut store = Store::open(config.database_path())?;
    collect_into(&client, &mut store, Utc::now()).await
}

/// Fetch one snapshot from `client` and insert it into `store`.
///
/// # Errors
///
/// Returns an error if the fetch or the insert fails.
pub async fn collect_into(
    client: &OpenSkyClient,
    store: &mut Store,
    collected_at: DateTime<Utc>,
) -> Result<CollectSummary> {
    let response = client.states_all().await?;
    let seen = response.len();
    let vectors = response.into_vectors();

    let stored = store.insert_snapshot(&vectors, collected_at)?;
    info!(seen, stored, "Collected OpenSky snapshot");

    Ok(CollectSummary {
        seen,
        stored,
        collected_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::feed::testing;
    use axum::http::StatusCode;
    use axum::{routing::get, Json, Router};
    use chrono::TimeZone;
    use serde_json::json;
    use std::time::Duration;

    fn client(base: &str) -> OpenSkyClient {
        OpenSkyClient::new(http_client(Duration::from_secs(5)).unwrap(), base)
    }

    #[tokio::test]
    async fn test_collect_stores_usable_states() {
        let router = Router::new().route(
            "/api/states/all",
            get(|| async {
                Json(json!({
                    "time": 1_700_000_000,
                    "states": [
                        ["4ca1fa", "RYR12  ", "Ireland", 1, 2, -6.2, 53.4, 10000.0, false, 230.0],
                        ["abcdef", "       ", "France", 1, 2, 2.3, 48.8, 9000.0, false, 210.0],
                        ["123456", "AFR1", "France", 1, 2, null, null, 9000.0, false, 210.0]
                    ]
                }))
            }),
        );
        let base = testing::serve(router).await;
        let mut store = Store::open_in_memory().unwrap();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let summary = collect_into(&client(&base), &mut store, at).await.unwrap();
        assert_eq!(summary.seen, 3);
        assert_eq!(summary.stored, 1);

        let info = store.info().unwrap();
        assert_eq!(info.flights, 1);
        assert_eq!(info.latest_collection, Some(at.to_rfc3339()));

        let history = store.flight_history("4ca1fa").unwrap();
        assert_eq!(history[0].callsign.as_deref(), Some("RYR12"));
    }

    #[tokio::test]
    async fn test_collect_empty_snapshot() {
        let router = Router::new().route(
            "/api/states/all",
            get(|| async { Json(json!({"time": 1, "states": null})) }),
        );
        let base = testing::serve(router).await;
        let mut store = Store::open_in_memory().unwrap();

        let summary = collect_into(&client(&base), &mut store, Utc::now())
            .await
            .unwrap();
        assert_eq!(summary.seen, 0);
        assert_eq!(summary.stored, 0);
    }

    #[tokio::test]
    async fn test_collect_upstream_failure() {
        let router = Router::new().route(
            "/api/states/all",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
        );
        let base = testing::serve(router).await;
        let mut store = Store::open_in_memory().unwrap();

        let err = collect_into(&client(&base), &mut store, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Feed(ref e) if e.status() == Some(503)));
        assert_eq!(store.info().unwrap().flights, 0);
    }
}
