//! Registry backfill behind `birdy fetch-metadata`.
//!
//! Looks up every aircraft seen in `flights` that has no registry entry yet,
//! with a bounded number of requests in flight.

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::collector::opensky_client;
use crate::config::Config;
use crate::error::Result;
use crate::feed::opensky::OpenSkyClient;
use crate::storage::Store;

/// Outcome of one backfill run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataSummary {
    /// Addresses that lacked an entry.
    pub candidates: usize,
    /// Entries written.
    pub stored: usize,
    /// Addresses OpenSky does not know.
    pub not_found: usize,
    /// Lookups that failed and were skipped.
    pub failed: usize,
}

/// Backfill registry entries in the configured database.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or written.
pub async fn fetch_missing(config: &Config, limit: Option<usize>) -> Result<MetadataSummary> {
    let client = opensky_client(config)?;
    let mut store = Store::open(config.database_path())?;
    fetch_missing_into(&client, &mut store, limit, config.collector.metadata_concurrency).await
}

/// Look up missing entries through `client` and upsert them into `store`.
///
/// Individual lookup failures are logged and counted, never returned.
///
/// # Errors
///
/// Returns an error if the store cannot be queried or written.
pub async fn fetch_missing_into(
    client: &OpenSkyClient,
    store: &mut Store,
    limit: Option<usize>,
    concurrency: usize,
) -> Result<MetadataSummary> {
    let candidates = store.icao24_without_metadata(limit)?;
    let mut summary = MetadataSummary {
        candidates: candidates.len(),
        ..MetadataSummary::default()
    };
    if candidates.is_empty() {
        info!("All aircraft already have metadata");
        return Ok(summary);
    }
    info!(
        count = candidates.len(),
        concurrency, "Fetching aircraft metadata"
    );

    let results: Vec<_> = stream::iter(candidates)
        .map(|icao24| async move {
            let result = client.aircraft_metadata(&icao24).await;
            (icao24, result)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut entries = Vec::with_capacity(results.len());
    for (icao24, result) in results {
        match result {
            Ok(Some(metadata)) => entries.push(metadata),
            Ok(None) => {
                debug!(%icao24, "no metadata available");
                summary.not_found += 1;
            }
            Err(e) => {
                warn!(%icao24, error = %e, "metadata lookup failed");
                summary.failed += 1;
            }
        }
    }

    summary.stored = store.upsert_metadata(&entries)?;
    info!(
        stored = summary.stored,
        not_found = summary.not_found,
        failed = summary.failed,
        "Metadata fetch complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::opensky::StateVector;
    use crate::feed::{http_client, testing};
    use crate::model::{AircraftMetadata, AircraftState};
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::{routing::get, Json, Router};
    use chrono::Utc;
    use serde_json::json;
    use std::time::Duration;

    fn seen(icao24: &str) -> StateVector {
        StateVector {
            state: AircraftState {
                icao24: icao24.to_string(),
                callsign: Some("TEST1".to_string()),
                latitude: Some(1.0),
                longitude: Some(1.0),
                ..AircraftState::default()
            },
            sensors: None,
            spi: None,
            position_source: None,
            category: None,
        }
    }

    async fn metadata_route(Path(icao24): Path<String>) -> Response {
        match icao24.as_str() {
            "aaaaaa" | "bbbbbb" => Json(json!({
                "registration": format!("EI-{icao24}"),
                "manufacturerName": "Boeing",
                "model": "737-8AS",
                "typecode": "B738",
                "operator": "Ryanair"
            }))
            .into_response(),
            "cccccc" => StatusCode::NOT_FOUND.into_response(),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        }
    }

    async fn stub_client() -> OpenSkyClient {
        let router = Router::new().route(
            "/api/metadata/aircraft/icao/{icao24}",
            get(metadata_route),
        );
        let base = testing::serve(router).await;
        OpenSkyClient::new(http_client(Duration::from_secs(5)).unwrap(), base)
    }

    #[tokio::test]
    async fn test_fetch_missing_counts_outcomes() {
        crate::logging::init_test_logging();
        let client = stub_client().await;
        let mut store = Store::open_in_memory().unwrap();
        let vectors: Vec<_> = ["aaaaaa", "bbbbbb", "cccccc", "dddddd"]
            .into_iter()
            .map(seen)
            .collect();
        store.insert_snapshot(&vectors, Utc::now()).unwrap();

        let summary = fetch_missing_into(&client, &mut store, None, 2).await.unwrap();
        assert_eq!(
            summary,
            MetadataSummary {
                candidates: 4,
                stored: 2,
                not_found: 1,
                failed: 1,
            }
        );

        let page = store.list_aircraft(1, 10, Some("EI-aaaaaa")).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.aircraft[0].icao24, "aaaaaa");
        assert_eq!(page.aircraft[0].typecode.as_deref(), Some("B738"));

        let remaining = store.icao24_without_metadata(None).unwrap();
        assert_eq!(remaining, vec!["cccccc".to_string(), "dddddd".to_string()]);
    }

    #[tokio::test]
    async fn test_fetch_missing_respects_limit() {
        let client = stub_client().await;
        let mut store = Store::open_in_memory().unwrap();
        store
            .insert_snapshot(&[seen("aaaaaa"), seen("bbbbbb")], Utc::now())
            .unwrap();

        let summary = fetch_missing_into(&client, &mut store, Some(1), 4)
            .await
            .unwrap();
        assert_eq!(summary.candidates, 1);
        assert_eq!(summary.stored, 1);
    }

    #[tokio::test]
    async fn test_fetch_missing_nothing_to_do() {
        let client = stub_client().await;
        let mut store = Store::open_in_memory().unwrap();
        store.insert_snapshot(&[seen("aaaaaa")], Utc::now()).unwrap();
        store
            .upsert_metadata(&[AircraftMetadata {
                icao24: "aaaaaa".to_string(),
                ..AircraftMetadata::default()
            }])
            .unwrap();

        let summary = fetch_missing_into(&client, &mut store, None, 4).await.unwrap();
        assert_eq!(summary, MetadataSummary::default());
    }
}
