//! aviationstack live flights (`/v1/flights`).

use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use tracing::debug;

use super::{body_error, get_json, non_empty, normalize_icao24, FeedError, FeedProvider, KMH_TO_MS};
use crate::model::{AircraftState, DataSource};

const PROVIDER: &str = "aviationstack";

/// Flights requested per call (the free plan maximum).
const PAGE_LIMIT: u32 = 100;

/// Client for the aviationstack flights endpoint.
#[derive(Debug, Clone)]
pub struct AviationStackProvider {
    client: reqwest::Client,
    base_url: String,
}

impl AviationStackProvider {
    /// Create a provider talking to `base_url`.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl FeedProvider for AviationStackProvider {
    fn source(&self) -> DataSource {
        DataSource::Aviationstack
    }

    async fn fetch(&self, api_key: &str) -> Result<Vec<AircraftState>, FeedError> {
        let limit = PAGE_LIMIT.to_string();
        let request = self
            .client
            .get(format!("{}/v1/flights", self.base_url))
            .query(&[
                ("access_key", api_key),
                ("flight_status", "active"),
                ("limit", limit.as_str()),
            ]);
        let response: Response = get_json(PROVIDER, request).await?;
        let states = normalize(response)?;
        debug!(count = states.len(), "aviationstack flights normalized");
        Ok(states)
    }
}

/// Top-level response body.
#[derive(Debug, Deserialize)]
pub struct Response {
    #[serde(default)]
    data: Option<Vec<Flight>>,
    #[serde(default)]
    error: Option<BodyError>,
}

#[derive(Debug, Deserialize)]
struct BodyError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Flight {
    flight: Option<FlightIds>,
    aircraft: Option<Aircraft>,
    live: Option<Live>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FlightIds {
    icao: Option<String>,
    iata: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Aircraft {
    icao24: Option<String>,
}

/// Position report; speeds in km/h, altitude in meters.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Live {
    updated: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    altitude: Option<f64>,
    direction: Option<f64>,
    speed_horizontal: Option<f64>,
    speed_vertical: Option<f64>,
    is_ground: Option<bool>,
}

/// Convert a response body into aircraft states.
///
/// # Errors
///
/// An `error` object in the body becomes [`FeedError::Http`]; quota codes map
/// to status 429. A body with neither `data` nor `error` is malformed.
pub fn normalize(response: Response) -> Result<Vec<AircraftState>, FeedError> {
    if let Some(error) = response.error {
        let code = error.code.unwrap_or_default();
        return Err(body_error(PROVIDER, &code, error.message));
    }
    let flights = response.data.ok_or_else(|| FeedError::Malformed {
        provider: PROVIDER,
        message: "missing `data` array".to_string(),
    })?;
    Ok(flights.into_iter().filter_map(state).collect())
}

fn state(flight: Flight) -> Option<AircraftState> {
    let icao24 = normalize_icao24(flight.aircraft.as_ref()?.icao24.as_deref())?;
    let live = flight.live?;
    let (latitude, longitude) = (live.latitude?, live.longitude?);
    let callsign = flight
        .flight
        .and_then(|ids| non_empty(ids.icao.as_deref()).or_else(|| non_empty(ids.iata.as_deref())));
    let updated = live
        .updated
        .as_deref()
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.timestamp());

    Some(AircraftState {
        icao24,
        callsign,
        origin_country: None,
        longitude: Some(longitude),
        latitude: Some(latitude),
        baro_altitude: live.altitude,
        geo_altitude: None,
        on_ground: live.is_ground.unwrap_or(false),
        velocity: live.speed_horizontal.map(|v| v * KMH_TO_MS),
        true_track: live.direction,
        vertical_rate: live.speed_vertical.map(|v| v * KMH_TO_MS),
        squawk: None,
        time_position: updated,
        last_contact: updated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, routing::get, Json, Router};
    use std::collections::HashMap;

    fn parse(json: serde_json::Value) -> Result<Vec<AircraftState>, FeedError> {
        normalize(serde_json::from_value(json).unwrap())
    }

    fn sample() -> serde_json::Value {
        serde_json::json!({
            "pagination": {"limit": 100, "offset": 0, "count": 3, "total": 3},
            "data": [
                {
                    "flight_status": "active",
                    "flight": {"number": "1234", "iata": "U21234", "icao": "EZY1234"},
                    "aircraft": {"registration": "G-EZAA", "icao24": "40062B"},
                    "live": {
                        "updated": "2024-05-01T12:00:00+00:00",
                        "latitude": 51.47,
                        "longitude": -0.45,
                        "altitude": 10668.0,
                        "direction": 270.0,
                        "speed_horizontal": 900.0,
                        "speed_vertical": 0.0,
                        "is_ground": false
                    }
                },
                {
                    "flight": {"iata": "BA1"},
                    "aircraft": {"icao24": "400abc"},
                    "live": null
                },
                {
                    "flight": {"icao": "DLH4"},
                    "aircraft": null,
                    "live": {"latitude": 50.0, "longitude": 8.5}
                }
            ]
        })
    }

    #[test]
    fn test_normalize_maps_units_and_fields() {
        let states = parse(sample()).unwrap();
        assert_eq!(states.len(), 1);

        let s = &states[0];
        assert_eq!(s.icao24, "40062b");
        assert_eq!(s.callsign.as_deref(), Some("EZY1234"));
        assert_eq!(s.latitude, Some(51.47));
        assert_eq!(s.longitude, Some(-0.45));
        assert_eq!(s.baro_altitude, Some(10668.0));
        assert!((s.velocity.unwrap() - 250.0).abs() < 1e-9);
        assert_eq!(s.true_track, Some(270.0));
        assert_eq!(s.last_contact, Some(1_714_564_800));
        assert!(!s.on_ground);
    }

    #[test]
    fn test_normalize_drops_partial_coordinates() {
        let states = parse(serde_json::json!({
            "data": [{
                "aircraft": {"icao24": "aaaaaa"},
                "live": {"latitude": 10.0, "longitude": null}
            }]
        }))
        .unwrap();
        assert!(states.is_empty());
    }

    #[test]
    fn test_normalize_quota_error_is_rate_limited() {
        let err = parse(serde_json::json!({
            "error": {"code": "usage_limit_reached", "message": "Your monthly usage limit has been reached."}
        }))
        .unwrap_err();
        assert!(err.is_rate_limited());
        assert!(err.to_string().contains("monthly usage limit"));
    }

    #[test]
    fn test_normalize_other_body_error() {
        let err = parse(serde_json::json!({
            "error": {"code": "invalid_access_key"}
        }))
        .unwrap_err();
        assert!(!err.is_rate_limited());
        assert!(err.to_string().contains("invalid_access_key"));
    }

    #[test]
    fn test_normalize_missing_data_is_malformed() {
        let err = parse(serde_json::json!({})).unwrap_err();
        assert!(matches!(err, FeedError::Malformed { .. }));
    }

    #[tokio::test]
    async fn test_fetch_sends_key_and_filters() {
        let router = Router::new().route(
            "/v1/flights",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params.get("access_key").map(String::as_str), Some("secret"));
                assert_eq!(params.get("flight_status").map(String::as_str), Some("active"));
                Json(sample())
            }),
        );
        let base = crate::feed::testing::serve(router).await;
        let client = crate::feed::http_client(std::time::Duration::from_secs(5)).unwrap();

        let states = AviationStackProvider::new(client, format!("{base}/"))
            .fetch("secret")
            .await
            .unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].icao24, "40062b");
    }
}
