//! AirLabs real-time flights (`/api/v9/flights`).

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{body_error, get_json, non_empty, normalize_icao24, FeedError, FeedProvider, KMH_TO_MS};
use crate::model::{AircraftState, DataSource};

const PROVIDER: &str = "airlabs";

/// Client for the AirLabs flights endpoint.
#[derive(Debug, Clone)]
pub struct AirLabsProvider {
    client: reqwest::Client,
    base_url: String,
}

impl AirLabsProvider {
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
impl FeedProvider for AirLabsProvider {
    fn source(&self) -> DataSource {
        DataSource::Airlabs
    }

    async fn fetch(&self, api_key: &str) -> Result<Vec<AircraftState>, FeedError> {
        let request = self
            .client
            .get(format!("{}/api/v9/flights", self.base_url))
            .query(&[("api_key", api_key)]);
        let response: Response = get_json(PROVIDER, request).await?;
        let states = normalize(response)?;
        debug!(count = states.len(), "airlabs flights normalized");
        Ok(states)
    }
}

/// Top-level response body.
#[derive(Debug, Deserialize)]
pub struct Response {
    #[serde(default)]
    response: Option<Vec<Flight>>,
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

/// One tracked flight; `speed` and `v_speed` in km/h, `alt` in meters.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Flight {
    hex: Option<String>,
    flag: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
    alt: Option<f64>,
    dir: Option<f64>,
    speed: Option<f64>,
    v_speed: Option<f64>,
    squawk: Option<String>,
    flight_icao: Option<String>,
    flight_iata: Option<String>,
    status: Option<String>,
    updated: Option<i64>,
}

/// Convert a response body into aircraft states.
///
/// # Errors
///
/// An `error` object in the body becomes [`FeedError::Http`]; quota codes map
/// to status 429. A body with neither `response` nor `error` is malformed.
pub fn normalize(response: Response) -> Result<Vec<AircraftState>, FeedError> {
    if let Some(error) = response.error {
        let code = error.code.unwrap_or_default();
        return Err(body_error(PROVIDER, &code, error.message));
    }
    let flights = response.response.ok_or_else(|| FeedError::Malformed {
        provider: PROVIDER,
        message: "missing `response` array".to_string(),
    })?;
    Ok(flights.into_iter().filter_map(state).collect())
}

fn state(flight: Flight) -> Option<AircraftState> {
    let icao24 = normalize_icao24(flight.hex.as_deref())?;
    let (latitude, longitude) = (flight.lat?, flight.lng?);
    let on_ground = flight
        .status
        .as_deref()
        .is_some_and(|s| s.eq_ignore_ascii_case("landed"));

    Some(AircraftState {
        icao24,
        callsign: non_empty(flight.flight_icao.as_deref())
            .or_else(|| non_empty(flight.flight_iata.as_deref())),
        origin_country: non_empty(flight.flag.as_deref()),
        longitude: Some(longitude),
        latitude: Some(latitude),
        baro_altitude: flight.alt,
        geo_altitude: None,
        on_ground,
        velocity: flight.speed.map(|v| v * KMH_TO_MS),
        true_track: flight.dir,
        vertical_rate: flight.v_speed.map(|v| v * KMH_TO_MS),
        squawk: non_empty(flight.squawk.as_deref()),
        time_position: flight.updated,
        last_contact: flight.updated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::StatusCode, routing::get, Json, Router};
    use std::collections::HashMap;

    fn parse(json: serde_json::Value) -> Result<Vec<AircraftState>, FeedError> {
        normalize(serde_json::from_value(json).unwrap())
    }

    fn sample() -> serde_json::Value {
        serde_json::json!({
            "request": {"lang": "en"},
            "response": [
                {
                    "hex": "4CA1FA",
                    "reg_number": "EI-DCL",
                    "flag": "IE",
                    "lat": 53.42,
                    "lng": -6.27,
                    "alt": 0,
                    "dir": 100,
                    "speed": 36,
                    "v_speed": 0,
                    "squawk": "2000",
                    "flight_icao": "RYR12",
                    "flight_iata": "FR12",
                    "status": "landed",
                    "updated": 1_700_000_000
                },
                {"hex": "3c6444", "lat": 50.0},
                {"lat": 1.0, "lng": 2.0}
            ]
        })
    }

    #[test]
    fn test_normalize_maps_units_and_fields() {
        let states = parse(sample()).unwrap();
        assert_eq!(states.len(), 1);

        let s = &states[0];
        assert_eq!(s.icao24, "4ca1fa");
        assert_eq!(s.callsign.as_deref(), Some("RYR12"));
        assert_eq!(s.origin_country.as_deref(), Some("IE"));
        assert_eq!(s.baro_altitude, Some(0.0));
        assert!((s.velocity.unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(s.squawk.as_deref(), Some("2000"));
        assert_eq!(s.time_position, Some(1_700_000_000));
        assert!(s.on_ground);
    }

    #[test]
    fn test_normalize_every_record_has_both_coordinates() {
        for s in parse(sample()).unwrap() {
            assert!(s.latitude.is_some() && s.longitude.is_some());
        }
    }

    #[test]
    fn test_normalize_quota_error_is_rate_limited() {
        let err = parse(serde_json::json!({
            "error": {"message": "Month limit exceeded", "code": "month_limit_exceeded"}
        }))
        .unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[test]
    fn test_normalize_missing_response_is_malformed() {
        let err = parse(serde_json::json!({"request": {}})).unwrap_err();
        assert!(matches!(err, FeedError::Malformed { .. }));
    }

    #[tokio::test]
    async fn test_fetch_sends_key() {
        let router = Router::new().route(
            "/api/v9/flights",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                if params.get("api_key").map(String::as_str) == Some("secret") {
                    Ok(Json(sample()))
                } else {
                    Err(StatusCode::UNAUTHORIZED)
                }
            }),
        );
        let base = crate::feed::testing::serve(router).await;
        let client = crate::feed::http_client(std::time::Duration::from_secs(5)).unwrap();
        let provider = AirLabsProvider::new(client, base);

        let states = provider.fetch("secret").await.unwrap();
        assert_eq!(states.len(), 1);

        let err = provider.fetch("wrong").await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert!(!err.is_rate_limited());
    }

    #[tokio::test]
    async fn test_fetch_http_429_is_rate_limited() {
        let router = Router::new().route(
            "/api/v9/flights",
            get(|| async { StatusCode::TOO_MANY_REQUESTS }),
        );
        let base = crate::feed::testing::serve(router).await;
        let client = crate::feed::http_client(std::time::Duration::from_secs(5)).unwrap();

        let err = AirLabsProvider::new(client, base)
            .fetch("key")
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
    }
}
