//! OpenSky Network REST API: global state vectors and aircraft metadata.
//!
//! Used by the collector commands rather than the live route. State vectors
//! arrive as positional JSON arrays; see
//! <https://openskynetwork.github.io/opensky-api/rest.html#response>.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{get_json, non_empty, normalize_icao24, FeedError};
use crate::model::{AircraftMetadata, AircraftState};

const PROVIDER: &str = "opensky";

/// A state vector with the fields that only the store keeps.
#[derive(Debug, Clone, PartialEq)]
pub struct StateVector {
    /// The normalized state.
    pub state: AircraftState,
    /// Receiver IDs that contributed, as JSON text.
    pub sensors: Option<String>,
    /// Special purpose indicator.
    pub spi: Option<bool>,
    /// 0 ADS-B, 1 ASTERIX, 2 MLAT, 3 FLARM.
    pub position_source: Option<i64>,
    /// Emitter category.
    pub category: Option<i64>,
}

/// Body of `GET /api/states/all`.
#[derive(Debug, Deserialize)]
pub struct StatesResponse {
    /// Time of the snapshot.
    #[serde(default)]
    pub time: Option<i64>,
    /// Positional state arrays; `null` when nothing is tracked.
    #[serde(default)]
    pub states: Option<Vec<Vec<Value>>>,
}

impl StatesResponse {
    /// Number of raw state arrays in the body.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.as_ref().map_or(0, Vec::len)
    }

    /// Whether the body carries no states.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keep the states that have a callsign and both coordinates.
    #[must_use]
    pub fn into_vectors(self) -> Vec<StateVector> {
        self.states
            .unwrap_or_default()
            .into_iter()
            .filter_map(|raw| parse_state(&raw))
            .collect()
    }
}

fn parse_state(raw: &[Value]) -> Option<StateVector> {
    if raw.len() < 10 {
        return None;
    }
    let field = |idx: usize| raw.get(idx).filter(|v| !v.is_null());
    let float = |idx: usize| field(idx).and_then(Value::as_f64);
    let int = |idx: usize| field(idx).and_then(Value::as_i64);
    let text = |idx: usize| non_empty(field(idx).and_then(Value::as_str));

    let icao24 = normalize_icao24(field(0).and_then(Value::as_str))?;
    let callsign = text(1)?;
    let (longitude, latitude) = (float(5)?, float(6)?);

    Some(StateVector {
        state: AircraftState {
            icao24,
            callsign: Some(callsign),
            origin_country: text(2),
            longitude: Some(longitude),
            latitude: Some(latitude),
            baro_altitude: float(7),
            geo_altitude: float(13),
            on_ground: field(8).and_then(Value::as_bool).unwrap_or(false),
            velocity: float(9),
            true_track: float(10),
            vertical_rate: float(11),
            squawk: text(14),
            time_position: int(3),
            last_contact: int(4),
        },
        sensors: field(12).map(Value::to_string),
        spi: field(15).and_then(Value::as_bool),
        position_source: int(16),
        category: int(17),
    })
}

/// Client for the anonymous OpenSky endpoints.
#[derive(Debug, Clone)]
pub struct OpenSkyClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenSkyClient {
    /// Create a client talking to `base_url`.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetch every currently tracked state vector.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status, or a body
    /// that is not a states document.
    pub async fn states_all(&self) -> Result<StatesResponse, FeedError> {
        let url = format!("{}/api/states/all", self.base_url);
        debug!(%url, "fetching OpenSky states");
        get_json(PROVIDER, self.client.get(url)).await
    }

    /// Fetch registry metadata for one aircraft.
    ///
    /// Returns `Ok(None)` when OpenSky has no record of it.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, any other non-success status,
    /// or a malformed body.
    pub async fn aircraft_metadata(
        &self,
        icao24: &str,
    ) -> Result<Option<AircraftMetadata>, FeedError> {
        let url = format!("{}/api/metadata/aircraft/icao/{icao24}", self.base_url);
        match get_json::<AircraftMetadata>(PROVIDER, self.client.get(url)).await {
            Ok(mut metadata) => {
                metadata.icao24 = icao24.to_string();
                Ok(Some(metadata))
            }
            Err(FeedError::Http { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
