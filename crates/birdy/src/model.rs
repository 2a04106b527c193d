//! Wire and storage records shared across birdy.
//!
//! [`AircraftState`] is the normalized live record every provider, the mock
//! generator and the collector produce. The camelCase types describe rows read
//! back from the store.

use std::collections::HashSet;
use std::fmt;

use birdy_viewport::Track;
use serde::{Deserialize, Serialize};

/// One aircraft position report in the common shape.
///
/// Distances are meters, speeds m/s, angles degrees and times epoch seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AircraftState {
    /// Transponder address, lowercase hex.
    pub icao24: String,
    /// Flight callsign.
    pub callsign: Option<String>,
    /// Country of registration.
    pub origin_country: Option<String>,
    /// Longitude in degrees.
    pub longitude: Option<f64>,
    /// Latitude in degrees.
    pub latitude: Option<f64>,
    /// Barometric altitude in meters.
    pub baro_altitude: Option<f64>,
    /// Geometric altitude in meters.
    pub geo_altitude: Option<f64>,
    /// Whether the aircraft reported being on the ground.
    pub on_ground: bool,
    /// Ground speed in m/s.
    pub velocity: Option<f64>,
    /// Track over ground in degrees clockwise from north.
    pub true_track: Option<f64>,
    /// Vertical rate in m/s.
    pub vertical_rate: Option<f64>,
    /// Transponder code.
    pub squawk: Option<String>,
    /// Time of the last position update.
    pub time_position: Option<i64>,
    /// Time of the last message of any kind.
    pub last_contact: Option<i64>,
}

impl AircraftState {
    /// Whether both coordinates are known.
    #[must_use]
    pub fn has_position(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

impl Track for AircraftState {
    fn icao24(&self) -> &str {
        &self.icao24
    }

    fn callsign(&self) -> Option<&str> {
        self.callsign.as_deref()
    }

    fn origin_country(&self) -> Option<&str> {
        self.origin_country.as_deref()
    }

    fn position(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }

    fn altitude(&self) -> Option<f64> {
        self.baro_altitude.or(self.geo_altitude)
    }

    fn velocity(&self) -> Option<f64> {
        self.velocity
    }

    fn on_ground(&self) -> bool {
        self.on_ground
    }
}

/// Where a live snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Synthesized by the mock generator.
    Mock,
    /// The aviationstack API.
    Aviationstack,
    /// The AirLabs API.
    Airlabs,
}

impl DataSource {
    /// The name used on the wire.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::Aviationstack => "aviationstack",
            Self::Airlabs => "airlabs",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary counts of a live snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveStats {
    /// Number of aircraft.
    pub total: usize,
    /// Aircraft not on the ground.
    pub airborne: usize,
    /// Aircraft on the ground.
    pub grounded: usize,
    /// Distinct non-null origin countries.
    pub countries: usize,
}

impl LiveStats {
    /// Count a snapshot.
    #[must_use]
    pub fn from_states(states: &[AircraftState]) -> Self {
        let grounded = states.iter().filter(|s| s.on_ground).count();
        let countries = states
            .iter()
            .filter_map(|s| s.origin_country.as_deref())
            .collect::<HashSet<_>>()
            .len();
        Self {
            total: states.len(),
            airborne: states.len() - grounded,
            grounded,
            countries,
        }
    }
}

/// Registry data for one airframe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AircraftMetadata {
    pub icao24: String,
    pub registration: Option<String>,
    pub manufacturer_icao: Option<String>,
    pub manufacturer_name: Option<String>,
    pub model: Option<String>,
    pub typecode: Option<String>,
    pub serial_number: Option<String>,
    pub line_number: Option<String>,
    pub icao_aircraft_type: Option<String>,
    pub operator: Option<String>,
    pub operator_callsign: Option<String>,
    pub operator_icao: Option<String>,
    pub operator_iata: Option<String>,
    pub owner: Option<String>,
    pub category_description: Option<String>,
    pub built: Option<String>,
    pub first_flight_date: Option<String>,
    pub seat_configuration: Option<String>,
    pub engines: Option<String>,
}

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    /// Build a position when both coordinates are known.
    #[must_use]
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        Some(Self {
            latitude: latitude?,
            longitude: longitude?,
        })
    }
}

/// A contiguous run of stored snapshots of one aircraft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightJourney {
    pub icao24: String,
    pub callsign: Option<String>,
    pub origin_country: Option<String>,
    /// Epoch seconds of the first snapshot.
    pub departure_time: i64,
    /// Epoch seconds of the last snapshot.
    pub arrival_time: i64,
    pub departure_position: Option<Position>,
    pub arrival_position: Option<Position>,
    /// Highest barometric altitude seen, in meters.
    pub max_altitude: Option<f64>,
    /// Number of snapshots in the journey.
    pub observations: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(icao24: &str) -> AircraftState {
        AircraftState {
            icao24: icao24.to_string(),
            latitude: Some(51.47),
            longitude: Some(-0.45),
            ..AircraftState::default()
        }
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_value(state("4ca1fa")).unwrap();
        assert_eq!(json["icao24"], "4ca1fa");
        assert!(json.get("origin_country").is_some());
        assert!(json.get("baro_altitude").is_some());
        assert_eq!(json["on_ground"], false);
    }

    #[test]
    fn test_track_position_requires_both_coordinates() {
        let mut s = state("abc123");
        assert_eq!(Track::position(&s), Some((51.47, -0.45)));
        s.longitude = None;
        assert_eq!(Track::position(&s), None);
        assert!(!s.has_position());
    }

    #[test]
    fn test_track_altitude_falls_back_to_geometric() {
        let mut s = state("abc123");
        assert_eq!(Track::altitude(&s), None);
        s.geo_altitude = Some(1200.0);
        assert_eq!(Track::altitude(&s), Some(1200.0));
        s.baro_altitude = Some(1100.0);
        assert_eq!(Track::altitude(&s), Some(1100.0));
    }

    #[test]
    fn test_data_source_wire_names() {
        assert_eq!(
            serde_json::to_string(&DataSource::Aviationstack).unwrap(),
            "\"aviationstack\""
        );
        assert_eq!(DataSource::Mock.to_string(), "mock");
        assert_eq!(DataSource::Airlabs.as_str(), "airlabs");
    }

    #[test]
    fn test_live_stats() {
        let mut a = state("aaaaaa");
        a.origin_country = Some("France".to_string());
        let mut b = state("bbbbbb");
        b.origin_country = Some("France".to_string());
        b.on_ground = true;
        let mut c = state("cccccc");
        c.origin_country = Some("Spain".to_string());
        let d = state("dddddd");

        let stats = LiveStats::from_states(&[a, b, c, d]);
        assert_eq!(
            stats,
            LiveStats {
                total: 4,
                airborne: 3,
                grounded: 1,
                countries: 2,
            }
        );
    }

    #[test]
    fn test_live_stats_empty() {
        assert_eq!(LiveStats::from_states(&[]), LiveStats::default());
    }

    #[test]
    fn test_metadata_serializes_camel_case() {
        let meta = AircraftMetadata {
            icao24: "4ca1fa".to_string(),
            manufacturer_name: Some("Boeing".to_string()),
            ..AircraftMetadata::default()
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["manufacturerName"], "Boeing");
        assert!(json.get("operatorCallsign").is_some());
    }

    #[test]
    fn test_journey_serializes_camel_case() {
        let journey = FlightJourney {
            icao24: "4ca1fa".to_string(),
            callsign: Some("RYR12".to_string()),
            origin_country: None,
            departure_time: 100,
            arrival_time: 200,
            departure_position: Position::from_parts(Some(1.0), Some(2.0)),
            arrival_position: Position::from_parts(None, Some(2.0)),
            max_altitude: Some(11000.0),
            observations: 3,
        };
        let json = serde_json::to_value(&journey).unwrap();
        assert_eq!(json["departureTime"], 100);
        assert_eq!(json["departurePosition"]["latitude"], 1.0);
        assert!(json["arrivalPosition"].is_null());
    }
}
