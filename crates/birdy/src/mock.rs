//! Synthetic live snapshots.
//!
//! Used whenever no provider credential is configured or the provider failed,
//! so the viewer always has something plausible to draw.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::model::AircraftState;

const AIRLINES: &[&str] = &[
    "AAL", "AFR", "BAW", "DAL", "DLH", "EZY", "IBE", "KLM", "QTR", "RYR", "SWR", "UAE", "UAL",
];

const COUNTRIES: &[&str] = &[
    "United States",
    "United Kingdom",
    "Germany",
    "France",
    "Spain",
    "Netherlands",
    "Ireland",
    "Switzerland",
    "Qatar",
    "United Arab Emirates",
    "Canada",
    "Japan",
];

/// Share of generated aircraft that are airborne.
const AIRBORNE_RATIO: f64 = 0.85;

/// Generates random aircraft with plausible value ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockGenerator {
    count: usize,
}

impl MockGenerator {
    /// A generator producing `count` aircraft per snapshot.
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self { count }
    }

    /// Number of aircraft per snapshot.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Produce a snapshot with the thread-local RNG.
    #[must_use]
    pub fn generate(&self, now: i64) -> Vec<AircraftState> {
        self.generate_with(&mut rand::thread_rng(), now)
    }

    /// Produce a snapshot from the given RNG; `now` is the epoch second stamped
    /// on every record.
    pub fn generate_with<R: Rng>(&self, rng: &mut R, now: i64) -> Vec<AircraftState> {
        (0..self.count).map(|_| aircraft(rng, now)).collect()
    }
}

fn aircraft<R: Rng>(rng: &mut R, now: i64) -> AircraftState {
    let on_ground = !rng.gen_bool(AIRBORNE_RATIO);
    let airline = AIRLINES.choose(rng).copied().unwrap_or("XXX");
    let callsign = format!("{airline}{}", rng.gen_range(1..=9999));

    let (baro_altitude, velocity, vertical_rate) = if on_ground {
        (0.0, rng.gen_range(0.0..15.0), 0.0)
    } else {
        (
            rng.gen_range(300.0..12_500.0),
            rng.gen_range(70.0..260.0),
            rng.gen_range(-15.0..15.0),
        )
    };

    AircraftState {
        icao24: format!("{:06x}", rng.gen_range(0..=0x00ff_ffff_u32)),
        callsign: Some(callsign),
        origin_country: COUNTRIES.choose(rng).map(|c| (*c).to_string()),
        longitude: Some(rng.gen_range(-180.0..180.0)),
        latitude: Some(rng.gen_range(-60.0..70.0)),
        baro_altitude: Some(baro_altitude),
        geo_altitude: Some(baro_altitude + rng.gen_range(-50.0..50.0_f64).max(-baro_altitude)),
        on_ground,
        velocity: Some(velocity),
        true_track: Some(rng.gen_range(0.0..360.0)),
        vertical_rate: Some(vertical_rate),
        squawk: Some(format!("{:04o}", rng.gen_range(0..0o10000))),
        time_position: Some(now - rng.gen_range(0..10)),
        last_contact: Some(now),
    }
}
