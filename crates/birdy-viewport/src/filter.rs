//! Search, policy filtering, ordering and viewport clipping.

use std::cmp::Ordering;
use std::str::FromStr;

use thiserror::Error;
use tracing::trace;

use crate::policy::ZoomPolicy;
use crate::Track;

/// Padding added around the viewport, in degrees, so markers just outside the
/// visible edge are already placed when the user pans.
pub const VIEWPORT_PADDING_DEG: f64 = 2.0;

/// Geographic bounding box of the rendered map.
///
/// A box whose `west` edge is greater than its `east` edge crosses the
/// antimeridian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Southern latitude edge.
    pub south: f64,
    /// Western longitude edge.
    pub west: f64,
    /// Northern latitude edge.
    pub north: f64,
    /// Eastern longitude edge.
    pub east: f64,
}

impl Bounds {
    /// The whole globe.
    pub const WORLD: Self = Self {
        south: -90.0,
        west: -180.0,
        north: 90.0,
        east: 180.0,
    };

    /// Create a bounding box from its edges.
    #[must_use]
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// Whether a position lies inside the box grown by `padding` degrees.
    #[must_use]
    pub fn contains(&self, latitude: f64, longitude: f64, padding: f64) -> bool {
        if latitude < self.south - padding || latitude > self.north + padding {
            return false;
        }
        if self.west <= self.east {
            longitude >= self.west - padding && longitude <= self.east + padding
        } else {
            longitude >= self.west - padding || longitude <= self.east + padding
        }
    }
}

/// Error returned when a `south,west,north,east` string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid bounds '{input}': expected south,west,north,east in degrees")]
pub struct ParseBoundsError {
    input: String,
}

impl FromStr for Bounds {
    type Err = ParseBoundsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseBoundsError {
            input: s.to_string(),
        };
        let edges = s
            .split(',')
            .map(|part| part.trim().parse::<f64>().map_err(|_| err()))
            .collect::<Result<Vec<_>, _>>()?;
        let &[south, west, north, east] = edges.as_slice() else {
            return Err(err());
        };
        if south > north || !(-90.0..=90.0).contains(&south) || !(-90.0..=90.0).contains(&north) {
            return Err(err());
        }
        Ok(Self::new(south, west, north, east))
    }
}

/// Inputs of one viewport selection.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewQuery {
    /// Free-text filter over identifier, callsign and origin country.
    pub search: String,
    /// Only keep aircraft that are not on the ground.
    pub airborne_only: bool,
    /// Visible map area; `None` keeps every positioned record.
    pub bounds: Option<Bounds>,
    /// Map zoom factor, 1.0 being full detail.
    pub zoom: f64,
}

impl Default for ViewQuery {
    fn default() -> Self {
        Self {
            search: String::new(),
            airborne_only: false,
            bounds: None,
            zoom: 1.0,
        }
    }
}

/// Result of a viewport selection.
#[derive(Debug)]
pub struct Selection<'a, T> {
    /// Policy derived from the query zoom.
    pub policy: ZoomPolicy,
    /// Records that passed every filter, before the display cap.
    pub matched: usize,
    /// Sorted records after the display cap.
    pub displayed: Vec<&'a T>,
    /// The renderable subset of `displayed` inside the padded viewport.
    pub visible: Vec<&'a T>,
}

/// Select the records a map should render for `query`.
///
/// Filtering runs policy rules, search and the airborne toggle; the survivors
/// are ordered (airborne first when the policy asks for it, then altitude and
/// velocity descending, ties keeping input order), capped, and clipped to the
/// viewport. Records without a position never reach `visible`.
pub fn select<'a, T: Track>(aircraft: &'a [T], query: &ViewQuery) -> Selection<'a, T> {
    let policy = ZoomPolicy::for_zoom(query.zoom);
    let needle = query.search.trim().to_lowercase();

    let mut displayed: Vec<&T> = aircraft
        .iter()
        .filter(|a| policy.admits(a.on_ground(), a.altitude()))
        .filter(|a| matches_search(*a, &needle))
        .filter(|a| !query.airborne_only || !a.on_ground())
        .collect();
    let matched = displayed.len();

    displayed.sort_by(|a, b| compare(*a, *b, policy.prioritize_airborne));
    displayed.truncate(policy.max_display);

    let visible = displayed
        .iter()
        .copied()
        .filter(|a| match (a.position(), query.bounds) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some((lat, lon)), Some(bounds)) => bounds.contains(lat, lon, VIEWPORT_PADDING_DEG),
        })
        .collect::<Vec<_>>();

    trace!(
        total = aircraft.len(),
        matched,
        displayed = displayed.len(),
        visible = visible.len(),
        "viewport selection"
    );

    Selection {
        policy,
        matched,
        displayed,
        visible,
    }
}

fn matches_search<T: Track>(aircraft: &T, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let hit = |field: Option<&str>| field.is_some_and(|f| f.to_lowercase().contains(needle));
    hit(Some(aircraft.icao24())) || hit(aircraft.callsign()) || hit(aircraft.origin_country())
}

fn compare<T: Track>(a: &T, b: &T, prioritize_airborne: bool) -> Ordering {
    let airborne = if prioritize_airborne {
        a.on_ground().cmp(&b.on_ground())
    } else {
        Ordering::Equal
    };
    airborne
        .then_with(|| descending(a.altitude(), b.altitude()))
        .then_with(|| descending(a.velocity(), b.velocity()))
}

/// Descending order with missing values last.
fn descending(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Plane;

    fn ids<T: Track>(records: &[&T]) -> Vec<String> {
        records.iter().map(|r| r.icao24().to_string()).collect()
    }

    fn query(zoom: f64) -> ViewQuery {
        ViewQuery {
            zoom,
            ..ViewQuery::default()
        }
    }

    #[test]
    fn test_coarse_zoom_drops_grounded_and_low() {
        let mut fleet = Vec::new();
        for i in 0..400 {
            fleet.push(Plane::airborne(&format!("a{i:05}"), 10_000.0 + f64::from(i), 200.0));
        }
        for i in 0..50 {
            fleet.push(Plane::airborne(&format!("l{i:05}"), 9_000.0, 250.0));
            fleet.push(Plane::grounded(&format!("g{i:05}")));
        }

        let selection = select(&fleet, &query(0.3));

        assert!(selection.displayed.len() <= 300);
        assert_eq!(selection.matched, 400);
        for record in &selection.displayed {
            assert!(!record.on_ground);
            assert!(record.altitude.unwrap() >= 10_000.0);
        }
    }

    #[test]
    fn test_sort_airborne_first_then_altitude_then_velocity() {
        // a high-elevation airfield reports a grounded aircraft above the floor
        let mut parked = Plane::grounded("parked");
        parked.altitude = Some(1_600.0);
        let fleet = vec![
            parked,
            Plane::airborne("low", 1_500.0, 300.0),
            Plane::airborne("high-slow", 11_000.0, 200.0),
            Plane::airborne("high-fast", 11_000.0, 250.0),
        ];

        let selection = select(&fleet, &query(0.7));
        assert_eq!(
            ids(&selection.displayed),
            vec!["high-fast", "high-slow", "low", "parked"]
        );

        let selection = select(&fleet, &query(1.0));
        assert_eq!(
            ids(&selection.displayed),
            vec!["high-fast", "high-slow", "parked", "low"]
        );
    }

    #[test]
    fn test_sort_is_stable_for_ties() {
        let fleet = vec![
            Plane::airborne("first", 5_000.0, 100.0),
            Plane::airborne("second", 5_000.0, 100.0),
            Plane::airborne("third", 5_000.0, 100.0),
        ];
        let selection = select(&fleet, &query(1.0));
        assert_eq!(ids(&selection.displayed), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_missing_altitude_sorts_last() {
        let mut unknown = Plane::airborne("unknown", 0.0, 100.0);
        unknown.altitude = None;
        let fleet = vec![unknown, Plane::airborne("known", 100.0, 100.0)];
        let selection = select(&fleet, &query(1.0));
        assert_eq!(ids(&selection.displayed), vec!["known", "unknown"]);
    }

    #[test]
    fn test_search_is_case_insensitive_across_fields() {
        let mut by_callsign = Plane::airborne("aaaaaa", 1.0, 1.0);
        by_callsign.callsign = Some("DLH123".to_string());
        let mut by_country = Plane::airborne("bbbbbb", 1.0, 1.0);
        by_country.country = Some("Germany".to_string());
        let by_id = Plane::airborne("3c6dlh", 1.0, 1.0);
        let other = Plane::airborne("cccccc", 1.0, 1.0);
        let fleet = vec![by_callsign, by_country, by_id, other];

        let mut q = query(1.0);
        q.search = "DlH".to_string();
        assert_eq!(ids(&select(&fleet, &q).displayed), vec!["aaaaaa", "3c6dlh"]);

        q.search = "  germ ".to_string();
        assert_eq!(ids(&select(&fleet, &q).displayed), vec!["bbbbbb"]);
    }

    #[test]
    fn test_airborne_only() {
        let fleet = vec![Plane::grounded("ground"), Plane::airborne("air", 10.0, 10.0)];
        let mut q = query(1.0);
        q.airborne_only = true;
        assert_eq!(ids(&select(&fleet, &q).displayed), vec!["air"]);
    }

    #[test]
    fn test_cap_applies_before_viewport() {
        let fleet: Vec<Plane> = (0..1_200)
            .map(|i| Plane::airborne(&format!("p{i:05}"), f64::from(i), 1.0))
            .collect();
        let selection = select(&fleet, &query(2.0));
        assert_eq!(selection.matched, 1_200);
        assert_eq!(selection.displayed.len(), 1_000);
        assert_eq!(selection.visible.len(), 1_000);
    }

    #[test]
    fn test_unpositioned_records_never_visible() {
        let mut lost = Plane::airborne("lost", 12_000.0, 1.0);
        lost.position = None;
        let fleet = vec![lost, Plane::airborne("found", 11_000.0, 1.0)];

        let selection = select(&fleet, &query(1.0));
        assert_eq!(selection.displayed.len(), 2);
        assert_eq!(ids(&selection.visible), vec!["found"]);

        let mut q = query(1.0);
        q.bounds = Some(Bounds::WORLD);
        assert_eq!(ids(&select(&fleet, &q).visible), vec!["found"]);
    }

    #[test]
    fn test_viewport_with_padding() {
        let fleet = vec![
            Plane::airborne("inside", 1.0, 1.0).at(48.0, 2.0),
            Plane::airborne("padded", 1.0, 1.0).at(51.5, 2.0),
            Plane::airborne("outside", 1.0, 1.0).at(60.0, 2.0),
        ];
        let mut q = query(1.0);
        q.bounds = Some(Bounds::new(45.0, 0.0, 50.0, 5.0));
        assert_eq!(ids(&select(&fleet, &q).visible), vec!["inside", "padded"]);
    }

    #[test]
    fn test_bounds_across_antimeridian() {
        let bounds = Bounds::new(-20.0, 170.0, 10.0, -170.0);
        assert!(bounds.contains(0.0, 175.0, 0.0));
        assert!(bounds.contains(0.0, -175.0, 0.0));
        assert!(!bounds.contains(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_bounds_from_str() {
        let bounds: Bounds = "45, 0, 50, 5".parse().unwrap();
        assert_eq!(bounds, Bounds::new(45.0, 0.0, 50.0, 5.0));

        assert!("45,0,50".parse::<Bounds>().is_err());
        assert!("a,b,c,d".parse::<Bounds>().is_err());
        assert!("50,0,45,5".parse::<Bounds>().is_err());
        let err = "1,2".parse::<Bounds>().unwrap_err();
        assert!(err.to_string().contains("south,west,north,east"));
    }
}
