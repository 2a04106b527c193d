//! `birdy-viewport` - Viewport selection and chunked reveal for map rendering
//!
//! This crate turns a full in-memory aircraft collection into the subset a map
//! should draw at the current zoom level and bounding box, and then reveals that
//! subset in fixed-size chunks so that no single frame has to place every marker.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod chunk;
pub mod filter;
pub mod policy;
pub mod refresh;

pub use chunk::{ChunkCursor, ChunkRevealer, DEFAULT_CHUNK_DELAY, DEFAULT_CHUNK_SIZE};
pub use filter::{select, Bounds, Selection, ViewQuery, VIEWPORT_PADDING_DEG};
pub use policy::ZoomPolicy;
pub use refresh::AutoRefresh;

/// Read access to the fields the viewport engine filters and sorts on.
///
/// Implemented by the live aircraft record type of the server crate; kept as a
/// trait so this crate has no dependency on the wire model.
pub trait Track {
    /// Transponder address (lowercase hex).
    fn icao24(&self) -> &str;

    /// Flight callsign, if reported.
    fn callsign(&self) -> Option<&str>;

    /// Country of registration, if reported.
    fn origin_country(&self) -> Option<&str>;

    /// `(latitude, longitude)` in degrees, or `None` when the position is unknown.
    fn position(&self) -> Option<(f64, f64)>;

    /// Altitude in the units reported by the source.
    fn altitude(&self) -> Option<f64>;

    /// Ground speed in the units reported by the source.
    fn velocity(&self) -> Option<f64>;

    /// Whether the aircraft is on the ground.
    fn on_ground(&self) -> bool;
}
