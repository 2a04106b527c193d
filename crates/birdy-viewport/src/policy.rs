//! Zoom-dependent display policy.

/// Zoom level below which the map is considered zoomed out to a coarse view.
const COARSE_ZOOM: f64 = 0.5;

/// Zoom level below which the map is considered at medium detail.
const MEDIUM_ZOOM: f64 = 1.0;

/// How many records to show and how aggressively to filter at a zoom level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomPolicy {
    /// Maximum number of records handed to the renderer.
    pub max_display: usize,
    /// Drop aircraft reported on the ground.
    pub hide_grounded: bool,
    /// Minimum altitude a record needs to be shown, if any.
    pub min_altitude: Option<f64>,
    /// Sort airborne aircraft ahead of grounded ones.
    pub prioritize_airborne: bool,
}

impl ZoomPolicy {
    /// Policy for a coarse, zoomed-out view.
    pub const COARSE: Self = Self {
        max_display: 300,
        hide_grounded: true,
        min_altitude: Some(10_000.0),
        prioritize_airborne: true,
    };

    /// Policy for a medium view.
    pub const MEDIUM: Self = Self {
        max_display: 600,
        hide_grounded: false,
        min_altitude: Some(1_000.0),
        prioritize_airborne: true,
    };

    /// Policy at full detail.
    pub const FULL: Self = Self {
        max_display: 1_000,
        hide_grounded: false,
        min_altitude: None,
        prioritize_airborne: false,
    };

    /// Select the policy for a zoom factor (1.0 is full detail).
    #[must_use]
    pub fn for_zoom(zoom: f64) -> Self {
        if zoom < COARSE_ZOOM {
            Self::COARSE
        } else if zoom < MEDIUM_ZOOM {
            Self::MEDIUM
        } else {
            Self::FULL
        }
    }

    /// Whether a record passes the grounded and altitude rules of this policy.
    ///
    /// A missing altitude never satisfies an altitude floor.
    #[must_use]
    pub fn admits(&self, on_ground: bool, altitude: Option<f64>) -> bool {
        if self.hide_grounded && on_ground {
            return false;
        }
        match self.min_altitude {
            Some(floor) => altitude.is_some_and(|alt| alt >= floor),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_zoom_boundaries() {
        assert_eq!(ZoomPolicy::for_zoom(0.1), ZoomPolicy::COARSE);
        assert_eq!(ZoomPolicy::for_zoom(0.49), ZoomPolicy::COARSE);
        assert_eq!(ZoomPolicy::for_zoom(0.5), ZoomPolicy::MEDIUM);
        assert_eq!(ZoomPolicy::for_zoom(0.99), ZoomPolicy::MEDIUM);
        assert_eq!(ZoomPolicy::for_zoom(1.0), ZoomPolicy::FULL);
        assert_eq!(ZoomPolicy::for_zoom(4.0), ZoomPolicy::FULL);
    }

    #[test]
    fn test_caps() {
        assert_eq!(ZoomPolicy::COARSE.max_display, 300);
        assert_eq!(ZoomPolicy::MEDIUM.max_display, 600);
        assert_eq!(ZoomPolicy::FULL.max_display, 1_000);
    }

    #[test]
    fn test_coarse_admits() {
        let policy = ZoomPolicy::COARSE;
        assert!(policy.admits(false, Some(10_000.0)));
        assert!(!policy.admits(false, Some(9_999.0)));
        assert!(!policy.admits(true, Some(12_000.0)));
        assert!(!policy.admits(false, None));
    }

    #[test]
    fn test_medium_admits() {
        let policy = ZoomPolicy::MEDIUM;
        assert!(policy.admits(false, Some(1_000.0)));
        assert!(!policy.admits(false, Some(500.0)));
        assert!(!policy.admits(true, Some(0.0)));
    }

    #[test]
    fn test_full_admits_everything() {
        let policy = ZoomPolicy::FULL;
        assert!(policy.admits(true, None));
        assert!(policy.admits(false, Some(0.0)));
    }
}
