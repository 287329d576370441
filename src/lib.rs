//! # Route Playback
//!
//! Trajectory analysis and compressed route playback for a map UI.
//!
//! This library provides:
//! - Zoom-aware Douglas-Peucker simplification with per-tier caching
//! - Station pass detection with enter/exit hysteresis
//! - A seekable playback clock that follows either the simplified GPS path
//!   or snaps from station to station along railway geometry
//!
//! No I/O happens here. Trajectories, station catalogs and railway segments
//! arrive as plain data and come back out as plain data.
//!
//! ## Features
//!
//! - **`parallel`** - Scan stations in parallel with rayon during pass detection
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use route_playback::{Journey, PlaybackClock, PlaybackConfig, TrajectoryPoint};
//!
//! let trajectory: Vec<TrajectoryPoint> = (0..10)
//!     .map(|i| TrajectoryPoint::new(i as f64 * 10.0, 51.50 + i as f64 * 0.001, -0.12))
//!     .collect();
//!
//! let journey = Journey::new(trajectory);
//! let mut clock = PlaybackClock::new(journey, PlaybackConfig::default()).unwrap();
//!
//! if let Some(handle) = clock.start() {
//!     clock.tick(handle, 0.5);
//! }
//! println!("{}", clock.elapsed_text());
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{PlaybackError, Result};

// Geographic utilities (distance, bounds, planar perpendicular distance)
pub mod geo_utils;

// Zoom-tier polyline simplification with caching
pub mod simplify;
pub use simplify::{
    douglas_peucker, PathSimplifier, SimplificationCache, SimplificationHandle, ZoomTier,
    ZoomTierTable,
};

// Proximity-based station pass detection
pub mod detection;
pub use detection::{detect_passes, detect_passes_background, PassDetectionHandle, ProximityConfig};

// Spatial index over station coordinates
pub mod station_index;
pub use station_index::StationIndex;

// Playback clock and interpolation engine
pub mod playback;
pub use playback::{
    Journey, JourneySummary, PlaybackClock, PlaybackConfig, PlaybackListener, PlaybackMode,
    PlaybackState, PlaybackStatus, TickHandle, TickOutcome,
};

// Algorithm toolbox - flat access to the standalone algorithms
pub mod algorithms;

// FFI bindings for mobile platforms (iOS/Android)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("RoutePlaybackRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use route_playback::GpsPoint;
/// let point = GpsPoint::new(51.5074, -0.1278); // London
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// A single recorded GPS sample.
///
/// Samples are immutable once recorded. A trajectory is a slice of samples
/// ordered by non-decreasing `timestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct TrajectoryPoint {
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    pub latitude: f64,
    pub longitude: f64,
    /// Meters above sea level
    #[serde(default)]
    pub altitude: f64,
    /// Meters per second, negative when unknown
    #[serde(default)]
    pub speed: f64,
    /// Degrees from true north, negative when unknown
    #[serde(default)]
    pub course: f64,
    /// Meters
    #[serde(default)]
    pub horizontal_accuracy: f64,
    /// Meters
    #[serde(default)]
    pub vertical_accuracy: f64,
}

impl TrajectoryPoint {
    /// Create a sample with only time and position set.
    pub fn new(timestamp: f64, latitude: f64, longitude: f64) -> Self {
        Self {
            timestamp,
            latitude,
            longitude,
            altitude: 0.0,
            speed: -1.0,
            course: -1.0,
            horizontal_accuracy: 0.0,
            vertical_accuracy: 0.0,
        }
    }

    /// The horizontal position of this sample.
    pub fn coordinate(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }
}

/// A station from the external catalog. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Station {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Station type as reported by the catalog (e.g. "station", "halt")
    #[serde(default, rename = "type")]
    pub station_type: Option<String>,
    #[serde(default)]
    pub operator: Option<String>,
}

impl Station {
    /// Create a station without type or operator.
    pub fn new(id: &str, name: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            latitude,
            longitude,
            station_type: None,
            operator: None,
        }
    }

    pub fn coordinate(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }
}

/// A detected visit to a station.
///
/// Refers to its station by id only; resolve it against the catalog that was
/// passed to detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct PassEvent {
    /// Stable identifier: `"{station_id}:{entry_index}"`
    pub id: String,
    /// Time of closest approach (seconds since the Unix epoch)
    pub timestamp: f64,
    /// Closest approach in meters
    pub distance_from_station: f64,
    /// First trajectory index inside the radius
    pub entry_index: u32,
    /// First trajectory index outside the radius, or the last index
    pub exit_index: u32,
    pub station_id: String,
    /// Position in the chronologically sorted event list
    pub display_order: u32,
}

/// Railway geometry between two stations, supplied by a routing service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RailwaySegment {
    pub coordinates: Vec<GpsPoint>,
}

impl RailwaySegment {
    pub fn new(coordinates: Vec<GpsPoint>) -> Self {
        Self { coordinates }
    }

    pub fn start(&self) -> Option<&GpsPoint> {
        self.coordinates.first()
    }

    pub fn end(&self) -> Option<&GpsPoint> {
        self.coordinates.last()
    }
}

/// Bounding box for a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from GPS points.
    pub fn from_points(points: &[GpsPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.latitude);
            max_lat = max_lat.max(p.latitude);
            min_lng = min_lng.min(p.longitude);
            max_lng = max_lng.max(p.longitude);
        }

        Some(Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        })
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GpsPoint {
        GpsPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
