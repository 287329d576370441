//! # Algorithm Toolbox
//!
//! Flat access to the standalone algorithms, for callers that want to drive
//! simplification, pass detection or position interpolation themselves
//! without a [`PlaybackClock`](crate::PlaybackClock).
//!
//! ## Core Algorithms
//!
//! - **Douglas-Peucker**: Line simplification with a planar tolerance
//! - **Pass Detection**: Enter/exit hysteresis around station coordinates
//! - **Interpolation**: Position and traveled path at a progress fraction
//!
//! ## Geographic Utilities
//!
//! - **Haversine Distance**: Great-circle distance between GPS points
//! - **Polyline Length**: Total distance along a path
//! - **Perpendicular Distance**: Planar point-to-line distance in degrees
//!
//! # Example
//!
//! ```rust
//! use route_playback::algorithms::{douglas_peucker, gps_position, GpsPoint};
//!
//! let line: Vec<GpsPoint> = (0..5).map(|i| GpsPoint::new(0.0, i as f64)).collect();
//! let simplified = douglas_peucker(&line, 0.1);
//! assert_eq!(simplified.len(), 2);
//!
//! let halfway = gps_position(&simplified, 0.5).unwrap();
//! assert_eq!(halfway, GpsPoint::new(0.0, 2.0));
//! ```

// =============================================================================
// Core Types (re-exported from lib)
// =============================================================================

pub use crate::{Bounds, GpsPoint, PassEvent, RailwaySegment, Station, TrajectoryPoint};

// =============================================================================
// Geographic Utilities
// =============================================================================

pub use crate::geo_utils::{
    haversine_distance, interpolate, perpendicular_distance, polyline_length, search_window,
};

// =============================================================================
// Simplification
// =============================================================================

pub use crate::simplify::{douglas_peucker, TierEntry, ZoomTier, ZoomTierTable};

// =============================================================================
// Pass Detection
// =============================================================================

pub use crate::detection::{detect_passes, ProximityConfig};

// =============================================================================
// Interpolation
// =============================================================================

pub use crate::playback::advance::{gps_position, gps_traveled_path, progress};
pub use crate::playback::format::{compression_ratio, elapsed_text, format_time};
