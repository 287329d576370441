//! # Playback
//!
//! Compressed, seekable playback of a recorded journey.
//!
//! Playback time (`elapsed`, `0..=duration`) is a user-chosen compression of
//! the journey's real time span. Every advance maps it to a progress fraction
//! and derives an on-screen position plus the path travelled so far, in one of
//! two route-source modes:
//!
//! - [`PlaybackMode::Gps`] walks the display-simplified polyline, uniformly
//!   in vertex index.
//! - [`PlaybackMode::Railway`] snaps to the station of the latest pass event
//!   and reveals railway segments between passed stations.
//!
//! ## Architecture
//!
//! - [`Journey`] holds the immutable inputs (trajectory, simplifier, events,
//!   station catalog, railway segments).
//! - [`PlaybackState`] is a plain value owned by whoever drives playback.
//! - [`advance`] contains the pure transitions: each takes the state by value
//!   and returns the next one. The host owns the timer or frame loop.
//! - [`PlaybackClock`] bundles a journey and a state behind a small
//!   imperative API and forwards notifications to a [`PlaybackListener`].
//!
//! Tick sources are modelled as generation-stamped [`TickHandle`]s. Pausing
//! or stopping retires the current handle, so a tick that was already queued
//! by the host is reported as [`TickOutcome::Stale`] and changes nothing.

use serde::{Deserialize, Serialize};

use crate::error::{PlaybackError, Result};
use crate::GpsPoint;

pub mod advance;
pub mod clock;
pub mod format;
pub mod journey;

pub use clock::{PlaybackClock, PlaybackListener};
pub use format::{compression_ratio, elapsed_text, format_time};
pub use journey::{Journey, JourneySummary};

/// Camera distance assumed until the host reports one, in meters.
pub const DEFAULT_CAMERA_DISTANCE: f64 = 2000.0;

/// Extra slack added to the camera animation duration when throttling refreshes.
pub const CAMERA_REFRESH_SLACK: f64 = 0.1;

/// Route source for the marker position and traveled path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum PlaybackMode {
    #[default]
    Gps,
    Railway,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Playing,
    Paused,
    Completed,
}

/// Configuration for a playback session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct PlaybackConfig {
    /// Compressed playback length in seconds.
    /// Default: 30.0
    pub duration: f64,
    /// Seconds added per fixed-frequency tick.
    /// Default: 1/30 (30 ticks per second)
    pub update_frequency: f64,
    /// Initial route source.
    /// Default: GPS
    pub mode: PlaybackMode,
    /// Minimum wall time between traveled-path recomputations during
    /// real-time ticking.
    /// Default: 0.2 seconds
    pub path_refresh_interval: f64,
    /// Length of the host's camera animation. Camera refreshes are throttled
    /// to one per `camera_animation_duration + 0.1` seconds.
    /// Default: 1.0 seconds
    pub camera_animation_duration: f64,
    /// Radius around a passed station within which a railway segment endpoint
    /// counts as reached.
    /// Default: 500.0 meters
    pub railway_station_radius: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            duration: 30.0,
            update_frequency: 1.0 / 30.0,
            mode: PlaybackMode::Gps,
            path_refresh_interval: 0.2,
            camera_animation_duration: 1.0,
            railway_station_radius: 500.0,
        }
    }
}

impl PlaybackConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(PlaybackError::config(format!(
                "duration must be a non-negative number of seconds (got {})",
                self.duration
            )));
        }
        validate_update_frequency(self.update_frequency)?;
        for (name, value) in [
            ("path refresh interval", self.path_refresh_interval),
            ("camera animation duration", self.camera_animation_duration),
            ("railway station radius", self.railway_station_radius),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PlaybackError::config(format!(
                    "{} must be non-negative (got {})",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Minimum wall time between two camera refresh notifications.
    pub fn camera_refresh_interval(&self) -> f64 {
        self.camera_animation_duration + CAMERA_REFRESH_SLACK
    }
}

pub(crate) fn validate_update_frequency(update_frequency: f64) -> Result<()> {
    if !update_frequency.is_finite() || update_frequency <= 0.0 {
        return Err(PlaybackError::config(format!(
            "update frequency must be positive (got {})",
            update_frequency
        )));
    }
    Ok(())
}

/// Proof of an armed tick source.
///
/// Returned by `start`/`resume`. Only ticks carrying the current handle are
/// applied; pausing retires it and resuming issues a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickHandle {
    generation: u64,
}

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The handle was retired (or playback is not running); nothing changed.
    Stale,
    /// Playback moved forward and is still running.
    Advanced(TickEvents),
    /// Playback reached the end on this tick.
    Completed(TickEvents),
}

impl TickOutcome {
    pub fn events(&self) -> Option<TickEvents> {
        match self {
            TickOutcome::Stale => None,
            TickOutcome::Advanced(events) | TickOutcome::Completed(events) => Some(*events),
        }
    }
}

/// Side effects of a single tick, for the host to react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickEvents {
    /// The traveled path was recomputed
    pub path_updated: bool,
    /// The camera refresh counter was incremented
    pub camera_refreshed: bool,
    /// The current station pass index changed (Railway mode)
    pub station_changed: bool,
}

/// Everything the UI reads each frame.
///
/// Invariant: `0 <= elapsed <= duration` between operations. Serializes with
/// a derived `isPlaying` flag alongside the stored fields.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub elapsed: f64,
    pub duration: f64,
    pub mode: PlaybackMode,
    pub update_frequency: f64,
    pub status: PlaybackStatus,
    pub interpolated_position: Option<GpsPoint>,
    pub traveled_path: Vec<GpsPoint>,
    /// Index into the chronologically sorted pass events (Railway mode)
    pub current_station_pass_index: Option<usize>,
    pub marker_visible: bool,
    /// Incremented every time the host should animate its camera
    pub camera_refresh_counter: u64,
    pub camera_distance: f64,

    // Wall time accumulated since the last throttled recomputation
    #[serde(skip)]
    pub(crate) since_path_update: f64,
    #[serde(skip)]
    pub(crate) since_camera_refresh: f64,
    #[serde(skip)]
    pub(crate) tick_generation: u64,
    #[serde(skip)]
    pub(crate) active_tick: Option<TickHandle>,
}

/// Serialized form of [`PlaybackState`].
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlaybackStateView<'a> {
    elapsed: f64,
    duration: f64,
    mode: PlaybackMode,
    update_frequency: f64,
    status: PlaybackStatus,
    is_playing: bool,
    interpolated_position: Option<GpsPoint>,
    traveled_path: &'a [GpsPoint],
    current_station_pass_index: Option<usize>,
    marker_visible: bool,
    camera_refresh_counter: u64,
    camera_distance: f64,
}

impl Serialize for PlaybackState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        PlaybackStateView {
            elapsed: self.elapsed,
            duration: self.duration,
            mode: self.mode,
            update_frequency: self.update_frequency,
            status: self.status,
            is_playing: self.is_playing(),
            interpolated_position: self.interpolated_position,
            traveled_path: &self.traveled_path,
            current_station_pass_index: self.current_station_pass_index,
            marker_visible: self.marker_visible,
            camera_refresh_counter: self.camera_refresh_counter,
            camera_distance: self.camera_distance,
        }
        .serialize(serializer)
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new(&PlaybackConfig::default())
    }
}

impl PlaybackState {
    /// Fresh idle state for a configuration. Position and path are empty until
    /// the first recomputation against a journey.
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            elapsed: 0.0,
            duration: config.duration,
            mode: config.mode,
            update_frequency: config.update_frequency,
            status: PlaybackStatus::Idle,
            interpolated_position: None,
            traveled_path: Vec::new(),
            current_station_pass_index: None,
            marker_visible: true,
            camera_refresh_counter: 0,
            camera_distance: DEFAULT_CAMERA_DISTANCE,
            since_path_update: 0.0,
            since_camera_refresh: 0.0,
            tick_generation: 0,
            active_tick: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }

    /// `elapsed / duration` clamped to `[0, 1]`; 0 when `duration <= 0`.
    pub fn progress(&self) -> f64 {
        advance::progress(self.elapsed, self.duration)
    }

    /// The currently armed tick source, if any.
    pub fn active_tick(&self) -> Option<TickHandle> {
        self.active_tick
    }

    pub(crate) fn arm_tick(&mut self) -> TickHandle {
        self.tick_generation += 1;
        let handle = TickHandle {
            generation: self.tick_generation,
        };
        self.active_tick = Some(handle);
        self.since_path_update = 0.0;
        self.since_camera_refresh = 0.0;
        handle
    }

    pub(crate) fn disarm_tick(&mut self) {
        self.active_tick = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_valid() {
        let config = PlaybackConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.camera_refresh_interval() - 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_config_validation() {
        let bad_frequency = PlaybackConfig {
            update_frequency: 0.0,
            ..PlaybackConfig::default()
        };
        assert!(bad_frequency.validate().is_err());

        let bad_duration = PlaybackConfig {
            duration: f64::NAN,
            ..PlaybackConfig::default()
        };
        assert!(bad_duration.validate().is_err());

        let bad_radius = PlaybackConfig {
            railway_station_radius: -5.0,
            ..PlaybackConfig::default()
        };
        assert!(bad_radius.validate().is_err());
    }

    #[test]
    fn test_config_partial_json() {
        let config: PlaybackConfig =
            serde_json::from_str(r#"{"duration": 90.0, "mode": "railway"}"#).unwrap();
        assert_eq!(config.duration, 90.0);
        assert_eq!(config.mode, PlaybackMode::Railway);
        assert_eq!(config.railway_station_radius, 500.0);
    }

    #[test]
    fn test_tick_handles_are_unique() {
        let mut state = PlaybackState::default();
        let first = state.arm_tick();
        let second = state.arm_tick();
        assert_ne!(first, second);
        assert_eq!(state.active_tick(), Some(second));
        state.disarm_tick();
        assert_eq!(state.active_tick(), None);
    }

    #[test]
    fn test_state_json_omits_bookkeeping() {
        let state = PlaybackState::default();
        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("currentStationPassIndex").is_some());
        assert!(json.get("sincePathUpdate").is_none());
        assert!(json.get("activeTick").is_none());
    }

    #[test]
    fn test_state_json_reports_is_playing() {
        let mut state = PlaybackState::default();
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["isPlaying"], false);

        state.status = PlaybackStatus::Playing;
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["isPlaying"], true);
        assert_eq!(json["status"], "playing");

        let restored: PlaybackState = serde_json::from_value(json).unwrap();
        assert_eq!(restored, state);
    }
}
