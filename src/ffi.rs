//! FFI bindings for mobile platforms (iOS/Android).
//!
//! Exposes the standalone algorithms plus one process-wide playback session
//! to Kotlin and Swift through UniFFI. The host loads a journey once, then
//! drives the session from its display link or timer and reads the state
//! back as JSON.
//!
//! Session calls made before [`playback_load`] fail with
//! [`PlaybackError::NoSession`].

use std::sync::Mutex;

use log::{debug, info};
use once_cell::sync::Lazy;

use crate::{
    detect_passes, douglas_peucker, init_logging, GpsPoint, Journey, JourneySummary, PassEvent,
    PlaybackClock, PlaybackConfig, PlaybackError, PlaybackListener, PlaybackMode,
    ProximityConfig, RailwaySegment, Station, TickHandle, TickOutcome, TrajectoryPoint,
};

// ============================================================================
// Callback Interface (for playback notifications to mobile)
// ============================================================================

/// Callback interface for playback notifications.
/// Implement this in Kotlin/Swift to animate the camera and update the UI.
///
/// Callbacks run while the session lock is held. Dispatch to the UI thread
/// instead of calling back into `playback_*` from inside them.
#[uniffi::export(callback_interface)]
pub trait PlaybackCallback: Send + Sync {
    /// The camera should animate to the current marker position.
    fn on_camera_refresh(&self, counter: u64);
    /// Railway mode moved to another pass event. -1 means none yet.
    fn on_station_changed(&self, pass_index: i64);
    /// Playback reached the end.
    fn on_completed(&self);
}

struct CallbackListener(Box<dyn PlaybackCallback>);

impl PlaybackListener for CallbackListener {
    fn on_camera_refresh(&self, counter: u64) {
        self.0.on_camera_refresh(counter);
    }

    fn on_station_changed(&self, pass_index: Option<usize>) {
        self.0
            .on_station_changed(pass_index.map(|i| i as i64).unwrap_or(-1));
    }

    fn on_completed(&self) {
        self.0.on_completed();
    }
}

// ============================================================================
// Standalone Algorithms
// ============================================================================

/// Douglas-Peucker simplification with an explicit tolerance in degrees.
#[uniffi::export]
pub fn ffi_simplify(points: Vec<GpsPoint>, epsilon: f64) -> Vec<GpsPoint> {
    init_logging();
    douglas_peucker(&points, epsilon)
}

/// Detect station passes along a trajectory.
#[uniffi::export]
pub fn ffi_detect_passes(
    trajectory: Vec<TrajectoryPoint>,
    stations: Vec<Station>,
    config: ProximityConfig,
) -> Result<Vec<PassEvent>, PlaybackError> {
    init_logging();
    config.validate()?;
    info!(
        "[PlaybackFfi] detect_passes: {} points, {} stations",
        trajectory.len(),
        stations.len()
    );
    Ok(detect_passes(&trajectory, &stations, &config))
}

#[uniffi::export]
pub fn default_playback_config() -> PlaybackConfig {
    PlaybackConfig::default()
}

#[uniffi::export]
pub fn default_proximity_config() -> ProximityConfig {
    ProximityConfig::default()
}

// ============================================================================
// Playback Session
// ============================================================================

struct Session {
    clock: PlaybackClock,
    tick: Option<TickHandle>,
}

static SESSION: Lazy<Mutex<Option<Session>>> = Lazy::new(|| Mutex::new(None));

/// Run `f` against the loaded session.
fn with_session<F, R>(f: F) -> Result<R, PlaybackError>
where
    F: FnOnce(&mut Session) -> R,
{
    let mut guard = SESSION.lock().unwrap_or_else(|e| e.into_inner());
    let session = guard.as_mut().ok_or(PlaybackError::NoSession)?;
    Ok(f(session))
}

/// Load a journey and replace any existing session.
#[uniffi::export]
pub fn playback_load(
    trajectory: Vec<TrajectoryPoint>,
    stations: Vec<Station>,
    events: Vec<PassEvent>,
    segments: Vec<RailwaySegment>,
    config: PlaybackConfig,
) -> Result<JourneySummary, PlaybackError> {
    init_logging();
    let journey = Journey::new(trajectory)
        .with_passes(stations, events)
        .with_railway_segments(segments);
    let summary = journey.summary();
    let clock = PlaybackClock::new(journey, config)?;

    let mut guard = SESSION.lock().unwrap_or_else(|e| e.into_inner());
    *guard = Some(Session { clock, tick: None });
    info!(
        "[PlaybackFfi] Session loaded: {} points, {} passes",
        summary.point_count, summary.pass_count
    );
    Ok(summary)
}

/// Load a journey from JSON documents (arrays of trajectory points, stations,
/// pass events and railway segments, plus a config object).
#[uniffi::export]
pub fn playback_load_json(
    trajectory_json: String,
    stations_json: String,
    events_json: String,
    segments_json: String,
    config_json: String,
) -> Result<String, PlaybackError> {
    let summary = playback_load(
        serde_json::from_str(&trajectory_json)?,
        serde_json::from_str(&stations_json)?,
        serde_json::from_str(&events_json)?,
        serde_json::from_str(&segments_json)?,
        serde_json::from_str(&config_json)?,
    )?;
    Ok(serde_json::to_string(&summary)?)
}

/// Drop the session.
#[uniffi::export]
pub fn playback_close() {
    let mut guard = SESSION.lock().unwrap_or_else(|e| e.into_inner());
    if guard.take().is_some() {
        info!("[PlaybackFfi] Session closed");
    }
}

#[uniffi::export]
pub fn playback_set_callback(callback: Box<dyn PlaybackCallback>) -> Result<(), PlaybackError> {
    with_session(|s| s.clock.set_listener(Box::new(CallbackListener(callback))))
}

/// Drop the host callback, e.g. when the map view is torn down but the
/// session stays loaded.
#[uniffi::export]
pub fn playback_clear_callback() -> Result<(), PlaybackError> {
    with_session(|s| s.clock.clear_listener())
}

/// Start playback. Returns false when the journey is empty.
#[uniffi::export]
pub fn playback_start() -> Result<bool, PlaybackError> {
    with_session(|s| {
        s.tick = s.clock.start();
        s.tick.is_some()
    })
}

#[uniffi::export]
pub fn playback_pause() -> Result<(), PlaybackError> {
    with_session(|s| {
        s.clock.pause();
        s.tick = None;
    })
}

#[uniffi::export]
pub fn playback_resume() -> Result<(), PlaybackError> {
    with_session(|s| {
        if let Some(handle) = s.clock.resume() {
            s.tick = Some(handle);
        }
    })
}

#[uniffi::export]
pub fn playback_toggle() -> Result<(), PlaybackError> {
    with_session(|s| {
        s.clock.toggle();
        s.tick = s.clock.state().active_tick();
    })
}

#[uniffi::export]
pub fn playback_stop() -> Result<(), PlaybackError> {
    with_session(|s| {
        s.clock.stop();
        s.tick = None;
    })
}

#[uniffi::export]
pub fn playback_seek(time: f64) -> Result<(), PlaybackError> {
    with_session(|s| s.clock.seek(time))
}

#[uniffi::export]
pub fn playback_seek_to_progress(progress: f64) -> Result<(), PlaybackError> {
    with_session(|s| s.clock.seek_to_progress(progress))
}

/// Real-time tick with the wall-clock seconds since the previous frame.
/// Returns true while playback is still running.
#[uniffi::export]
pub fn playback_tick(delta: f64) -> Result<bool, PlaybackError> {
    with_session(|s| match s.tick {
        Some(handle) => is_running(s.clock.tick(handle, delta)),
        None => false,
    })
}

/// Fixed-frequency tick. Returns true while playback is still running.
#[uniffi::export]
pub fn playback_update_frame() -> Result<bool, PlaybackError> {
    with_session(|s| match s.tick {
        Some(handle) => is_running(s.clock.update_playback_frame(handle)),
        None => false,
    })
}

fn is_running(outcome: TickOutcome) -> bool {
    matches!(outcome, TickOutcome::Advanced(_))
}

#[uniffi::export]
pub fn playback_set_mode(mode: PlaybackMode) -> Result<(), PlaybackError> {
    with_session(|s| s.clock.set_mode(mode))
}

#[uniffi::export]
pub fn playback_set_duration(duration: f64) -> Result<(), PlaybackError> {
    with_session(|s| s.clock.set_duration(duration))
}

#[uniffi::export]
pub fn playback_set_update_frequency(update_frequency: f64) -> Result<(), PlaybackError> {
    with_session(|s| s.clock.set_update_frequency(update_frequency))?
}

/// Returns true when the new distance moved the path to another zoom tier.
#[uniffi::export]
pub fn playback_set_camera_distance(camera_distance: f64) -> Result<bool, PlaybackError> {
    with_session(|s| {
        let recomputed = s.clock.set_camera_distance(camera_distance);
        if recomputed {
            debug!("[PlaybackFfi] Camera moved to {:.0}m", camera_distance);
        }
        recomputed
    })
}

/// Full playback state as JSON.
#[uniffi::export]
pub fn playback_state_json() -> Result<String, PlaybackError> {
    with_session(|s| s.clock.snapshot_json())?
}

#[uniffi::export]
pub fn playback_elapsed_text() -> Result<String, PlaybackError> {
    with_session(|s| s.clock.elapsed_text())
}

#[uniffi::export]
pub fn playback_compression_ratio() -> Result<f64, PlaybackError> {
    with_session(|s| s.clock.compression_ratio())
}

/// Station the Railway marker currently sits on, if any.
#[uniffi::export]
pub fn playback_current_station() -> Result<Option<Station>, PlaybackError> {
    with_session(|s| {
        s.clock
            .current_station()
            .and_then(|(_, station)| station.cloned())
    })
}
