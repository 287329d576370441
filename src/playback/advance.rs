//! Pure playback transitions.
//!
//! Every operation takes a [`PlaybackState`] by value together with the
//! [`Journey`] it plays, and returns the next state. Nothing here owns a
//! timer; the host calls [`tick`] or [`tick_fixed`] from whatever loop it runs
//! and keeps the returned state.
//!
//! Divisions by `duration`, by the journey's real duration and by the
//! simplified vertex count are all guarded. Degenerate journeys play at
//! progress 0 and show their first point.

use log::{debug, info};

use super::{
    validate_update_frequency, PlaybackMode, PlaybackState, PlaybackStatus, TickEvents,
    TickHandle, TickOutcome,
};
use crate::error::Result;
use crate::geo_utils::interpolate;
use crate::playback::journey::Journey;
use crate::simplify::ZoomTier;
use crate::GpsPoint;

// Relative slack when comparing accumulated fixed ticks against the duration
const COMPLETION_TOLERANCE: f64 = 1e-9;

/// Knobs from [`PlaybackConfig`](super::PlaybackConfig) that the transitions read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throttle {
    pub path_refresh_interval: f64,
    pub camera_refresh_interval: f64,
    pub railway_station_radius: f64,
}

impl From<&super::PlaybackConfig> for Throttle {
    fn from(config: &super::PlaybackConfig) -> Self {
        Self {
            path_refresh_interval: config.path_refresh_interval,
            camera_refresh_interval: config.camera_refresh_interval(),
            railway_station_radius: config.railway_station_radius,
        }
    }
}

// ============================================================================
// Derived Quantities
// ============================================================================

/// `elapsed / duration` clamped to `[0, 1]`, or 0 when `duration <= 0`.
pub fn progress(elapsed: f64, duration: f64) -> f64 {
    if !(duration > 0.0) {
        return 0.0;
    }
    let p = elapsed / duration;
    if p.is_nan() {
        return 0.0;
    }
    p.clamp(0.0, 1.0)
}

/// Progress actually used for display: 0 on degenerate journeys.
fn effective_progress(journey: &Journey, state: &PlaybackState) -> f64 {
    if journey.is_degenerate() {
        0.0
    } else {
        progress(state.elapsed, state.duration)
    }
}

/// Position on a polyline at `progress`, moving uniformly in vertex index.
pub fn gps_position(simplified: &[GpsPoint], progress: f64) -> Option<GpsPoint> {
    let (floor, ceil, fraction) = vertex_span(simplified.len(), progress)?;
    if floor == ceil {
        return Some(simplified[floor]);
    }
    Some(interpolate(&simplified[floor], &simplified[ceil], fraction))
}

/// All vertices up to the current one, plus the interpolated marker if it
/// differs from the last included vertex.
pub fn gps_traveled_path(simplified: &[GpsPoint], progress: f64) -> Vec<GpsPoint> {
    let Some((floor, _, _)) = vertex_span(simplified.len(), progress) else {
        return Vec::new();
    };
    let mut path = simplified[..=floor].to_vec();
    if let Some(position) = gps_position(simplified, progress) {
        if path.last() != Some(&position) {
            path.push(position);
        }
    }
    path
}

/// `(floor, ceil, fraction)` of `progress * (n - 1)`, clamped to valid indices.
fn vertex_span(count: usize, progress: f64) -> Option<(usize, usize, f64)> {
    if count == 0 {
        return None;
    }
    if count == 1 {
        return Some((0, 0, 0.0));
    }
    let last = count - 1;
    let exact = progress.clamp(0.0, 1.0) * last as f64;
    let floor = (exact.floor() as usize).min(last);
    let ceil = (exact.ceil() as usize).min(last);
    Some((floor, ceil, exact - floor as f64))
}

/// Index of the last event at or before `target_timestamp` (events sorted by time).
pub fn station_pass_index(journey: &Journey, target_timestamp: f64) -> Option<usize> {
    let passed = journey
        .events()
        .partition_point(|e| e.timestamp <= target_timestamp);
    passed.checked_sub(1)
}

/// Railway marker: the station of the current pass, or the first event's
/// station before any pass has happened.
pub fn railway_position(journey: &Journey, pass_index: Option<usize>) -> Option<GpsPoint> {
    if journey.events().is_empty() {
        return None;
    }
    journey.event_coordinate(pass_index.unwrap_or(0))
}

/// Concatenation of every railway segment whose start and end both lie within
/// `radius_meters` of a station passed at or before `pass_index`.
pub fn railway_traveled_path(
    journey: &Journey,
    pass_index: Option<usize>,
    radius_meters: f64,
) -> Vec<GpsPoint> {
    let Some(current) = pass_index else {
        return Vec::new();
    };
    let index = journey.event_index();
    let passed = |idx: usize| idx <= current;

    journey
        .railway_segments()
        .iter()
        .filter(|segment| match (segment.start(), segment.end()) {
            (Some(start), Some(end)) => {
                index.any_within(start, radius_meters, passed)
                    && index.any_within(end, radius_meters, passed)
            }
            _ => false,
        })
        .flat_map(|segment| segment.coordinates.iter().copied())
        .collect()
}

// ============================================================================
// Recomputation
// ============================================================================

/// Recompute the marker (and the station index in Railway mode).
/// Returns true if the station index changed.
fn recompute_position(journey: &Journey, state: &mut PlaybackState) -> bool {
    let progress = effective_progress(journey, state);
    match state.mode {
        PlaybackMode::Gps => {
            let simplified = journey.simplified(state.camera_distance);
            state.interpolated_position = gps_position(&simplified, progress)
                .or_else(|| journey.first_point().map(|p| p.coordinate()));
            false
        }
        PlaybackMode::Railway => {
            let target = journey.target_timestamp(progress);
            let index = station_pass_index(journey, target);
            let changed = index != state.current_station_pass_index;
            state.current_station_pass_index = index;
            state.interpolated_position = railway_position(journey, index);
            changed
        }
    }
}

fn recompute_path(journey: &Journey, state: &mut PlaybackState, radius_meters: f64) {
    state.traveled_path = match state.mode {
        PlaybackMode::Gps => {
            let simplified = journey.simplified(state.camera_distance);
            gps_traveled_path(&simplified, effective_progress(journey, state))
        }
        PlaybackMode::Railway => {
            railway_traveled_path(journey, state.current_station_pass_index, radius_meters)
        }
    };
    state.since_path_update = 0.0;
}

/// Recompute position and traveled path immediately.
pub fn refresh(journey: &Journey, mut state: PlaybackState, throttle: &Throttle) -> PlaybackState {
    recompute_position(journey, &mut state);
    recompute_path(journey, &mut state, throttle.railway_station_radius);
    state
}

// ============================================================================
// State Machine
// ============================================================================

/// Start (or restart) playback. A no-op on an empty journey.
///
/// Starting at or after the end rewinds to 0 first. Starting while already
/// playing keeps the current tick source.
pub fn start(
    journey: &Journey,
    mut state: PlaybackState,
    throttle: &Throttle,
) -> (PlaybackState, Option<TickHandle>) {
    if journey.is_empty() {
        debug!("[PlaybackClock] Start ignored: empty trajectory");
        return (state, None);
    }
    if state.is_playing() {
        let active = state.active_tick;
        return (state, active);
    }

    if state.elapsed >= state.duration {
        state.elapsed = 0.0;
    }
    state.status = PlaybackStatus::Playing;
    state.marker_visible = true;
    let handle = state.arm_tick();
    let state = refresh(journey, state, throttle);
    info!(
        "[PlaybackClock] Started at {:.2}s of {:.2}s ({:?} mode)",
        state.elapsed, state.duration, state.mode
    );
    (state, Some(handle))
}

/// Pause: retire the tick source, keep `elapsed`.
pub fn pause(mut state: PlaybackState) -> PlaybackState {
    if state.is_playing() {
        state.status = PlaybackStatus::Paused;
        state.disarm_tick();
        info!("[PlaybackClock] Paused at {:.2}s", state.elapsed);
    }
    state
}

/// Resume from pause with a fresh tick source.
pub fn resume(mut state: PlaybackState) -> (PlaybackState, Option<TickHandle>) {
    if state.status != PlaybackStatus::Paused {
        return (state, None);
    }
    state.status = PlaybackStatus::Playing;
    let handle = state.arm_tick();
    info!("[PlaybackClock] Resumed at {:.2}s", state.elapsed);
    (state, Some(handle))
}

/// Pause when playing, resume when paused, start otherwise.
pub fn toggle(
    journey: &Journey,
    state: PlaybackState,
    throttle: &Throttle,
) -> (PlaybackState, Option<TickHandle>) {
    match state.status {
        PlaybackStatus::Playing => (pause(state), None),
        PlaybackStatus::Paused => resume(state),
        PlaybackStatus::Idle | PlaybackStatus::Completed => start(journey, state, throttle),
    }
}

/// Back to idle at time 0 with the marker on the start position.
pub fn stop(journey: &Journey, mut state: PlaybackState, throttle: &Throttle) -> PlaybackState {
    state.disarm_tick();
    state.status = PlaybackStatus::Idle;
    state.elapsed = 0.0;
    state.marker_visible = true;
    refresh(journey, state, throttle)
}

/// Jump to `time`, clamped into `[0, duration]`. Status is unchanged.
///
/// The marker is shown again, except when landing exactly on the end.
pub fn seek(
    journey: &Journey,
    mut state: PlaybackState,
    time: f64,
    throttle: &Throttle,
) -> PlaybackState {
    let duration = state.duration.max(0.0);
    state.elapsed = if time.is_nan() {
        0.0
    } else {
        time.clamp(0.0, duration)
    };
    state.marker_visible = !(duration > 0.0 && state.elapsed >= duration);
    refresh(journey, state, throttle)
}

/// `seek(progress * duration)`.
pub fn seek_to_progress(
    journey: &Journey,
    state: PlaybackState,
    progress: f64,
    throttle: &Throttle,
) -> PlaybackState {
    let time = progress * state.duration;
    seek(journey, state, time, throttle)
}

/// Switch route source and recompute.
pub fn set_mode(
    journey: &Journey,
    mut state: PlaybackState,
    mode: PlaybackMode,
    throttle: &Throttle,
) -> PlaybackState {
    if state.mode == mode {
        return state;
    }
    state.mode = mode;
    if mode == PlaybackMode::Gps {
        state.current_station_pass_index = None;
    }
    refresh(journey, state, throttle)
}

/// Change the compressed duration, keeping the current progress fraction.
pub fn set_duration(
    journey: &Journey,
    mut state: PlaybackState,
    duration: f64,
    throttle: &Throttle,
) -> PlaybackState {
    let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
    let fraction = state.progress();
    state.duration = duration;
    state.elapsed = fraction * duration;
    refresh(journey, state, throttle)
}

pub fn set_update_frequency(mut state: PlaybackState, update_frequency: f64) -> Result<PlaybackState> {
    validate_update_frequency(update_frequency)?;
    state.update_frequency = update_frequency;
    Ok(state)
}

/// Record a new camera distance. Recomputes when GPS mode crosses into a
/// different zoom tier. Returns the state and whether a recomputation happened.
pub fn set_camera_distance(
    journey: &Journey,
    mut state: PlaybackState,
    camera_distance: f64,
    throttle: &Throttle,
) -> (PlaybackState, bool) {
    let tiers = journey.simplifier().tiers();
    let before: ZoomTier = tiers.tier_for_distance(state.camera_distance);
    let after: ZoomTier = tiers.tier_for_distance(camera_distance);
    state.camera_distance = camera_distance;

    if state.mode == PlaybackMode::Gps && before != after {
        debug!(
            "[PlaybackClock] Zoom tier {} -> {} at {:.0}m",
            before.index(),
            after.index(),
            camera_distance
        );
        return (refresh(journey, state, throttle), true);
    }
    (state, false)
}

// ============================================================================
// Ticking
// ============================================================================

/// Real-time tick: advance by the wall-clock `delta` since the previous tick.
///
/// The marker is recomputed every tick. The traveled path is recomputed at
/// most once per `path_refresh_interval` of wall time, and camera refreshes
/// are emitted at most once per `camera_refresh_interval`.
pub fn tick(
    journey: &Journey,
    state: PlaybackState,
    handle: TickHandle,
    delta: f64,
    throttle: &Throttle,
) -> (PlaybackState, TickOutcome) {
    let delta = if delta.is_finite() { delta.max(0.0) } else { 0.0 };
    step(journey, state, handle, delta, false, throttle)
}

/// Fixed-frequency tick: advance by exactly `update_frequency` seconds.
///
/// Position and path are recomputed on every tick. Reaching the end usually
/// takes `ceil(duration / update_frequency)` ticks. Elapsed time within
/// `1e-9 * max(duration, 1)` of the duration counts as the end, so a step
/// that leaves only that much remaining completes one tick early.
pub fn tick_fixed(
    journey: &Journey,
    state: PlaybackState,
    handle: TickHandle,
    throttle: &Throttle,
) -> (PlaybackState, TickOutcome) {
    let delta = state.update_frequency;
    step(journey, state, handle, delta, true, throttle)
}

fn step(
    journey: &Journey,
    mut state: PlaybackState,
    handle: TickHandle,
    delta: f64,
    always_update_path: bool,
    throttle: &Throttle,
) -> (PlaybackState, TickOutcome) {
    if !state.is_playing() || state.active_tick != Some(handle) {
        return (state, TickOutcome::Stale);
    }

    state.elapsed += delta;
    state.since_path_update += delta;
    state.since_camera_refresh += delta;

    let tolerance = COMPLETION_TOLERANCE * state.duration.max(1.0);
    if state.elapsed >= state.duration - tolerance {
        return finish(journey, state, throttle);
    }

    let mut events = TickEvents {
        station_changed: recompute_position(journey, &mut state),
        ..TickEvents::default()
    };

    if always_update_path || state.since_path_update >= throttle.path_refresh_interval {
        recompute_path(journey, &mut state, throttle.railway_station_radius);
        events.path_updated = true;
    }

    if state.since_camera_refresh >= throttle.camera_refresh_interval {
        state.camera_refresh_counter += 1;
        state.since_camera_refresh = 0.0;
        events.camera_refreshed = true;
    }

    (state, TickOutcome::Advanced(events))
}

/// Clamp to the end, do one full recomputation and a final camera refresh,
/// then complete and hide the marker.
fn finish(
    journey: &Journey,
    mut state: PlaybackState,
    throttle: &Throttle,
) -> (PlaybackState, TickOutcome) {
    state.elapsed = state.duration.max(0.0);
    let station_changed = recompute_position(journey, &mut state);
    recompute_path(journey, &mut state, throttle.railway_station_radius);

    state.camera_refresh_counter += 1;
    state.since_camera_refresh = 0.0;
    state.status = PlaybackStatus::Completed;
    state.marker_visible = false;
    state.disarm_tick();

    info!(
        "[PlaybackClock] Completed after {:.2}s ({} camera refreshes)",
        state.elapsed, state.camera_refresh_counter
    );
    (
        state,
        TickOutcome::Completed(TickEvents {
            path_updated: true,
            camera_refreshed: true,
            station_changed,
        }),
    )
}
