//! Imperative facade over the pure transitions in [`advance`](super::advance).

use log::{debug, info};

use super::advance::{self, Throttle};
use super::format::{compression_ratio, elapsed_text};
use super::{
    PlaybackConfig, PlaybackMode, PlaybackState, PlaybackStatus, TickEvents, TickHandle,
    TickOutcome,
};
use crate::error::Result;
use crate::playback::journey::Journey;
use crate::{PassEvent, Station};

/// Receives playback notifications. All methods default to no-ops.
pub trait PlaybackListener: Send {
    /// The host should animate its camera to the current position.
    fn on_camera_refresh(&self, _counter: u64) {}

    /// The current pass event changed. `None` when there is none, e.g. after
    /// leaving Railway mode.
    fn on_station_changed(&self, _pass_index: Option<usize>) {}

    /// Playback reached the end.
    fn on_completed(&self) {}
}

/// A journey, its playback state and an optional listener.
///
/// The host owns the frame loop: call [`start`](Self::start) to obtain a
/// [`TickHandle`] and pass it to [`tick`](Self::tick) on every display frame
/// (or to [`update_playback_frame`](Self::update_playback_frame) from a
/// fixed-rate timer). Ticks with a retired handle are ignored.
pub struct PlaybackClock {
    journey: Journey,
    config: PlaybackConfig,
    state: PlaybackState,
    listener: Option<Box<dyn PlaybackListener>>,
}

impl std::fmt::Debug for PlaybackClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackClock")
            .field("journey", &self.journey)
            .field("config", &self.config)
            .field("state", &self.state)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

impl PlaybackClock {
    /// Validate `config` and position the marker at the start of the journey.
    pub fn new(journey: Journey, config: PlaybackConfig) -> Result<Self> {
        config.validate()?;
        let state = advance::refresh(&journey, PlaybackState::new(&config), &Throttle::from(&config));
        info!(
            "[PlaybackClock] Ready: {} points, {} pass events, {:.0}s -> {:.0}s",
            journey.trajectory().len(),
            journey.events().len(),
            journey.journey_duration(),
            config.duration
        );
        Ok(Self {
            journey,
            config,
            state,
            listener: None,
        })
    }

    pub fn set_listener(&mut self, listener: Box<dyn PlaybackListener>) {
        self.listener = Some(listener);
    }

    pub fn clear_listener(&mut self) {
        self.listener = None;
    }

    fn throttle(&self) -> Throttle {
        Throttle::from(&self.config)
    }

    /// Run a by-value transition on the owned state.
    fn apply<R>(&mut self, f: impl FnOnce(&Journey, PlaybackState, &Throttle) -> (PlaybackState, R)) -> R {
        let throttle = self.throttle();
        let state = std::mem::take(&mut self.state);
        let (state, result) = f(&self.journey, state, &throttle);
        self.state = state;
        result
    }

    fn update(&mut self, f: impl FnOnce(&Journey, PlaybackState, &Throttle) -> PlaybackState) {
        self.apply(|journey, state, throttle| (f(journey, state, throttle), ()));
    }

    /// [`update`](Self::update), then tell the listener if the pass index moved.
    fn update_tracking_station(
        &mut self,
        f: impl FnOnce(&Journey, PlaybackState, &Throttle) -> PlaybackState,
    ) {
        let before = self.state.current_station_pass_index;
        self.update(f);
        let after = self.state.current_station_pass_index;
        if after != before {
            if let Some(listener) = self.listener.as_deref() {
                listener.on_station_changed(after);
            }
        }
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Start playback. Returns `None` when the journey has no points.
    pub fn start(&mut self) -> Option<TickHandle> {
        self.apply(advance::start)
    }

    pub fn pause(&mut self) {
        self.update(|_, state, _| advance::pause(state));
    }

    /// Resume after a pause. Returns `None` unless playback was paused.
    pub fn resume(&mut self) -> Option<TickHandle> {
        self.apply(|_, state, _| advance::resume(state))
    }

    /// Play/pause button. Returns a handle when playback (re)starts.
    pub fn toggle(&mut self) -> Option<TickHandle> {
        self.apply(advance::toggle)
    }

    pub fn stop(&mut self) {
        self.update_tracking_station(advance::stop);
        info!("[PlaybackClock] Stopped");
    }

    pub fn seek(&mut self, time: f64) {
        self.update_tracking_station(|journey, state, throttle| {
            advance::seek(journey, state, time, throttle)
        });
    }

    pub fn seek_to_progress(&mut self, progress: f64) {
        self.update_tracking_station(|journey, state, throttle| {
            advance::seek_to_progress(journey, state, progress, throttle)
        });
    }

    // ========================================================================
    // Ticking
    // ========================================================================

    /// Advance by the wall-clock seconds since the previous frame.
    pub fn tick(&mut self, handle: TickHandle, delta: f64) -> TickOutcome {
        let outcome = self.apply(|journey, state, throttle| {
            advance::tick(journey, state, handle, delta, throttle)
        });
        self.dispatch(outcome);
        outcome
    }

    /// Advance by exactly one `update_frequency` step.
    pub fn update_playback_frame(&mut self, handle: TickHandle) -> TickOutcome {
        let outcome = self
            .apply(|journey, state, throttle| advance::tick_fixed(journey, state, handle, throttle));
        self.dispatch(outcome);
        outcome
    }

    fn dispatch(&self, outcome: TickOutcome) {
        let Some(listener) = self.listener.as_deref() else {
            return;
        };
        let Some(TickEvents {
            camera_refreshed,
            station_changed,
            ..
        }) = outcome.events()
        else {
            return;
        };

        if station_changed {
            listener.on_station_changed(self.state.current_station_pass_index);
        }
        if camera_refreshed {
            listener.on_camera_refresh(self.state.camera_refresh_counter);
        }
        if matches!(outcome, TickOutcome::Completed(_)) {
            listener.on_completed();
        }
    }

    // ========================================================================
    // Settings
    // ========================================================================

    pub fn set_mode(&mut self, mode: PlaybackMode) {
        debug!("[PlaybackClock] Mode -> {:?}", mode);
        self.config.mode = mode;
        self.update_tracking_station(|journey, state, throttle| {
            advance::set_mode(journey, state, mode, throttle)
        });
    }

    /// Change the playback length, keeping the current progress fraction.
    pub fn set_duration(&mut self, duration: f64) {
        self.update_tracking_station(|journey, state, throttle| {
            advance::set_duration(journey, state, duration, throttle)
        });
        self.config.duration = self.state.duration;
    }

    pub fn set_update_frequency(&mut self, update_frequency: f64) -> Result<()> {
        let state = advance::set_update_frequency(self.state.clone(), update_frequency)?;
        self.state = state;
        self.config.update_frequency = update_frequency;
        Ok(())
    }

    /// Report the host camera's distance. Returns true when the marker and
    /// path were recomputed for a new zoom tier.
    pub fn set_camera_distance(&mut self, camera_distance: f64) -> bool {
        self.apply(|journey, state, throttle| {
            advance::set_camera_distance(journey, state, camera_distance, throttle)
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn journey(&self) -> &Journey {
        &self.journey
    }

    pub fn status(&self) -> PlaybackStatus {
        self.state.status
    }

    pub fn progress(&self) -> f64 {
        self.state.progress()
    }

    /// Clone of the current state.
    pub fn snapshot(&self) -> PlaybackState {
        self.state.clone()
    }

    pub fn snapshot_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.state)?)
    }

    /// `"mm:ss / mm:ss"` of elapsed over total playback time.
    pub fn elapsed_text(&self) -> String {
        elapsed_text(self.state.elapsed, self.state.duration)
    }

    /// Real seconds of journey per second of playback.
    pub fn compression_ratio(&self) -> f64 {
        compression_ratio(self.journey.journey_duration(), self.state.duration)
    }

    /// The pass event the Railway marker is on, with its station.
    pub fn current_station(&self) -> Option<(&PassEvent, Option<&Station>)> {
        let index = self.state.current_station_pass_index?;
        let event = self.journey.events().get(index)?;
        Some((event, self.journey.station(&event.station_id)))
    }
}
