//! # Station Pass Detection
//!
//! Turns a trajectory and a station catalog into chronologically ordered
//! [`PassEvent`]s.
//!
//! Each station is scanned independently with simple hysteresis:
//!
//! 1. Walk the trajectory, computing the haversine distance to the station.
//! 2. The first point at or under the threshold opens a visit. While inside,
//!    track the closest approach and its timestamp.
//! 3. The first point beyond the threshold closes the visit and emits an
//!    event stamped at the closest approach. A later entry opens a new visit.
//! 4. A visit still open at the end of the trajectory closes on the last index.
//!
//! Samples with invalid coordinates are skipped and neither open nor close a
//! visit. The union of all per-station events is stably sorted by timestamp,
//! so equal timestamps keep catalog order, and `display_order` is assigned
//! from the sorted position.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Instant;

use log::{debug, info};
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{PlaybackError, Result};
use crate::geo_utils::haversine_distance;
use crate::{PassEvent, Station, TrajectoryPoint};

/// Configuration for pass detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct ProximityConfig {
    /// Maximum distance from a station that counts as "at" it.
    /// Default: 200.0 meters
    pub threshold_meters: f64,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            threshold_meters: 200.0,
        }
    }
}

impl ProximityConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.threshold_meters.is_finite() || self.threshold_meters < 0.0 {
            return Err(PlaybackError::config(format!(
                "proximity threshold must be a non-negative distance (got {})",
                self.threshold_meters
            )));
        }
        Ok(())
    }
}

/// Detect all station passes along a trajectory.
///
/// Pure and deterministic: the same inputs always yield the same events.
///
/// # Example
/// ```rust
/// use route_playback::{detect_passes, ProximityConfig, Station, TrajectoryPoint};
///
/// let trajectory: Vec<TrajectoryPoint> = (0..20)
///     .map(|i| TrajectoryPoint::new(i as f64, 48.10 + i as f64 * 0.001, 11.50))
///     .collect();
/// let stations = vec![Station::new("s1", "Middle", 48.11, 11.50)];
///
/// let events = detect_passes(&trajectory, &stations, &ProximityConfig::default());
/// assert_eq!(events.len(), 1);
/// assert_eq!(events[0].station_id, "s1");
/// ```
pub fn detect_passes(
    trajectory: &[TrajectoryPoint],
    stations: &[Station],
    config: &ProximityConfig,
) -> Vec<PassEvent> {
    let start = Instant::now();
    let threshold = config.threshold_meters;

    #[cfg(feature = "parallel")]
    let per_station: Vec<Vec<PassEvent>> = stations
        .par_iter()
        .map(|station| scan_station(trajectory, station, threshold))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let per_station: Vec<Vec<PassEvent>> = stations
        .iter()
        .map(|station| scan_station(trajectory, station, threshold))
        .collect();

    let events = finalize(per_station);
    info!(
        "[PassDetector] {} passes from {} stations over {} points in {}ms",
        events.len(),
        stations.len(),
        trajectory.len(),
        start.elapsed().as_millis()
    );
    events
}

/// Scan one station. Events come back in trajectory order with `display_order` unset.
pub fn scan_station(
    trajectory: &[TrajectoryPoint],
    station: &Station,
    threshold: f64,
) -> Vec<PassEvent> {
    let target = station.coordinate();
    let mut events = Vec::new();

    let mut inside_since: Option<usize> = None;
    let mut closest_distance = f64::INFINITY;
    let mut closest_timestamp = 0.0;

    for (index, point) in trajectory.iter().enumerate() {
        let coordinate = point.coordinate();
        if !coordinate.is_valid() {
            continue;
        }

        let distance = haversine_distance(&coordinate, &target);
        if distance <= threshold {
            if inside_since.is_none() {
                inside_since = Some(index);
                closest_distance = f64::INFINITY;
            }
            if distance < closest_distance {
                closest_distance = distance;
                closest_timestamp = point.timestamp;
            }
        } else if let Some(entry) = inside_since.take() {
            events.push(make_event(
                station,
                entry,
                index,
                closest_timestamp,
                closest_distance,
            ));
        }
    }

    if let Some(entry) = inside_since {
        let last = trajectory.len() - 1;
        events.push(make_event(
            station,
            entry,
            last,
            closest_timestamp,
            closest_distance,
        ));
    }

    debug!(
        "[PassDetector] Station {} ({}): {} passes",
        station.id,
        station.name,
        events.len()
    );
    events
}

fn make_event(
    station: &Station,
    entry: usize,
    exit: usize,
    timestamp: f64,
    distance: f64,
) -> PassEvent {
    PassEvent {
        id: format!("{}:{}", station.id, entry),
        timestamp,
        distance_from_station: distance,
        entry_index: entry as u32,
        exit_index: exit as u32,
        station_id: station.id.clone(),
        display_order: 0,
    }
}

/// Union per-station events, sort chronologically, number them.
fn finalize(per_station: Vec<Vec<PassEvent>>) -> Vec<PassEvent> {
    let mut events: Vec<PassEvent> = per_station.into_iter().flatten().collect();
    events.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    for (order, event) in events.iter_mut().enumerate() {
        event.display_order = order as u32;
    }
    events
}

// ============================================================================
// Background Detection
// ============================================================================

/// Handle for pass detection running on a worker thread.
///
/// Progress is reported per station. Cancelling stops the worker before its
/// next station and discards everything scanned so far.
pub struct PassDetectionHandle {
    receiver: mpsc::Receiver<Result<Vec<PassEvent>>>,
    completed: Arc<AtomicU32>,
    total: u32,
    cancelled: Arc<AtomicBool>,
}

impl PassDetectionHandle {
    /// Stations scanned so far and total station count.
    pub fn progress(&self) -> (u32, u32) {
        (self.completed.load(Ordering::Relaxed), self.total)
    }

    /// Ask the worker to stop at the next station boundary.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Check if detection is complete (non-blocking).
    pub fn try_recv(&self) -> Option<Result<Vec<PassEvent>>> {
        self.receiver.try_recv().ok()
    }

    /// Wait for detection to complete (blocking).
    pub fn recv(self) -> Result<Vec<PassEvent>> {
        self.receiver.recv().unwrap_or(Err(PlaybackError::Cancelled))
    }
}

/// Run [`detect_passes`] on a worker thread.
pub fn detect_passes_background(
    trajectory: Vec<TrajectoryPoint>,
    stations: Vec<Station>,
    config: ProximityConfig,
) -> PassDetectionHandle {
    spawn_detection(trajectory, stations, config, Arc::new(AtomicBool::new(false)))
}

fn spawn_detection(
    trajectory: Vec<TrajectoryPoint>,
    stations: Vec<Station>,
    config: ProximityConfig,
    cancelled: Arc<AtomicBool>,
) -> PassDetectionHandle {
    let (tx, rx) = mpsc::channel();
    let completed = Arc::new(AtomicU32::new(0));
    let total = stations.len() as u32;

    let worker_completed = Arc::clone(&completed);
    let worker_cancelled = Arc::clone(&cancelled);

    thread::spawn(move || {
        let start = Instant::now();
        let result = scan_until_cancelled(
            &trajectory,
            &stations,
            config.threshold_meters,
            &worker_completed,
            || worker_cancelled.load(Ordering::Relaxed),
        );

        match &result {
            Ok(events) => info!(
                "[PassDetector] Background scan found {} passes in {}ms",
                events.len(),
                start.elapsed().as_millis()
            ),
            Err(_) => info!(
                "[PassDetector] Cancelled after {}/{} stations",
                worker_completed.load(Ordering::Relaxed),
                stations.len()
            ),
        }
        tx.send(result).ok();
    });

    PassDetectionHandle {
        receiver: rx,
        completed,
        total,
        cancelled,
    }
}

/// Scan stations in catalog order, checking `is_cancelled` before each one.
/// `completed` counts finished stations. A cancelled scan yields no events.
fn scan_until_cancelled<F>(
    trajectory: &[TrajectoryPoint],
    stations: &[Station],
    threshold: f64,
    completed: &AtomicU32,
    is_cancelled: F,
) -> Result<Vec<PassEvent>>
where
    F: Fn() -> bool,
{
    let mut per_station = Vec::with_capacity(stations.len());
    for station in stations {
        if is_cancelled() {
            return Err(PlaybackError::Cancelled);
        }
        per_station.push(scan_station(trajectory, station, threshold));
        completed.fetch_add(1, Ordering::Relaxed);
    }
    Ok(finalize(per_station))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Northbound track at ~111m per sample, one sample per 10s.
    fn northbound(count: usize) -> Vec<TrajectoryPoint> {
        (0..count)
            .map(|i| TrajectoryPoint::new(i as f64 * 10.0, 48.100 + i as f64 * 0.001, 11.500))
            .collect()
    }

    #[test]
    fn test_single_pass_closest_approach() {
        let trajectory = northbound(30);
        let stations = vec![Station::new("a", "Alpha", 48.110, 11.500)];
        let events = detect_passes(&trajectory, &stations, &ProximityConfig::default());

        assert_eq!(events.len(), 1);
        let event = &events[0];
        // Points 9, 10, 11 are within 200m (~111m, 0m, ~111m)
        assert_eq!(event.entry_index, 9);
        assert_eq!(event.exit_index, 12);
        assert_eq!(event.timestamp, 100.0);
        assert!(event.distance_from_station < 1.0);
        assert_eq!(event.id, "a:9");
    }

    #[test]
    fn test_unvisited_station_yields_nothing() {
        let trajectory = northbound(30);
        let stations = vec![Station::new("far", "Far Away", 52.52, 13.40)];
        assert!(detect_passes(&trajectory, &stations, &ProximityConfig::default()).is_empty());
    }

    #[test]
    fn test_pass_open_at_end_closes_on_last_index() {
        let trajectory = northbound(12);
        let stations = vec![Station::new("end", "Terminus", 48.111, 11.500)];
        let events = detect_passes(&trajectory, &stations, &ProximityConfig::default());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].entry_index, 10);
        assert_eq!(events[0].exit_index, 11);
    }

    #[test]
    fn test_events_sorted_and_numbered() {
        let trajectory = northbound(40);
        let stations = vec![
            Station::new("late", "Late", 48.130, 11.500),
            Station::new("early", "Early", 48.105, 11.500),
        ];
        let events = detect_passes(&trajectory, &stations, &ProximityConfig::default());
        let ids: Vec<&str> = events.iter().map(|e| e.station_id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
        assert_eq!(events[0].display_order, 0);
        assert_eq!(events[1].display_order, 1);
    }

    #[test]
    fn test_invalid_samples_are_skipped() {
        let mut trajectory = northbound(30);
        trajectory[10].latitude = f64::NAN;
        let stations = vec![Station::new("a", "Alpha", 48.110, 11.500)];
        let events = detect_passes(&trajectory, &stations, &ProximityConfig::default());
        assert_eq!(events.len(), 1, "a NaN sample must not split the visit");
        assert_eq!(events[0].entry_index, 9);
    }

    #[test]
    fn test_empty_inputs() {
        let stations = vec![Station::new("a", "Alpha", 48.110, 11.500)];
        assert!(detect_passes(&[], &stations, &ProximityConfig::default()).is_empty());
        assert!(detect_passes(&northbound(5), &[], &ProximityConfig::default()).is_empty());
    }

    #[test]
    fn test_config_validation() {
        assert!(ProximityConfig::default().validate().is_ok());
        assert!(ProximityConfig {
            threshold_meters: -1.0
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_background_matches_sync() {
        let trajectory = northbound(40);
        let stations = vec![
            Station::new("a", "Alpha", 48.110, 11.500),
            Station::new("b", "Beta", 48.130, 11.500),
        ];
        let expected = detect_passes(&trajectory, &stations, &ProximityConfig::default());

        let handle =
            detect_passes_background(trajectory, stations, ProximityConfig::default());
        assert_eq!(handle.progress().1, 2);
        let events = handle.recv().unwrap();
        assert_eq!(events, expected);
    }

    fn catalog(count: usize) -> Vec<Station> {
        (0..count)
            .map(|i| Station::new(&format!("s{}", i), "S", 48.1 + i as f64 * 0.01, 11.5))
            .collect()
    }

    #[test]
    fn test_cancel_before_first_station() {
        let completed = AtomicU32::new(0);
        let result = scan_until_cancelled(&northbound(50), &catalog(5), 200.0, &completed, || true);
        assert!(matches!(result, Err(PlaybackError::Cancelled)));
        assert_eq!(completed.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_cancel_after_some_stations_discards_partial_output() {
        let completed = AtomicU32::new(0);
        let result = scan_until_cancelled(&northbound(50), &catalog(5), 200.0, &completed, || {
            completed.load(Ordering::Relaxed) >= 2
        });
        assert!(matches!(result, Err(PlaybackError::Cancelled)));
        assert_eq!(completed.load(Ordering::Relaxed), 2);

        // Same scan without cancellation does find passes
        let completed = AtomicU32::new(0);
        let events =
            scan_until_cancelled(&northbound(50), &catalog(5), 200.0, &completed, || false)
                .unwrap();
        assert!(!events.is_empty());
        assert_eq!(completed.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn test_background_cancelled_handle() {
        let handle = spawn_detection(
            northbound(50),
            catalog(5),
            ProximityConfig::default(),
            Arc::new(AtomicBool::new(true)),
        );
        let result = loop {
            if let Some(result) = handle.try_recv() {
                break result;
            }
            thread::yield_now();
        };
        assert!(matches!(result, Err(PlaybackError::Cancelled)));
        let (done, total) = handle.progress();
        assert_eq!(total, 5);
        assert!(done < total);
    }
}
