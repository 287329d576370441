//! Immutable inputs to playback.

use std::collections::HashMap;
use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::detection::{detect_passes, ProximityConfig};
use crate::error::Result;
use crate::geo_utils::polyline_length;
use crate::simplify::{PathSimplifier, ZoomTierTable};
use crate::station_index::StationIndex;
use crate::{Bounds, GpsPoint, PassEvent, RailwaySegment, Station, TrajectoryPoint};

/// Overview figures for a journey, for the host's info panel and initial camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct JourneySummary {
    pub point_count: u32,
    /// Seconds between first and last sample
    pub journey_duration: f64,
    /// Meters along the raw trajectory
    pub total_distance: f64,
    pub pass_count: u32,
    pub bounds: Option<Bounds>,
    pub center: Option<GpsPoint>,
}

/// A recorded trajectory plus everything derived from or attached to it.
///
/// Pass events are kept sorted by timestamp. Events refer to stations by id;
/// an event whose station is missing from the catalog has no coordinate and
/// is skipped when snapping or building railway paths.
#[derive(Debug)]
pub struct Journey {
    trajectory: Vec<TrajectoryPoint>,
    simplifier: PathSimplifier,
    stations: HashMap<String, Station>,
    events: Vec<PassEvent>,
    event_coordinates: Vec<Option<GpsPoint>>,
    event_index: StationIndex,
    segments: Vec<RailwaySegment>,
}

impl Journey {
    /// Create a journey over a time-ordered trajectory with the default zoom tiers.
    pub fn new(trajectory: Vec<TrajectoryPoint>) -> Self {
        let coordinates = trajectory.iter().map(|p| p.coordinate()).collect();
        Self {
            trajectory,
            simplifier: PathSimplifier::new(coordinates),
            stations: HashMap::new(),
            events: Vec::new(),
            event_coordinates: Vec::new(),
            event_index: StationIndex::default(),
            segments: Vec::new(),
        }
    }

    /// Create a journey with a custom zoom tier table.
    pub fn with_tiers(trajectory: Vec<TrajectoryPoint>, tiers: ZoomTierTable) -> Result<Self> {
        let coordinates = trajectory.iter().map(|p| p.coordinate()).collect();
        let simplifier = PathSimplifier::with_tiers(coordinates, tiers)?;
        Ok(Self {
            simplifier,
            ..Self::new(trajectory)
        })
    }

    /// Attach a station catalog and the pass events detected against it.
    pub fn with_passes(mut self, stations: Vec<Station>, events: Vec<PassEvent>) -> Self {
        self.set_passes(stations, events);
        self
    }

    /// Attach railway geometry for Railway mode.
    pub fn with_railway_segments(mut self, segments: Vec<RailwaySegment>) -> Self {
        self.segments = segments;
        self
    }

    /// Run pass detection against `stations` and attach the result.
    pub fn detect_passes(&mut self, stations: Vec<Station>, config: &ProximityConfig) {
        let events = detect_passes(&self.trajectory, &stations, config);
        self.set_passes(stations, events);
    }

    /// Replace the station catalog and pass events.
    pub fn set_passes(&mut self, stations: Vec<Station>, mut events: Vec<PassEvent>) {
        events.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

        self.stations = stations.into_iter().map(|s| (s.id.clone(), s)).collect();
        self.event_coordinates = events
            .iter()
            .map(|e| self.stations.get(&e.station_id).map(Station::coordinate))
            .collect();

        let missing = self.event_coordinates.iter().filter(|c| c.is_none()).count();
        if missing > 0 {
            warn!(
                "[Journey] {} of {} pass events reference stations missing from the catalog",
                missing,
                events.len()
            );
        }

        // Unknown stations are indexed at NaN, which the index skips
        let indexed: Vec<GpsPoint> = self
            .event_coordinates
            .iter()
            .map(|c| c.unwrap_or(GpsPoint::new(f64::NAN, f64::NAN)))
            .collect();
        self.event_index = StationIndex::new(&indexed);
        self.events = events;
    }

    pub fn set_railway_segments(&mut self, segments: Vec<RailwaySegment>) {
        self.segments = segments;
    }

    /// Replace the trajectory. Cached simplifications and pass events are dropped,
    /// since event indices refer to the old samples.
    pub fn set_trajectory(&mut self, trajectory: Vec<TrajectoryPoint>) {
        self.simplifier
            .set_trajectory(trajectory.iter().map(|p| p.coordinate()).collect());
        self.trajectory = trajectory;
        let stations = std::mem::take(&mut self.stations).into_values().collect();
        self.set_passes(stations, Vec::new());
        info!(
            "[Journey] Trajectory replaced ({} points)",
            self.trajectory.len()
        );
    }

    pub fn trajectory(&self) -> &[TrajectoryPoint] {
        &self.trajectory
    }

    pub fn simplifier(&self) -> &PathSimplifier {
        &self.simplifier
    }

    /// Simplified polyline at the resolution for `camera_distance`.
    pub fn simplified(&self, camera_distance: f64) -> Arc<[GpsPoint]> {
        self.simplifier.get_simplified(camera_distance)
    }

    pub fn events(&self) -> &[PassEvent] {
        &self.events
    }

    pub fn station(&self, id: &str) -> Option<&Station> {
        self.stations.get(id)
    }

    pub fn stations(&self) -> impl Iterator<Item = &Station> {
        self.stations.values()
    }

    /// Coordinate of the station behind the event at `index`.
    pub fn event_coordinate(&self, index: usize) -> Option<GpsPoint> {
        self.event_coordinates.get(index).copied().flatten()
    }

    pub(crate) fn event_index(&self) -> &StationIndex {
        &self.event_index
    }

    pub fn railway_segments(&self) -> &[RailwaySegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.trajectory.is_empty()
    }

    pub fn first_point(&self) -> Option<&TrajectoryPoint> {
        self.trajectory.first()
    }

    /// Real time span of the raw trajectory, never negative.
    pub fn journey_duration(&self) -> f64 {
        match (self.trajectory.first(), self.trajectory.last()) {
            (Some(first), Some(last)) => (last.timestamp - first.timestamp).max(0.0),
            _ => 0.0,
        }
    }

    /// True when there is no time span to map playback onto.
    pub fn is_degenerate(&self) -> bool {
        self.trajectory.len() < 2 || self.journey_duration() <= 0.0
    }

    /// Recording time corresponding to a playback progress fraction.
    pub fn target_timestamp(&self, progress: f64) -> f64 {
        let start = self.first_point().map(|p| p.timestamp).unwrap_or(0.0);
        start + progress * self.journey_duration()
    }

    pub fn summary(&self) -> JourneySummary {
        let coordinates = self.simplifier.source();
        let bounds = Bounds::from_points(coordinates);
        JourneySummary {
            point_count: self.trajectory.len() as u32,
            journey_duration: self.journey_duration(),
            total_distance: polyline_length(coordinates),
            pass_count: self.events.len() as u32,
            bounds,
            center: bounds.map(|b| b.center()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trajectory() -> Vec<TrajectoryPoint> {
        (0..10)
            .map(|i| TrajectoryPoint::new(1000.0 + i as f64 * 10.0, 48.1 + i as f64 * 0.001, 11.5))
            .collect()
    }

    fn event(station_id: &str, timestamp: f64) -> PassEvent {
        PassEvent {
            id: format!("{}:0", station_id),
            timestamp,
            distance_from_station: 0.0,
            entry_index: 0,
            exit_index: 0,
            station_id: station_id.to_string(),
            display_order: 0,
        }
    }

    #[test]
    fn test_journey_duration_and_target() {
        let journey = Journey::new(trajectory());
        assert_eq!(journey.journey_duration(), 90.0);
        assert!(!journey.is_degenerate());
        assert_eq!(journey.target_timestamp(0.5), 1045.0);
    }

    #[test]
    fn test_degenerate_journeys() {
        assert!(Journey::new(Vec::new()).is_degenerate());
        assert!(Journey::new(vec![TrajectoryPoint::new(5.0, 1.0, 1.0)]).is_degenerate());
        let same_time = vec![
            TrajectoryPoint::new(5.0, 1.0, 1.0),
            TrajectoryPoint::new(5.0, 1.1, 1.0),
        ];
        assert!(Journey::new(same_time).is_degenerate());
    }

    #[test]
    fn test_set_passes_sorts_and_resolves() {
        let stations = vec![
            Station::new("a", "Alpha", 48.10, 11.5),
            Station::new("b", "Beta", 48.11, 11.5),
        ];
        let journey = Journey::new(trajectory()).with_passes(
            stations,
            vec![event("b", 1080.0), event("a", 1000.0), event("ghost", 1050.0)],
        );
        let ids: Vec<&str> = journey.events().iter().map(|e| e.station_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "ghost", "b"]);
        assert_eq!(journey.event_coordinate(0), Some(GpsPoint::new(48.10, 11.5)));
        assert_eq!(journey.event_coordinate(1), None);
        assert_eq!(journey.event_index().len(), 2);
    }

    #[test]
    fn test_detect_passes_attaches_events() {
        let mut journey = Journey::new(trajectory());
        journey.detect_passes(
            vec![Station::new("mid", "Middle", 48.105, 11.5)],
            &ProximityConfig::default(),
        );
        assert_eq!(journey.events().len(), 1);
        assert!(journey.station("mid").is_some());
    }

    #[test]
    fn test_set_trajectory_drops_events() {
        let mut journey = Journey::new(trajectory())
            .with_passes(vec![Station::new("a", "Alpha", 48.1, 11.5)], vec![event("a", 1000.0)]);
        journey.simplified(100.0);
        journey.set_trajectory(trajectory());
        assert!(journey.events().is_empty());
        assert!(journey.simplifier().cache().is_empty());
        assert!(journey.station("a").is_some());
    }

    #[test]
    fn test_summary() {
        let summary = Journey::new(trajectory()).summary();
        assert_eq!(summary.point_count, 10);
        assert_eq!(summary.journey_duration, 90.0);
        assert!((summary.total_distance - 1000.8).abs() < 5.0);
        let center = summary.center.unwrap();
        assert!((center.latitude - 48.1045).abs() < 1e-9);
    }
}
