//! R-tree over station coordinates for radius queries.
//!
//! Railway playback needs to know whether a segment endpoint lies near any
//! station passed so far. The tree is built once per journey over the pass
//! events' station coordinates; each query filters candidates by a caller
//! predicate (typically "event index ≤ current index") and confirms them with
//! a haversine check. Near the poles and across the antimeridian the degree
//! box degenerates, so those queries scan every station instead.

use rstar::{RTree, RTreeObject, AABB};

use crate::geo_utils::{haversine_distance, search_window};
use crate::GpsPoint;

/// A station coordinate tagged with the index it was supplied at
#[derive(Debug, Clone, Copy)]
pub struct IndexedStation {
    pub idx: usize,
    pub lat: f64,
    pub lng: f64,
}

impl RTreeObject for IndexedStation {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lat, self.lng])
    }
}

#[derive(Debug, Default)]
pub struct StationIndex {
    tree: RTree<IndexedStation>,
}

impl StationIndex {
    /// Build the index. Each coordinate keeps its position in `coordinates` as `idx`.
    pub fn new(coordinates: &[GpsPoint]) -> Self {
        let indexed: Vec<IndexedStation> = coordinates
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_valid())
            .map(|(i, p)| IndexedStation {
                idx: i,
                lat: p.latitude,
                lng: p.longitude,
            })
            .collect();
        Self {
            tree: RTree::bulk_load(indexed),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// True if some station accepted by `accept` lies within `radius_meters` of `point`.
    pub fn any_within<F>(&self, point: &GpsPoint, radius_meters: f64, accept: F) -> bool
    where
        F: Fn(usize) -> bool,
    {
        self.candidates(point, radius_meters)
            .any(|s| accept(s.idx) && Self::confirm(s, point, radius_meters))
    }

    fn candidates<'a>(
        &'a self,
        point: &GpsPoint,
        radius_meters: f64,
    ) -> Box<dyn Iterator<Item = &'a IndexedStation> + 'a> {
        let window = search_window(radius_meters, point.latitude).filter(|&(_, lng_deg)| {
            // Boxes crossing the antimeridian would miss stations on the far side
            (point.longitude - lng_deg) >= -180.0 && (point.longitude + lng_deg) <= 180.0
        });

        match window {
            Some((lat_deg, lng_deg)) => {
                let search_bounds = AABB::from_corners(
                    [point.latitude - lat_deg, point.longitude - lng_deg],
                    [point.latitude + lat_deg, point.longitude + lng_deg],
                );
                Box::new(self.tree.locate_in_envelope_intersecting(&search_bounds))
            }
            None => Box::new(self.tree.iter()),
        }
    }

    fn confirm(station: &IndexedStation, point: &GpsPoint, radius_meters: f64) -> bool {
        haversine_distance(&GpsPoint::new(station.lat, station.lng), point) <= radius_meters
    }
}
