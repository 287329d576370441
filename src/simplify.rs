//! # Path Simplification
//!
//! Zoom-aware Douglas-Peucker simplification for rendering a recorded track.
//!
//! The tolerance is chosen from a [`ZoomTierTable`] using the current camera
//! distance. Results are cached per [`ZoomTier`] (the tier's ordinal, never the
//! raw epsilon float), so every camera distance that falls into the same tier
//! shares one cached polyline.
//!
//! ## Cache semantics
//!
//! - Entries are `Arc<[GpsPoint]>` and never change once published.
//! - The cache carries a generation number. Replacing the source trajectory
//!   bumps it and drops every entry, and results computed against an older
//!   generation are discarded instead of published.
//! - Reads of an already cached tier are O(1) and side-effect free.

use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Instant;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{PlaybackError, Result};
use crate::geo_utils::perpendicular_distance;
use crate::GpsPoint;

// ============================================================================
// Zoom Tiers
// ============================================================================

/// Ordinal of a row in a [`ZoomTierTable`]. Used as the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ZoomTier(pub usize);

impl ZoomTier {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One row of the tier table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierEntry {
    /// Upper bound on camera distance in meters. `None` marks the unbounded tier.
    pub max_distance: Option<f64>,
    /// Douglas-Peucker tolerance in decimal degrees
    pub epsilon: f64,
}

/// Ascending camera-distance tiers mapped to simplification tolerances.
///
/// The default table is tuned for moderate latitudes:
///
/// | Camera distance | Epsilon (degrees) |
/// |-----------------|-------------------|
/// | ≤ 500 m         | 0.00001           |
/// | ≤ 2000 m        | 0.00005           |
/// | ≤ 5000 m        | 0.0001            |
/// | ≤ 10000 m       | 0.0002            |
/// | beyond          | 0.0005            |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoomTierTable {
    tiers: Vec<TierEntry>,
}

impl ZoomTierTable {
    /// Build a table from explicit rows.
    ///
    /// Rows must be strictly ascending by `max_distance`, the last row (and only
    /// the last row) must be unbounded, and every epsilon must be finite and
    /// non-negative.
    pub fn new(tiers: Vec<TierEntry>) -> Result<Self> {
        let table = Self { tiers };
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<()> {
        let Some((last, bounded)) = self.tiers.split_last() else {
            return Err(PlaybackError::config("zoom tier table is empty"));
        };
        if last.max_distance.is_some() {
            return Err(PlaybackError::config(
                "last zoom tier must have no distance bound",
            ));
        }

        let mut previous = f64::NEG_INFINITY;
        for entry in bounded {
            let Some(max) = entry.max_distance else {
                return Err(PlaybackError::config(
                    "only the last zoom tier may be unbounded",
                ));
            };
            if !max.is_finite() || max <= previous {
                return Err(PlaybackError::config(format!(
                    "zoom tier bounds must be finite and strictly ascending (got {} after {})",
                    max, previous
                )));
            }
            previous = max;
        }

        if let Some(bad) = self
            .tiers
            .iter()
            .find(|t| !t.epsilon.is_finite() || t.epsilon < 0.0)
        {
            return Err(PlaybackError::config(format!(
                "zoom tier epsilon must be finite and non-negative (got {})",
                bad.epsilon
            )));
        }
        Ok(())
    }

    /// First tier whose bound is at or above `camera_distance`, else the unbounded tier.
    pub fn tier_for_distance(&self, camera_distance: f64) -> ZoomTier {
        let last = self.tiers.len().saturating_sub(1);
        let index = self
            .tiers
            .iter()
            .position(|t| matches!(t.max_distance, Some(max) if max >= camera_distance))
            .unwrap_or(last);
        ZoomTier(index)
    }

    /// Tolerance for a tier. Out-of-range ordinals fall back to the unbounded tier.
    pub fn epsilon(&self, tier: ZoomTier) -> f64 {
        self.tiers
            .get(tier.0)
            .or_else(|| self.tiers.last())
            .map(|t| t.epsilon)
            .unwrap_or(0.0)
    }

    pub fn epsilon_for_distance(&self, camera_distance: f64) -> f64 {
        self.epsilon(self.tier_for_distance(camera_distance))
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn entries(&self) -> &[TierEntry] {
        &self.tiers
    }
}

impl Default for ZoomTierTable {
    fn default() -> Self {
        let tier = |max_distance, epsilon| TierEntry {
            max_distance,
            epsilon,
        };
        Self {
            tiers: vec![
                tier(Some(500.0), 0.00001),
                tier(Some(2000.0), 0.00005),
                tier(Some(5000.0), 0.0001),
                tier(Some(10000.0), 0.0002),
                tier(None, 0.0005),
            ],
        }
    }
}

// ============================================================================
// Douglas-Peucker
// ============================================================================

/// Douglas-Peucker line simplification with a planar perpendicular distance.
///
/// Sequences of two points or fewer are returned unchanged. The first and last
/// input points are always kept, and output never exceeds input length. An
/// interior point survives only when its distance to the current chord is
/// strictly greater than `epsilon`; ties pick the earliest point.
///
/// Runs on an explicit work stack so adversarial input cannot exhaust the
/// call stack.
///
/// # Example
/// ```rust
/// use route_playback::{douglas_peucker, GpsPoint};
///
/// let line: Vec<GpsPoint> = (0..11).map(|i| GpsPoint::new(0.0, i as f64 * 0.001)).collect();
/// let simplified = douglas_peucker(&line, 0.00001);
/// assert_eq!(simplified.len(), 2);
/// ```
pub fn douglas_peucker(points: &[GpsPoint], epsilon: f64) -> Vec<GpsPoint> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let last = points.len() - 1;
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[last] = true;

    let mut stack = vec![(0usize, last)];
    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }

        let mut max_distance = 0.0;
        let mut max_index = start;
        for i in (start + 1)..end {
            let d = perpendicular_distance(&points[i], &points[start], &points[end]);
            if d > max_distance {
                max_distance = d;
                max_index = i;
            }
        }

        if max_index != start && max_distance > epsilon {
            keep[max_index] = true;
            stack.push((max_index, end));
            stack.push((start, max_index));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

// ============================================================================
// Cache
// ============================================================================

#[derive(Debug, Default)]
struct CacheInner {
    generation: u64,
    entries: HashMap<ZoomTier, Arc<[GpsPoint]>>,
}

/// Per-tier store of simplified polylines.
///
/// Single writer per tier, many readers. Entries are published whole behind
/// an `RwLock` and handed out as shared `Arc`s, so a reader never observes a
/// partially built polyline.
#[derive(Debug, Default)]
pub struct SimplificationCache {
    inner: RwLock<CacheInner>,
}

impl SimplificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, CacheInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, CacheInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Get the cached polyline for a tier.
    pub fn get(&self, tier: ZoomTier) -> Option<Arc<[GpsPoint]>> {
        self.read().entries.get(&tier).cloned()
    }

    /// Current generation. Bumped by [`invalidate`](Self::invalidate).
    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    /// Publish a result computed against `generation`.
    ///
    /// Returns the entry now stored for the tier. If another writer got there
    /// first its entry wins; if the cache was invalidated since `generation`
    /// nothing is stored and the caller's value is handed back untouched.
    pub fn publish(
        &self,
        generation: u64,
        tier: ZoomTier,
        points: Arc<[GpsPoint]>,
    ) -> Arc<[GpsPoint]> {
        let mut inner = self.write();
        if inner.generation != generation {
            debug!(
                "[PathSimplifier] Dropping stale result for tier {} (generation {} != {})",
                tier.0, generation, inner.generation
            );
            return points;
        }
        inner.entries.entry(tier).or_insert(points).clone()
    }

    /// Drop every entry and start a new generation.
    pub fn invalidate(&self) {
        let mut inner = self.write();
        inner.generation += 1;
        inner.entries.clear();
    }

    pub fn contains(&self, tier: ZoomTier) -> bool {
        self.read().entries.contains_key(&tier)
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().entries.is_empty()
    }

    /// Tiers with a cached entry, ascending.
    pub fn tiers(&self) -> Vec<ZoomTier> {
        let mut tiers: Vec<ZoomTier> = self.read().entries.keys().copied().collect();
        tiers.sort();
        tiers
    }
}

// ============================================================================
// Path Simplifier
// ============================================================================

/// Handle for a tier being simplified on a worker thread.
///
/// The worker publishes into the shared cache before signalling, so once a
/// result is received the tier is readable through the simplifier as well
/// (unless the trajectory was replaced in the meantime).
pub struct SimplificationHandle {
    tier: ZoomTier,
    receiver: mpsc::Receiver<Arc<[GpsPoint]>>,
}

impl SimplificationHandle {
    pub fn tier(&self) -> ZoomTier {
        self.tier
    }

    /// Check if simplification is complete (non-blocking).
    pub fn try_recv(&self) -> Option<Arc<[GpsPoint]>> {
        self.receiver.try_recv().ok()
    }

    /// Wait for simplification to complete (blocking).
    pub fn recv(self) -> Option<Arc<[GpsPoint]>> {
        self.receiver.recv().ok()
    }
}

/// Simplifies one trajectory at whatever resolution the camera asks for.
#[derive(Debug)]
pub struct PathSimplifier {
    source: Arc<[GpsPoint]>,
    tiers: ZoomTierTable,
    cache: Arc<SimplificationCache>,
}

impl PathSimplifier {
    /// Create a simplifier with the default tier table.
    pub fn new(points: Vec<GpsPoint>) -> Self {
        Self {
            source: points.into(),
            tiers: ZoomTierTable::default(),
            cache: Arc::new(SimplificationCache::new()),
        }
    }

    /// Create a simplifier with a custom tier table.
    pub fn with_tiers(points: Vec<GpsPoint>, tiers: ZoomTierTable) -> Result<Self> {
        tiers.validate()?;
        Ok(Self {
            tiers,
            ..Self::new(points)
        })
    }

    /// Replace the source trajectory. Every cached tier is dropped.
    pub fn set_trajectory(&mut self, points: Vec<GpsPoint>) {
        self.source = points.into();
        self.invalidate();
    }

    /// Drop all cached tiers.
    pub fn invalidate(&self) {
        self.cache.invalidate();
        info!(
            "[PathSimplifier] Cache invalidated ({} source points)",
            self.source.len()
        );
    }

    pub fn source(&self) -> &[GpsPoint] {
        &self.source
    }

    pub fn tiers(&self) -> &ZoomTierTable {
        &self.tiers
    }

    pub fn cache(&self) -> &SimplificationCache {
        &self.cache
    }

    pub fn cached_tiers(&self) -> Vec<ZoomTier> {
        self.cache.tiers()
    }

    pub fn tier_for_distance(&self, camera_distance: f64) -> ZoomTier {
        self.tiers.tier_for_distance(camera_distance)
    }

    pub fn epsilon_for_distance(&self, camera_distance: f64) -> f64 {
        self.tiers.epsilon_for_distance(camera_distance)
    }

    /// Simplified polyline for the tier that `camera_distance` falls into.
    pub fn get_simplified(&self, camera_distance: f64) -> Arc<[GpsPoint]> {
        self.get_simplified_for_tier(self.tier_for_distance(camera_distance))
    }

    /// Simplified polyline for an explicit tier, computing it on a cache miss.
    pub fn get_simplified_for_tier(&self, tier: ZoomTier) -> Arc<[GpsPoint]> {
        if let Some(hit) = self.cache.get(tier) {
            return hit;
        }

        let generation = self.cache.generation();
        let epsilon = self.tiers.epsilon(tier);
        let start = Instant::now();
        let simplified: Arc<[GpsPoint]> = douglas_peucker(&self.source, epsilon).into();
        debug!(
            "[PathSimplifier] Tier {} (epsilon {}) miss: {} -> {} points in {}ms",
            tier.0,
            epsilon,
            self.source.len(),
            simplified.len(),
            start.elapsed().as_millis()
        );
        self.cache.publish(generation, tier, simplified)
    }

    /// Simplify a tier on a worker thread without blocking the caller.
    ///
    /// Returns `None` when the tier is already cached.
    pub fn precompute_background(&self, tier: ZoomTier) -> Option<SimplificationHandle> {
        if self.cache.contains(tier) {
            return None;
        }

        let (tx, rx) = mpsc::channel();
        let source = Arc::clone(&self.source);
        let cache = Arc::clone(&self.cache);
        let generation = cache.generation();
        let epsilon = self.tiers.epsilon(tier);

        thread::spawn(move || {
            let simplified: Arc<[GpsPoint]> = douglas_peucker(&source, epsilon).into();
            let published = cache.publish(generation, tier, simplified);
            tx.send(published).ok();
        });

        Some(SimplificationHandle { tier, receiver: rx })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zigzag(count: usize, amplitude: f64) -> Vec<GpsPoint> {
        (0..count)
            .map(|i| {
                let offset = if i % 2 == 0 { 0.0 } else { amplitude };
                GpsPoint::new(51.5 + offset, -0.12 + i as f64 * 0.001)
            })
            .collect()
    }

    #[test]
    fn test_default_tiers() {
        let table = ZoomTierTable::default();
        assert_eq!(table.epsilon_for_distance(0.0), 0.00001);
        assert_eq!(table.epsilon_for_distance(500.0), 0.00001);
        assert_eq!(table.epsilon_for_distance(500.1), 0.00005);
        assert_eq!(table.epsilon_for_distance(2000.0), 0.00005);
        assert_eq!(table.epsilon_for_distance(4999.0), 0.0001);
        assert_eq!(table.epsilon_for_distance(10000.0), 0.0002);
        assert_eq!(table.epsilon_for_distance(250_000.0), 0.0005);
        assert_eq!(table.tier_for_distance(f64::NAN), ZoomTier(4));
    }

    #[test]
    fn test_tier_table_validation() {
        let entry = |max_distance, epsilon| TierEntry {
            max_distance,
            epsilon,
        };
        assert!(ZoomTierTable::new(vec![]).is_err());
        assert!(ZoomTierTable::new(vec![entry(Some(100.0), 0.1)]).is_err());
        assert!(ZoomTierTable::new(vec![entry(None, 0.1), entry(None, 0.2)]).is_err());
        assert!(
            ZoomTierTable::new(vec![entry(Some(200.0), 0.1), entry(Some(100.0), 0.2), entry(None, 0.3)])
                .is_err()
        );
        assert!(ZoomTierTable::new(vec![entry(None, -1.0)]).is_err());
        let table = ZoomTierTable::new(vec![entry(Some(100.0), 0.1), entry(None, 0.2)]).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.epsilon(ZoomTier(99)), 0.2);
    }

    #[test]
    fn test_short_inputs_unchanged() {
        assert!(douglas_peucker(&[], 0.1).is_empty());
        let one = vec![GpsPoint::new(1.0, 2.0)];
        assert_eq!(douglas_peucker(&one, 0.1), one);
        let two = vec![GpsPoint::new(1.0, 2.0), GpsPoint::new(3.0, 4.0)];
        assert_eq!(douglas_peucker(&two, 0.1), two);
    }

    #[test]
    fn test_keeps_significant_corner() {
        let points = vec![
            GpsPoint::new(0.0, 0.0),
            GpsPoint::new(0.00001, 0.001),
            GpsPoint::new(0.01, 0.002),
            GpsPoint::new(0.00001, 0.003),
            GpsPoint::new(0.0, 0.004),
        ];
        let simplified = douglas_peucker(&points, 0.002);
        assert_eq!(
            simplified,
            vec![points[0], points[2], points[4]],
            "only the peak deviates beyond epsilon"
        );
    }

    #[test]
    fn test_zigzag_survives_small_epsilon() {
        let points = zigzag(20, 0.001);
        assert_eq!(douglas_peucker(&points, 0.0001).len(), 20);
        assert_eq!(douglas_peucker(&points, 0.01).len(), 2);
    }

    #[test]
    fn test_epsilon_equal_to_deviation_collapses() {
        let points = vec![
            GpsPoint::new(0.0, 0.0),
            GpsPoint::new(0.5, 1.0),
            GpsPoint::new(0.0, 2.0),
        ];
        assert_eq!(douglas_peucker(&points, 0.5).len(), 2);
        assert_eq!(douglas_peucker(&points, 0.4999).len(), 3);
    }

    #[test]
    fn test_cache_shared_within_tier() {
        let simplifier = PathSimplifier::new(zigzag(50, 0.001));
        let a = simplifier.get_simplified(100.0);
        let b = simplifier.get_simplified(450.0);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(simplifier.cached_tiers(), vec![ZoomTier(0)]);

        simplifier.get_simplified(20_000.0);
        assert_eq!(simplifier.cached_tiers(), vec![ZoomTier(0), ZoomTier(4)]);
    }

    #[test]
    fn test_set_trajectory_invalidates() {
        let mut simplifier = PathSimplifier::new(zigzag(50, 0.001));
        let before = simplifier.get_simplified(100.0);
        assert_eq!(before.len(), 50);

        simplifier.set_trajectory(zigzag(10, 0.001));
        assert!(simplifier.cache().is_empty());
        assert_eq!(simplifier.get_simplified(100.0).len(), 10);
    }

    #[test]
    fn test_stale_publish_is_dropped() {
        let cache = SimplificationCache::new();
        let generation = cache.generation();
        cache.invalidate();
        let points: Arc<[GpsPoint]> = vec![GpsPoint::new(0.0, 0.0)].into();
        cache.publish(generation, ZoomTier(0), points);
        assert!(!cache.contains(ZoomTier(0)));
    }

    #[test]
    fn test_precompute_background() {
        let simplifier = PathSimplifier::new(zigzag(200, 0.001));
        let handle = simplifier.precompute_background(ZoomTier(2)).unwrap();
        assert_eq!(handle.tier(), ZoomTier(2));
        let result = handle.recv().unwrap();
        assert_eq!(result.len(), 200);
        assert!(simplifier.cache().contains(ZoomTier(2)));
        assert!(simplifier.precompute_background(ZoomTier(2)).is_none());
    }
}
