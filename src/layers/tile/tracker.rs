//! Tile load lifecycle: outstanding -> completed, with time based eviction
//!
//! The tracker is shared between the frame builder and whatever delivers
//! load results (the layer's event pump, the housekeeping timer), so it lives
//! behind a single mutex: [`SharedTracker`].

use std::sync::{Arc, Mutex};
use std::time::Duration;

use instant::Instant;

use crate::core::{clock::Clock, constants::DEFAULT_EVICTION_THRESHOLD, geo::TileCoord};
use crate::prelude::HashMap;

/// Read-only view of load state used when choosing backup tiles
pub trait LoadState {
    fn is_outstanding(&self, coords: &TileCoord) -> bool;
    fn is_completed(&self, coords: &TileCoord) -> bool;
}

/// Result of one housekeeping pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub outstanding_evicted: usize,
    pub completed_evicted: usize,
}

impl SweepStats {
    pub fn total(&self) -> usize {
        self.outstanding_evicted + self.completed_evicted
    }
}

pub type SharedTracker = Arc<Mutex<TileLoadTracker>>;

pub struct TileLoadTracker {
    outstanding: HashMap<TileCoord, Instant>,
    completed: HashMap<TileCoord, Instant>,
    clock: Arc<dyn Clock>,
    eviction_threshold: Duration,
    /// Bumped on every mutation so callers can tell whether state moved
    revision: u64,
}

impl TileLoadTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_threshold(clock, DEFAULT_EVICTION_THRESHOLD)
    }

    pub fn with_threshold(clock: Arc<dyn Clock>, eviction_threshold: Duration) -> Self {
        Self {
            outstanding: HashMap::default(),
            completed: HashMap::default(),
            clock,
            eviction_threshold,
            revision: 0,
        }
    }

    pub fn into_shared(self) -> SharedTracker {
        Arc::new(Mutex::new(self))
    }

    /// Registers interest in `coords`.
    ///
    /// Tiles already completed need no placeholder and are not marked. A tile
    /// that is already outstanding keeps its original start time. Returns
    /// whether a new outstanding entry was created.
    pub fn begin_load(&mut self, coords: TileCoord) -> bool {
        if self.completed.contains_key(&coords) || self.outstanding.contains_key(&coords) {
            return false;
        }
        self.outstanding.insert(coords, self.clock.now());
        self.revision += 1;
        true
    }

    /// Records a successful load. Valid for tiles never marked outstanding.
    pub fn complete_load(&mut self, coords: TileCoord) {
        self.completed.insert(coords, self.clock.now());
        self.outstanding.remove(&coords);
        self.revision += 1;
    }

    /// Reports a failed load. The outstanding entry is kept until it ages out,
    /// which is what eventually allows a fresh attempt.
    pub fn fail_load(&mut self, coords: TileCoord, reason: &str) {
        log::warn!("tile {} failed to load: {}", coords, reason);
        self.revision += 1;
    }

    /// Evicts every entry older than the eviction threshold
    pub fn housekeep(&mut self) -> SweepStats {
        let now = self.clock.now();
        self.housekeep_at(now)
    }

    pub fn housekeep_at(&mut self, now: Instant) -> SweepStats {
        let threshold = self.eviction_threshold;
        let fresh = |started: &mut Instant| now.saturating_duration_since(*started) <= threshold;

        let outstanding_before = self.outstanding.len();
        let completed_before = self.completed.len();
        self.outstanding.retain(|_, started| fresh(started));
        self.completed.retain(|_, finished| fresh(finished));

        let stats = SweepStats {
            outstanding_evicted: outstanding_before - self.outstanding.len(),
            completed_evicted: completed_before - self.completed.len(),
        };
        if stats.total() > 0 {
            self.revision += 1;
            log::info!(
                "tile housekeeping evicted {} outstanding and {} completed entries",
                stats.outstanding_evicted,
                stats.completed_evicted
            );
        } else {
            log::debug!("tile housekeeping found nothing to evict");
        }
        stats
    }

    pub fn outstanding_since(&self, coords: &TileCoord) -> Option<Instant> {
        self.outstanding.get(coords).copied()
    }

    pub fn completed_at(&self, coords: &TileCoord) -> Option<Instant> {
        self.completed.get(coords).copied()
    }

    pub fn outstanding_count(&self) -> usize {
        self.outstanding.len()
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn eviction_threshold(&self) -> Duration {
        self.eviction_threshold
    }

    /// Forgets everything; used on teardown
    pub fn clear(&mut self) {
        self.outstanding.clear();
        self.completed.clear();
        self.revision += 1;
    }
}

impl LoadState for TileLoadTracker {
    fn is_outstanding(&self, coords: &TileCoord) -> bool {
        self.outstanding.contains_key(coords)
    }

    fn is_completed(&self, coords: &TileCoord) -> bool {
        self.completed.contains_key(coords)
    }
}

impl std::fmt::Debug for TileLoadTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileLoadTracker")
            .field("outstanding", &self.outstanding.len())
            .field("completed", &self.completed.len())
            .field("eviction_threshold", &self.eviction_threshold)
            .field("revision", &self.revision)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;

    fn tracker() -> (TileLoadTracker, ManualClock) {
        let clock = ManualClock::new();
        (TileLoadTracker::new(Arc::new(clock.clone())), clock)
    }

    #[test]
    fn test_begin_then_complete() {
        let (mut tracker, _) = tracker();
        let coords = TileCoord::new(3, 4, 5);

        assert!(tracker.begin_load(coords));
        assert!(tracker.is_outstanding(&coords));
        assert!(!tracker.is_completed(&coords));

        tracker.complete_load(coords);
        assert!(!tracker.is_outstanding(&coords));
        assert!(tracker.is_completed(&coords));
    }

    #[test]
    fn test_completed_tiles_are_not_marked_outstanding() {
        let (mut tracker, _) = tracker();
        let coords = TileCoord::new(3, 4, 5);
        tracker.complete_load(coords);

        assert!(!tracker.begin_load(coords));
        assert!(!tracker.is_outstanding(&coords));
    }

    #[test]
    fn test_completion_without_begin_is_recorded() {
        let (mut tracker, _) = tracker();
        let coords = TileCoord::new(0, 0, 0);
        tracker.complete_load(coords);
        tracker.complete_load(coords);
        assert!(tracker.is_completed(&coords));
        assert_eq!(tracker.completed_count(), 1);
    }

    #[test]
    fn test_failure_keeps_outstanding_entry() {
        let (mut tracker, clock) = tracker();
        let coords = TileCoord::new(1, 1, 5);
        tracker.begin_load(coords);
        let started = tracker.outstanding_since(&coords);

        clock.advance(Duration::from_secs(5));
        tracker.fail_load(coords, "HTTP 500");
        assert!(!tracker.begin_load(coords));

        assert!(tracker.is_outstanding(&coords));
        assert!(!tracker.is_completed(&coords));
        assert_eq!(tracker.outstanding_since(&coords), started);
    }

    #[test]
    fn test_outstanding_evicted_after_threshold() {
        let (mut tracker, clock) = tracker();
        let coords: TileCoord = "1:1:5".parse().unwrap();
        tracker.begin_load(coords);

        clock.advance(Duration::from_secs(1441 * 60));
        let stats = tracker.housekeep();

        assert!(!tracker.is_outstanding(&coords));
        assert_eq!(stats.outstanding_evicted, 1);
        assert!(tracker.begin_load(coords));
    }

    #[test]
    fn test_completed_evicted_after_threshold() {
        let (mut tracker, clock) = tracker();
        let old = TileCoord::new(1, 1, 5);
        let recent = TileCoord::new(2, 1, 5);
        tracker.complete_load(old);

        clock.advance(Duration::from_secs(1000 * 60));
        tracker.complete_load(recent);
        clock.advance(Duration::from_secs(441 * 60));

        let stats = tracker.housekeep();
        assert_eq!(stats, SweepStats { outstanding_evicted: 0, completed_evicted: 1 });
        assert!(!tracker.is_completed(&old));
        assert!(tracker.is_completed(&recent));
    }

    #[test]
    fn test_entries_within_threshold_survive() {
        let (mut tracker, clock) = tracker();
        let coords = TileCoord::new(1, 1, 5);
        tracker.begin_load(coords);

        clock.advance(Duration::from_secs(1440 * 60));
        assert_eq!(tracker.housekeep().total(), 0);
        assert!(tracker.is_outstanding(&coords));
    }

    #[test]
    fn test_revision_tracks_mutations() {
        let (mut tracker, _) = tracker();
        let start = tracker.revision();
        tracker.begin_load(TileCoord::new(0, 0, 1));
        tracker.begin_load(TileCoord::new(0, 0, 1));
        assert_eq!(tracker.revision(), start + 1);
    }
}
