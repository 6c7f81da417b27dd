//! Zoom level/factor conversion and cross-View synchronization.
//!
//! Zoom is feed-specific: the Pool holds one canonical level per feed and,
//! on every zoom request, applies it to the active View then propagates it
//! to every other View sharing that `feedId`. A re-entrancy guard plus a
//! short pending-confirm window keep a sync from triggering another sync.

use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const MIN_LEVEL: i32 = -6;
pub const MAX_LEVEL: i32 = 40;
pub const MIN_FACTOR: f32 = 0.25;
pub const MAX_FACTOR: f32 = 5.0;

/// factor = 1.0 + 0.1 * level, clamped to [0.25, 5.0]. Level is clamped
/// first so callers passing out-of-range levels still get a sane factor.
pub fn level_to_factor(level: i32) -> f32 {
    let level = level.clamp(MIN_LEVEL, MAX_LEVEL);
    (1.0 + 0.1 * level as f32).clamp(MIN_FACTOR, MAX_FACTOR)
}

/// Inverse of [`level_to_factor`], rounding to the nearest integer level.
/// Used when a caller supplies a raw zoom factor (e.g. `SetZoomFactor`)
/// instead of a level.
pub fn factor_to_level(factor: f32) -> i32 {
    let factor = factor.clamp(MIN_FACTOR, MAX_FACTOR);
    (((factor - 1.0) / 0.1).round() as i32).clamp(MIN_LEVEL, MAX_LEVEL)
}

/// Per-feed zoom bookkeeping plus the sync/pending-confirm re-entrancy
/// guards described in the design notes.
#[derive(Default)]
pub struct ZoomState {
    levels_by_feed: HashMap<String, i32>,
    syncing: bool,
    pending_confirm_until: Option<Instant>,
}

impl ZoomState {
    pub fn level_for(&self, feed_id: &str) -> i32 {
        *self.levels_by_feed.get(feed_id).unwrap_or(&0)
    }

    /// True while a zoom request should be refused: either a sync is
    /// currently propagating, or we're inside the pending-confirm window
    /// from the previous request.
    pub fn is_locked(&self) -> bool {
        self.syncing || self.pending_confirm_until.is_some_and(|t| Instant::now() < t)
    }

    /// Record a new level for `feed_id` and open the pending-confirm
    /// window. Returns the clamped level actually recorded.
    pub fn begin_request(&mut self, feed_id: &str, level: i32, confirm_window: Duration) -> i32 {
        let level = level.clamp(MIN_LEVEL, MAX_LEVEL);
        self.levels_by_feed.insert(feed_id.to_string(), level);
        self.pending_confirm_until = Some(Instant::now() + confirm_window);
        level
    }

    pub fn begin_sync(&mut self) {
        self.syncing = true;
    }

    pub fn end_sync(&mut self) {
        self.syncing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_zero_is_identity_factor() {
        assert_eq!(level_to_factor(0), 1.0);
    }

    #[test]
    fn factor_clamps_at_extremes() {
        assert_eq!(level_to_factor(1000), MAX_FACTOR);
        assert_eq!(level_to_factor(-1000), MIN_FACTOR);
    }

    #[test]
    fn factor_to_level_round_trips() {
        for level in [-6, -2, 0, 3, 40] {
            assert_eq!(factor_to_level(level_to_factor(level)), level);
        }
    }

    #[test]
    fn pending_confirm_window_locks_briefly() {
        let mut z = ZoomState::default();
        assert!(!z.is_locked());
        z.begin_request("feed-1", 2, Duration::from_millis(50));
        assert!(z.is_locked());
        std::thread::sleep(Duration::from_millis(60));
        assert!(!z.is_locked());
    }

    #[test]
    fn sync_flag_locks_independently_of_confirm_window() {
        let mut z = ZoomState::default();
        z.begin_sync();
        assert!(z.is_locked());
        z.end_sync();
        assert!(!z.is_locked());
    }
}
