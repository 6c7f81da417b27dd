//! Prefetch target selection and the cascaded one-at-a-time prefetch
//! queue.
//!
//! Cascaded mode bounds concurrent prefetch work to exactly one in-flight
//! load at a time: the scheduler hands the Pool one target, waits for
//! `on_prefetch_complete`, then hands over the next. This matches reading
//! cadence better than firing all targets at once.

use std::collections::{HashSet, VecDeque};

/// Inferred reading direction, used to bias which neighbours get
/// prefetched first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
    Unknown,
}

/// Derive the next `Direction` from the previous index/direction and the
/// index just navigated to. `is_first_or_new_list` covers both "no prior
/// navigation" and "the list identity changed" — both force a
/// boundary-based guess rather than comparing to a stale previous index.
pub fn next_direction(
    is_first_or_new_list: bool,
    prev_index: i64,
    index: i64,
    last_index: i64,
) -> Direction {
    if is_first_or_new_list {
        return if index == 0 {
            Direction::Forward
        } else if index == last_index {
            Direction::Backward
        } else {
            Direction::Unknown
        };
    }
    if index == 0 {
        return Direction::Forward;
    }
    if index == last_index {
        return Direction::Backward;
    }
    if index > prev_index {
        Direction::Forward
    } else if index < prev_index {
        Direction::Backward
    } else {
        Direction::Unknown
    }
}

/// Ordered prefetch targets for `index` within a list of length `length`,
/// biased by `direction`. Out-of-range entries are dropped; order encodes
/// priority.
pub fn determine_prefetch_targets(index: i64, length: i64, direction: Direction) -> Vec<i64> {
    let raw: [i64; 4] = match direction {
        Direction::Forward => [index + 1, index + 2, index + 3, index - 1],
        Direction::Backward => [index - 1, index - 2, index - 3, index + 1],
        Direction::Unknown => [index + 1, index - 1, index + 2, index - 2],
    };
    raw.into_iter().filter(|&t| t >= 0 && t < length).collect()
}

/// Published on every scheduler state change.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PrefetchStatus {
    pub direction: Option<Direction>,
    pub next_article_ready: bool,
    pub next_index: Option<i64>,
    pub queue_length: usize,
    pub total_targets: usize,
    pub completed_count: usize,
    pub loading_article_id: Option<String>,
    pub targets: Vec<i64>,
    pub completed_indices: Vec<i64>,
}

impl Default for Direction {
    fn default() -> Self {
        Direction::Unknown
    }
}

/// Cascade state: the ordered target list, what's completed, what's
/// queued, and the protected/pending article-id sets that gate recycling
/// (§4.2/4.5).
#[derive(Default)]
pub struct PrefetchScheduler {
    pub direction: Direction,
    targets: Vec<i64>,
    completed: HashSet<i64>,
    queue: VecDeque<i64>,
    in_progress: Option<i64>,
    /// Article ids that must not be recycled this cycle (the active
    /// article, plus anything with a prefetch currently in flight).
    pub protected: HashSet<String>,
    /// Article ids with a prefetch request outstanding.
    pub pending: HashSet<String>,
    menu_key: Option<String>,
}

impl PrefetchScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_menu_key(&self) -> Option<&str> {
        self.menu_key.as_deref()
    }

    /// Record `targets`; pre-populate `completed` with any the caller
    /// already knows are ready (a View with `has_loaded_once` at that
    /// index); reset protected/pending, protecting `active_article_id`.
    pub fn begin_cycle(
        &mut self,
        menu_key: String,
        targets: Vec<i64>,
        already_ready: &[i64],
        active_article_id: Option<String>,
    ) {
        self.menu_key = Some(menu_key);
        self.targets = targets;
        self.completed = already_ready.iter().copied().collect();
        self.queue = self
            .targets
            .iter()
            .copied()
            .filter(|t| !self.completed.contains(t))
            .collect();
        self.in_progress = None;
        self.protected.clear();
        self.pending.clear();
        if let Some(id) = active_article_id {
            self.protected.insert(id);
        }
    }

    /// Pop the next queued target to request info for, marking it
    /// in-progress. Cascaded mode: callers must not call this again until
    /// `on_prefetch_complete` runs for the current in-progress target.
    pub fn next_target(&mut self) -> Option<i64> {
        if self.in_progress.is_some() {
            return None;
        }
        let next = self.queue.pop_front();
        self.in_progress = next;
        next
    }

    /// A `prefetch-info` response arrived; drop it if it's for a stale
    /// list identity.
    pub fn accepts_response(&self, response_menu_key: &str) -> bool {
        self.menu_key.as_deref() == Some(response_menu_key)
    }

    pub fn on_prefetch_complete(&mut self, article_index: i64) {
        self.completed.insert(article_index);
        self.in_progress = None;
        tracing::debug!(article_index, "prefetch cascade advanced");
    }

    pub fn status(&self, loading_article_id: Option<String>) -> PrefetchStatus {
        let next_index = self.targets.first().copied();
        let next_article_ready = match self.direction {
            Direction::Unknown => self.targets.iter().take(2).all(|t| self.completed.contains(t)),
            _ => next_index.is_some_and(|i| self.completed.contains(&i)),
        };
        PrefetchStatus {
            direction: Some(self.direction),
            next_article_ready,
            next_index,
            queue_length: self.queue.len(),
            total_targets: self.targets.len(),
            completed_count: self.completed.len(),
            loading_article_id,
            targets: self.targets.clone(),
            completed_indices: self.completed.iter().copied().collect(),
        }
    }

    /// Clear the queue, in-progress marker, and protected/pending sets.
    /// Callers are responsible for issuing `stop()` + `recycle()` on every
    /// non-active loading View; this only resets scheduler bookkeeping.
    pub fn cancel(&mut self) {
        self.queue.clear();
        self.in_progress = None;
        self.protected.clear();
        self.pending.clear();
    }

    pub fn reset_for_nuke(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_targets_in_priority_order() {
        let t = determine_prefetch_targets(2, 10, Direction::Forward);
        assert_eq!(t, vec![3, 4, 5, 1]);
    }

    #[test]
    fn backward_targets_in_priority_order() {
        let t = determine_prefetch_targets(5, 10, Direction::Backward);
        assert_eq!(t, vec![4, 3, 2, 6]);
    }

    #[test]
    fn unknown_targets_alternate_neighbours() {
        let t = determine_prefetch_targets(5, 10, Direction::Unknown);
        assert_eq!(t, vec![6, 4, 7, 3]);
    }

    #[test]
    fn out_of_range_targets_are_dropped() {
        let t = determine_prefetch_targets(0, 5, Direction::Forward);
        assert_eq!(t, vec![1, 2, 3]); // index - 1 == -1 is dropped
    }

    #[test]
    fn direction_forced_at_list_boundaries() {
        assert_eq!(next_direction(false, 3, 0, 9), Direction::Forward);
        assert_eq!(next_direction(false, 3, 9, 9), Direction::Backward);
    }

    #[test]
    fn direction_compares_to_previous_index_otherwise() {
        assert_eq!(next_direction(false, 3, 4, 9), Direction::Forward);
        assert_eq!(next_direction(false, 4, 3, 9), Direction::Backward);
        assert_eq!(next_direction(false, 4, 4, 9), Direction::Unknown);
    }

    #[test]
    fn cascade_allows_one_in_flight_at_a_time() {
        let mut s = PrefetchScheduler::new();
        s.direction = Direction::Forward;
        s.begin_cycle("M1".into(), vec![1, 2, 3], &[], Some("a0".into()));
        assert_eq!(s.next_target(), Some(1));
        assert_eq!(s.next_target(), None, "cascade must stay at 1 in-flight");
        s.on_prefetch_complete(1);
        assert_eq!(s.next_target(), Some(2));
    }

    #[test]
    fn stale_menu_key_response_is_rejected() {
        let mut s = PrefetchScheduler::new();
        s.begin_cycle("M1".into(), vec![1], &[], None);
        assert!(s.accepts_response("M1"));
        assert!(!s.accepts_response("M0"));
    }

    #[test]
    fn already_ready_targets_pre_populate_completed() {
        let mut s = PrefetchScheduler::new();
        s.begin_cycle("M1".into(), vec![1, 2], &[2], None);
        assert_eq!(s.next_target(), Some(1));
        assert_eq!(s.status(None).completed_count, 1);
    }

    #[test]
    fn cancel_clears_queue_and_sets() {
        let mut s = PrefetchScheduler::new();
        s.begin_cycle("M1".into(), vec![1, 2, 3], &[], Some("a0".into()));
        s.pending.insert("a1".into());
        s.cancel();
        assert_eq!(s.next_target(), None);
        assert!(s.pending.is_empty());
        assert!(s.protected.is_empty());
    }
}
