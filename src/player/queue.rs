// ==========================================
// QUEUE MANAGEMENT MODULE
// ==========================================
// This module decides what plays next. It owns:
// - The catalog (replaced wholesale on every load)
// - The active search filter
// - The current track index
// - Shuffle mode and the pending shuffle order
// - The Idle / Playing / Paused state, driven by sink events
//
// Everything is addressed by catalog index. The caller passes in the
// visible order (filter + column sort as shown on screen) whenever a
// decision depends on it; the manager never caches that order. Pending
// shuffle entries that a later filter hid are discarded when popped.
//
// Key Concept: VecDeque
// - The pending shuffle order is consumed from the front
// - An empty pending order is a normal state, not an error

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::catalog::{Catalog, RawTrackRecord, Track};

// ==========================================
// PLAYBACK STATE
// ==========================================
// The manager's view of the sink. It only changes through handle_event().
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing(usize),
    Paused(usize),
}

// ==========================================
// PLAYBACK EVENTS
// ==========================================
// What a sink reports back. Ended is the only one that produces a new
// index to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    Started,
    Paused,
    Stopped,
    Ended,
}

// ==========================================
// QUEUE MANAGER
// ==========================================
// Fields explained:
//
// current: Option<usize>
//   - Catalog index of the loaded track, None when Idle
//
// pending: VecDeque<usize>
//   - Shuffle order still to be played, front plays first
//   - Rebuilt from scratch whenever shuffle is switched on or runs dry
//
// generation / ended_generation
//   - generation goes up on every set_current()
//   - ended_generation remembers which generation already advanced on
//     Ended, so a duplicated end-of-media report is ignored
pub struct QueueManager {
    catalog: Catalog,
    filter: String,
    current: Option<usize>,
    shuffle: bool,
    pending: VecDeque<usize>,
    state: PlaybackState,
    generation: u64,
    ended_generation: Option<u64>,
    rng: StdRng,
}

impl Default for QueueManager {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueManager {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic shuffles, for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        QueueManager {
            catalog: Catalog::default(),
            filter: String::new(),
            current: None,
            shuffle: false,
            pending: VecDeque::new(),
            state: PlaybackState::Idle,
            generation: 0,
            ended_generation: None,
            rng,
        }
    }

    // ==========================================
    // LOADING: load()
    // ==========================================
    // Replaces the catalog. Playback goes back to Idle with no current
    // track and an empty pending order; shuffle mode and the filter text
    // survive the reload.
    //
    // Returns how many records were dropped for lacking a reference.
    pub fn load<I>(&mut self, records: I) -> usize
    where
        I: IntoIterator<Item = RawTrackRecord>,
    {
        let (catalog, skipped) = Catalog::load(records);
        debug!(tracks = catalog.len(), skipped, "catalog loaded");

        self.catalog = catalog;
        self.current = None;
        self.pending.clear();
        self.state = PlaybackState::Idle;
        self.generation += 1;
        self.ended_generation = None;
        skipped
    }

    // ==========================================
    // FILTERING: set_filter()
    // ==========================================
    // Stores the trimmed filter and returns the visible set in catalog
    // order. Does not touch the queue.
    pub fn set_filter(&mut self, text: &str) -> Vec<usize> {
        self.filter = text.trim().to_string();
        self.visible()
    }

    pub fn visible(&self) -> Vec<usize> {
        self.catalog.filter(&self.filter)
    }

    // ==========================================
    // SHUFFLE: set_shuffle()
    // ==========================================
    // Enabling builds a fresh random permutation of visible_order.
    // exclude_current is left out only when it is in the pool and the
    // pool has more than one track, so the queue is never emptied by
    // the exclusion. Disabling drops the pending order.
    pub fn set_shuffle(
        &mut self,
        enabled: bool,
        visible_order: &[usize],
        exclude_current: Option<usize>,
    ) {
        self.shuffle = enabled;
        if enabled {
            self.refill(visible_order, exclude_current);
        } else {
            self.pending.clear();
        }
    }

    fn refill(&mut self, visible_order: &[usize], exclude: Option<usize>) {
        let mut pool: Vec<usize> = visible_order.to_vec();
        if let Some(excluded) = exclude {
            if pool.len() > 1 {
                pool.retain(|&i| i != excluded);
            }
        }
        pool.shuffle(&mut self.rng);
        debug!(len = pool.len(), "shuffle order rebuilt");
        self.pending = pool.into();
    }

    // ==========================================
    // SHUFFLE: next_from_queue()
    // ==========================================
    // Pops the front of the pending order. Refilling is the caller's job
    // (advance() does it) because it needs the current visible order.
    pub fn next_from_queue(&mut self) -> Option<usize> {
        self.pending.pop_front()
    }

    // ==========================================
    // NAVIGATION: advance()
    // ==========================================
    // The one place that answers "what plays after the current track",
    // for both the Next key and end-of-track.
    //
    // Shuffle on:
    //   pop pending, discarding entries that are no longer visible and the
    //   current track (unless it is the only visible one); once pending
    //   runs dry, rebuild it from visible_order and pop.
    // Shuffle off:
    //   the track after current in visible_order, wrapping around;
    //   visible_order[0] if current is None or not visible.
    //
    // Returns None when visible_order is empty.
    pub fn advance(&mut self, visible_order: &[usize]) -> Option<usize> {
        self.advance_from(visible_order, self.current)
    }

    /// Same policy as `advance`, measured from `anchor` instead of the
    /// current track. Used to step past a track that could not be played
    /// without making it current.
    pub fn advance_from(
        &mut self,
        visible_order: &[usize],
        anchor: Option<usize>,
    ) -> Option<usize> {
        if visible_order.is_empty() {
            return None;
        }

        if self.shuffle {
            let skip_anchor = visible_order.len() > 1;
            while let Some(next) = self.next_from_queue() {
                if !visible_order.contains(&next) {
                    debug!(index = next, "dropping hidden track from shuffle order");
                    continue;
                }
                if skip_anchor && Some(next) == anchor {
                    continue;
                }
                return Some(next);
            }
            self.refill(visible_order, anchor);
            return self.next_from_queue();
        }

        let next = anchor
            .and_then(|anchor| visible_order.iter().position(|&i| i == anchor))
            .map(|position| visible_order[(position + 1) % visible_order.len()])
            .unwrap_or(visible_order[0]);
        Some(next)
    }

    // ==========================================
    // NAVIGATION: start()
    // ==========================================
    // What Play does when nothing is loaded: a fresh shuffle with no
    // exclusion, or the first visible row.
    pub fn start(&mut self, visible_order: &[usize]) -> Option<usize> {
        let first = *visible_order.first()?;
        if self.shuffle {
            self.refill(visible_order, None);
            return Some(self.next_from_queue().unwrap_or(first));
        }
        Some(first)
    }

    // ==========================================
    // SELECTION: set_current()
    // ==========================================
    // Out-of-range indices are ignored.
    pub fn set_current(&mut self, index: usize) {
        if index >= self.catalog.len() {
            debug!(index, len = self.catalog.len(), "ignoring out-of-range track index");
            return;
        }
        self.current = Some(index);
        self.generation += 1;
        self.ended_generation = None;
    }

    // ==========================================
    // SINK EVENTS: handle_event()
    // ==========================================
    // Moves the state machine and, on Ended, returns the index to play
    // next. Ended advances at most once per set_current().
    pub fn handle_event(
        &mut self,
        event: PlaybackEvent,
        visible_order: &[usize],
    ) -> Option<usize> {
        match event {
            PlaybackEvent::Started => {
                if let Some(index) = self.current {
                    self.state = PlaybackState::Playing(index);
                }
                None
            }
            PlaybackEvent::Paused => {
                if let Some(index) = self.current {
                    self.state = PlaybackState::Paused(index);
                }
                None
            }
            PlaybackEvent::Stopped => {
                self.state = PlaybackState::Idle;
                self.current = None;
                None
            }
            PlaybackEvent::Ended => {
                if self.ended_generation == Some(self.generation) {
                    debug!(generation = self.generation, "duplicate end of track ignored");
                    return None;
                }
                self.ended_generation = Some(self.generation);
                self.advance(visible_order)
            }
        }
    }

    // ==========================================
    // INSPECTION
    // ==========================================
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.catalog.get(index)
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current.and_then(|i| self.catalog.get(i))
    }

    pub fn is_shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn pending(&self) -> &VecDeque<usize> {
        &self.pending
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    #[cfg(test)]
    pub fn filter(&self) -> &str {
        &self.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn manager_with(count: usize) -> QueueManager {
        let mut manager = QueueManager::with_seed(7);
        let records = (0..count).map(|i| {
            RawTrackRecord::new(
                Some(format!("artist {i:03}")),
                Some(format!("title {i:03}")),
                Some(format!("/music/{i}.mp3")),
            )
        });
        manager.load(records);
        manager
    }

    #[test]
    fn load_resets_current_and_pending() {
        let mut manager = manager_with(3);
        manager.set_current(1);
        manager.set_shuffle(true, &[0, 1, 2], Some(1));
        manager.handle_event(PlaybackEvent::Started, &[0, 1, 2]);

        manager.load(vec![RawTrackRecord::new(Some("x"), Some("y"), Some("z.mp3"))]);

        assert_eq!(manager.current(), None);
        assert!(manager.pending().is_empty());
        assert_eq!(manager.state(), PlaybackState::Idle);
        assert_eq!(manager.catalog().len(), 1);
    }

    #[test]
    fn set_filter_does_not_touch_queue() {
        let mut manager = manager_with(4);
        manager.set_current(2);
        manager.set_shuffle(true, &[0, 1, 2, 3], Some(2));
        let pending_before = manager.pending().clone();

        let visible = manager.set_filter("  TITLE 001 ");

        assert_eq!(visible, vec![1]);
        assert_eq!(manager.filter(), "TITLE 001");
        assert_eq!(manager.current(), Some(2));
        assert_eq!(manager.pending(), &pending_before);
    }

    #[test]
    fn enabling_shuffle_excludes_current_track() {
        let mut manager = manager_with(5);
        manager.set_current(3);
        manager.set_shuffle(true, &[0, 1, 2, 3, 4], Some(3));

        let mut pending: Vec<usize> = manager.pending().iter().copied().collect();
        pending.sort();
        assert_eq!(pending, vec![0, 1, 2, 4]);
    }

    #[test]
    fn enabling_shuffle_ignores_exclusion_outside_pool() {
        let mut manager = manager_with(5);
        manager.set_shuffle(true, &[0, 1], Some(4));
        assert_eq!(manager.pending().len(), 2);
    }

    #[test]
    fn single_track_shuffle_keeps_that_track() {
        let mut manager = manager_with(1);
        manager.set_current(0);
        manager.set_shuffle(true, &[0], Some(0));

        assert_eq!(manager.pending().iter().copied().collect::<Vec<_>>(), vec![0]);
        assert_eq!(manager.advance(&[0]), Some(0));
    }

    #[test]
    fn disabling_shuffle_clears_pending() {
        let mut manager = manager_with(3);
        manager.set_shuffle(true, &[0, 1, 2], None);
        manager.set_shuffle(false, &[0, 1, 2], None);

        assert!(!manager.is_shuffle());
        assert!(manager.pending().is_empty());
        assert_eq!(manager.next_from_queue(), None);
    }

    #[test]
    fn next_from_queue_pops_front_then_runs_dry() {
        let mut manager = manager_with(2);
        manager.set_shuffle(true, &[0, 1], None);
        let expected: Vec<usize> = manager.pending().iter().copied().collect();

        assert_eq!(manager.next_from_queue(), Some(expected[0]));
        assert_eq!(manager.next_from_queue(), Some(expected[1]));
        assert_eq!(manager.next_from_queue(), None);
    }

    #[test]
    fn sequential_advance_wraps_around() {
        let mut manager = manager_with(3);
        let visible = [0, 1, 2];

        manager.set_current(1);
        assert_eq!(manager.advance(&visible), Some(2));

        manager.set_current(2);
        assert_eq!(manager.advance(&visible), Some(0));
    }

    #[test]
    fn sequential_advance_follows_display_order() {
        let mut manager = manager_with(3);
        manager.set_current(2);
        assert_eq!(manager.advance(&[2, 0, 1]), Some(0));
    }

    #[test]
    fn sequential_advance_falls_back_to_first_visible() {
        let mut manager = manager_with(4);
        manager.set_current(3);
        assert_eq!(manager.advance(&[1, 2]), Some(1));

        let mut idle = manager_with(4);
        assert_eq!(idle.advance(&[2, 3]), Some(2));
    }

    #[test]
    fn advance_on_empty_visible_is_none_in_both_modes() {
        let mut manager = manager_with(3);
        manager.set_current(0);
        assert_eq!(manager.advance(&[]), None);

        manager.set_shuffle(true, &[], Some(0));
        assert_eq!(manager.advance(&[]), None);
    }

    #[test]
    fn shuffle_advance_refills_from_current_visible_order() {
        let mut manager = manager_with(6);
        manager.set_shuffle(true, &[0, 1, 2, 3, 4, 5], None);
        while manager.next_from_queue().is_some() {}

        manager.set_current(4);
        let next = manager.advance(&[4, 5]);

        assert_eq!(next, Some(5));
        assert!(manager.pending().is_empty());
    }

    #[test]
    fn shuffle_advance_skips_tracks_hidden_by_a_later_filter() {
        let mut manager = manager_with(6);
        manager.set_shuffle(true, &[0, 1, 2, 3, 4, 5], None);

        let visible = [4, 5];
        let mut previous = None;
        for _ in 0..10 {
            let next = manager.advance(&visible).unwrap();
            assert!(visible.contains(&next), "{next} is not visible");
            assert_ne!(Some(next), previous);
            manager.set_current(next);
            previous = Some(next);
        }
    }

    #[test]
    fn shuffle_advance_skips_a_hand_picked_current_track() {
        let mut manager = manager_with(3);
        manager.set_shuffle(true, &[0, 1, 2], None);
        let picked = manager.pending()[0];
        manager.set_current(picked);

        let next = manager.advance(&[0, 1, 2]).unwrap();

        assert_ne!(next, picked);
    }

    #[test]
    fn stepping_past_an_unplayable_track_keeps_current() {
        let mut manager = manager_with(4);
        let visible = [0, 1, 2, 3];
        manager.set_current(0);
        manager.handle_event(PlaybackEvent::Started, &visible);

        // 1 could not be played, so it never becomes current
        let broken = manager.advance(&visible).unwrap();
        assert_eq!(broken, 1);
        assert_eq!(manager.advance_from(&visible, Some(broken)), Some(2));

        assert_eq!(manager.current(), Some(0));
        assert_eq!(manager.state(), PlaybackState::Playing(0));
    }

    #[test]
    fn shuffle_step_past_unplayable_track_avoids_it() {
        let mut manager = manager_with(3);
        manager.set_shuffle(true, &[0, 1, 2], None);
        while manager.next_from_queue().is_some() {}

        let next = manager.advance_from(&[0, 1, 2], Some(2)).unwrap();

        assert_ne!(next, 2);
    }

    #[test]
    fn start_plays_first_visible_without_shuffle() {
        let mut manager = manager_with(3);
        assert_eq!(manager.start(&[2, 0, 1]), Some(2));
        assert_eq!(manager.start(&[]), None);
    }

    #[test]
    fn start_with_shuffle_draws_from_visible() {
        let mut manager = manager_with(4);
        manager.set_shuffle(true, &[0, 1, 2, 3], None);

        let first = manager.start(&[1, 3]).unwrap();

        assert!(first == 1 || first == 3);
        assert_eq!(manager.pending().len(), 1);
    }

    #[test]
    fn set_current_ignores_out_of_range() {
        let mut manager = manager_with(2);
        manager.set_current(1);
        manager.set_current(2);
        manager.set_current(usize::MAX);
        assert_eq!(manager.current(), Some(1));

        let mut empty = QueueManager::with_seed(1);
        empty.set_current(0);
        assert_eq!(empty.current(), None);
    }

    #[test]
    fn events_drive_state_machine() {
        let mut manager = manager_with(2);
        let visible = [0, 1];

        manager.handle_event(PlaybackEvent::Started, &visible);
        assert_eq!(manager.state(), PlaybackState::Idle);

        manager.set_current(1);
        manager.handle_event(PlaybackEvent::Started, &visible);
        assert_eq!(manager.state(), PlaybackState::Playing(1));

        manager.handle_event(PlaybackEvent::Paused, &visible);
        assert_eq!(manager.state(), PlaybackState::Paused(1));

        manager.handle_event(PlaybackEvent::Stopped, &visible);
        assert_eq!(manager.state(), PlaybackState::Idle);
        assert_eq!(manager.current(), None);
    }

    #[test]
    fn duplicate_end_of_track_advances_once() {
        let mut manager = manager_with(3);
        let visible = [0, 1, 2];
        manager.set_current(0);

        assert_eq!(manager.handle_event(PlaybackEvent::Ended, &visible), Some(1));
        assert_eq!(manager.handle_event(PlaybackEvent::Ended, &visible), None);

        manager.set_current(1);
        assert_eq!(manager.handle_event(PlaybackEvent::Ended, &visible), Some(2));
    }

    #[test]
    fn replaying_same_track_rearms_end_of_track() {
        let mut manager = manager_with(1);
        manager.set_current(0);
        assert_eq!(manager.handle_event(PlaybackEvent::Ended, &[0]), Some(0));

        manager.set_current(0);
        assert_eq!(manager.handle_event(PlaybackEvent::Ended, &[0]), Some(0));
    }

    proptest! {
        #[test]
        fn sequential_advance_is_cyclic(len in 1usize..20, start in 0usize..20) {
            let mut manager = manager_with(len);
            let visible: Vec<usize> = (0..len).collect();
            let start = start % len;
            manager.set_current(start);

            prop_assert_eq!(manager.advance(&visible), Some((start + 1) % len));
        }

        #[test]
        fn shuffle_never_repeats_back_to_back(len in 2usize..12, steps in 1usize..60, seed in any::<u64>()) {
            let mut manager = QueueManager::with_seed(seed);
            manager.load((0..len).map(|i| {
                RawTrackRecord::new(Some(format!("a{i}")), Some(format!("t{i}")), Some(format!("{i}")))
            }));
            let visible: Vec<usize> = (0..len).collect();
            manager.set_shuffle(true, &visible, None);

            let mut previous = manager.advance(&visible).unwrap();
            manager.set_current(previous);
            for _ in 0..steps {
                let next = manager.advance(&visible).unwrap();
                prop_assert_ne!(next, previous);
                manager.set_current(next);
                previous = next;
            }
        }

        #[test]
        fn shuffle_order_is_a_permutation_of_visible(len in 1usize..15, seed in any::<u64>()) {
            let mut manager = QueueManager::with_seed(seed);
            manager.load((0..len).map(|i| {
                RawTrackRecord::new(Some("a"), Some(format!("t{i:02}")), Some(format!("{i}")))
            }));
            let visible: Vec<usize> = (0..len).rev().collect();
            manager.set_shuffle(true, &visible, None);

            let mut pending: Vec<usize> = manager.pending().iter().copied().collect();
            pending.sort();
            prop_assert_eq!(pending, (0..len).collect::<Vec<_>>());
        }
    }
}
