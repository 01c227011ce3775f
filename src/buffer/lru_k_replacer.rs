use std::collections::{HashMap, VecDeque};

use log::{trace, warn};
use parking_lot::Mutex;

use crate::common::{BufCoreError, FrameId, Result, Timestamp};

/// Tracks access history for a single frame
#[derive(Debug)]
struct FrameAccessInfo {
    /// The most recent k access timestamps (most recent at back)
    history: VecDeque<Timestamp>,
    /// Whether this frame is currently evictable
    is_evictable: bool,
}

impl FrameAccessInfo {
    fn new(k: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(k + 1),
            is_evictable: false,
        }
    }

    /// Records an access at the given timestamp
    fn record_access(&mut self, timestamp: Timestamp, k: usize) {
        self.history.push_back(timestamp);
        // Keep only the last k accesses
        while self.history.len() > k {
            self.history.pop_front();
        }
    }

    /// Returns the backward k-distance from `current_timestamp`, or None
    /// if this frame has fewer than k accesses (+inf distance).
    fn k_distance(&self, current_timestamp: Timestamp, k: usize) -> Option<Timestamp> {
        if self.history.len() < k {
            None
        } else {
            // The kth previous access is at index (len - k)
            Some(current_timestamp - self.history[self.history.len() - k])
        }
    }
}

/// Everything the replacer latch protects
#[derive(Debug, Default)]
struct ReplacerState {
    /// Logical clock, advanced by one on every recorded access
    current_timestamp: Timestamp,
    frame_info: HashMap<FrameId, FrameAccessInfo>,
    /// Frames with fewer than k accesses, in order of first access
    history_queue: VecDeque<FrameId>,
    /// Frames with at least k accesses, in order of reaching k
    cache_queue: VecDeque<FrameId>,
    /// Number of tracked frames whose evictable flag is set
    num_evictable: usize,
}

impl ReplacerState {
    /// Drops a frame's record and unlinks it from its queue.
    fn detach(&mut self, frame_id: FrameId) -> Option<FrameAccessInfo> {
        let info = self.frame_info.remove(&frame_id)?;
        for queue in [&mut self.history_queue, &mut self.cache_queue] {
            if let Some(pos) = queue.iter().position(|&f| f == frame_id) {
                queue.remove(pos);
                break;
            }
        }
        Some(info)
    }

    /// First evictable frame in the history queue.
    fn history_victim(&self) -> Option<FrameId> {
        self.history_queue.iter().copied().find(|frame_id| {
            self.frame_info
                .get(frame_id)
                .is_some_and(|info| info.is_evictable)
        })
    }

    /// Evictable frame in the cache queue with the largest k-distance.
    /// Ties keep the frame seen first.
    fn cache_victim(&self, k: usize) -> Option<FrameId> {
        let mut victim: Option<(FrameId, Timestamp)> = None;

        for &frame_id in &self.cache_queue {
            let Some(info) = self.frame_info.get(&frame_id) else {
                continue;
            };
            if !info.is_evictable {
                continue;
            }
            let Some(distance) = info.k_distance(self.current_timestamp, k) else {
                continue;
            };

            if victim.map_or(true, |(_, best)| distance > best) {
                victim = Some((frame_id, distance));
            }
        }

        victim.map(|(frame_id, _)| frame_id)
    }
}

/// LRU-K Replacement Policy
///
/// The LRU-K algorithm evicts a frame whose backward k-distance is the maximum
/// of all frames in the replacer. Backward k-distance is computed as the difference
/// in time between the current timestamp and the timestamp of kth previous access.
///
/// Frames with fewer than k accesses live in a history queue and are always
/// evicted before any frame that has reached k accesses. Among them the
/// replacer is FIFO: the frame first accessed earliest goes first. Frames
/// that reached k accesses move to a cache queue, where classic LRU-K applies.
///
/// A single latch guards the clock, both queues and every frame record.
pub struct LruKReplacer {
    /// K value for the LRU-K algorithm
    k: usize,
    /// Frame ids must be below this bound
    replacer_size: usize,
    state: Mutex<ReplacerState>,
}

impl LruKReplacer {
    /// Creates a new LRU-K replacer with the given k value and maximum frame count.
    ///
    /// # Panics
    ///
    /// Panics if `k` is zero.
    pub fn new(k: usize, replacer_size: usize) -> Self {
        assert!(k > 0, "k must be at least 1");
        Self {
            k,
            replacer_size,
            state: Mutex::new(ReplacerState::default()),
        }
    }

    fn check_frame_id(&self, frame_id: FrameId) -> Result<()> {
        if frame_id.as_usize() >= self.replacer_size {
            warn!(
                "rejected {}: replacer tracks at most {} frames",
                frame_id, self.replacer_size
            );
            return Err(BufCoreError::InvalidFrameId {
                frame_id,
                replacer_size: self.replacer_size,
            });
        }
        Ok(())
    }

    /// Evicts the frame with the largest backward k-distance.
    /// Returns None if there are no evictable frames.
    pub fn evict(&self) -> Option<FrameId> {
        let mut state = self.state.lock();

        if state.num_evictable == 0 {
            return None;
        }

        let frame_id = state
            .history_victim()
            .or_else(|| state.cache_victim(self.k))?;

        state.detach(frame_id);
        state.num_evictable -= 1;
        trace!(
            "evicted {} at timestamp {} ({} evictable left)",
            frame_id,
            state.current_timestamp,
            state.num_evictable
        );

        Some(frame_id)
    }

    /// Records that the given frame was accessed at the current timestamp.
    /// This method should be called after a page is pinned in the buffer pool.
    pub fn record_access(&self, frame_id: FrameId) -> Result<()> {
        self.check_frame_id(frame_id)?;

        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.current_timestamp += 1;
        let timestamp = state.current_timestamp;

        let info = state
            .frame_info
            .entry(frame_id)
            .or_insert_with(|| FrameAccessInfo::new(self.k));
        let before = info.history.len();
        info.record_access(timestamp, self.k);
        let after = info.history.len();

        if before == 0 {
            if after >= self.k {
                state.cache_queue.push_back(frame_id);
            } else {
                state.history_queue.push_back(frame_id);
            }
        } else if before < self.k && after == self.k {
            if let Some(pos) = state.history_queue.iter().position(|&f| f == frame_id) {
                state.history_queue.remove(pos);
            }
            state.cache_queue.push_back(frame_id);
        }

        Ok(())
    }

    /// Sets whether a frame is evictable.
    /// When a frame's pin count drops to 0, it should be marked as evictable.
    /// Untracked frames are ignored.
    pub fn set_evictable(&self, frame_id: FrameId, is_evictable: bool) -> Result<()> {
        self.check_frame_id(frame_id)?;

        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(info) = state.frame_info.get_mut(&frame_id) {
            if info.is_evictable != is_evictable {
                if is_evictable {
                    state.num_evictable += 1;
                } else {
                    state.num_evictable -= 1;
                }
                info.is_evictable = is_evictable;
            }
        }

        Ok(())
    }

    /// Removes a frame and its access history from the replacer.
    /// This should be called when a page is deleted from the buffer pool.
    ///
    /// Removing an untracked frame does nothing. Removing a tracked frame
    /// that is not evictable is rejected with `FrameNotEvictable`.
    pub fn remove(&self, frame_id: FrameId) -> Result<()> {
        self.check_frame_id(frame_id)?;

        let mut state = self.state.lock();

        let is_evictable = match state.frame_info.get(&frame_id) {
            Some(info) => info.is_evictable,
            None => return Ok(()),
        };

        if !is_evictable {
            warn!("refused to remove pinned {}", frame_id);
            return Err(BufCoreError::FrameNotEvictable(frame_id));
        }

        state.detach(frame_id);
        state.num_evictable -= 1;
        Ok(())
    }

    /// Returns the number of evictable frames.
    pub fn size(&self) -> usize {
        self.state.lock().num_evictable
    }

    /// Returns true if no frame can currently be evicted.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Returns the number of frames with a recorded access history,
    /// evictable or not.
    pub fn tracked(&self) -> usize {
        self.state.lock().frame_info.len()
    }

    /// Returns the k value of this replacer.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Returns the exclusive upper bound on frame ids.
    pub fn replacer_size(&self) -> usize {
        self.replacer_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access(replacer: &LruKReplacer, frame: u32) {
        replacer.record_access(FrameId::new(frame)).unwrap();
    }

    fn evictable(replacer: &LruKReplacer, frame: u32) {
        replacer.set_evictable(FrameId::new(frame), true).unwrap();
    }

    #[test]
    fn test_lru_k_replacer_new() {
        let replacer = LruKReplacer::new(2, 10);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.k(), 2);
        assert_eq!(replacer.replacer_size(), 10);
        assert!(replacer.is_empty());
    }

    #[test]
    #[should_panic(expected = "k must be")]
    fn test_lru_k_replacer_zero_k_panics() {
        let _ = LruKReplacer::new(0, 10);
    }

    #[test]
    fn test_lru_k_replacer_evict_empty() {
        let replacer = LruKReplacer::new(2, 10);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_lru_k_replacer_basic() {
        let replacer = LruKReplacer::new(2, 10);

        for frame in 0..3 {
            access(&replacer, frame);
        }
        for frame in 0..3 {
            evictable(&replacer, frame);
        }

        assert_eq!(replacer.size(), 3);

        // All have only 1 access (less than k=2), so the first one in wins
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
        assert_eq!(replacer.size(), 2);
        assert_eq!(replacer.tracked(), 2);
    }

    #[test]
    fn test_lru_k_replacer_history_tier_first() {
        let replacer = LruKReplacer::new(2, 10);

        access(&replacer, 1);
        access(&replacer, 2);
        access(&replacer, 2);
        access(&replacer, 2);

        evictable(&replacer, 1);
        evictable(&replacer, 2);

        // Frame 1 has one access; it goes first even though frame 2 is newer
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
    }

    #[test]
    fn test_lru_k_replacer_k_distance_scan() {
        let replacer = LruKReplacer::new(2, 10);

        // t1: frame 1, t2: frame 2, t3: frame 1, t4: frame 3, t5: frame 2
        access(&replacer, 1);
        access(&replacer, 2);
        access(&replacer, 1);
        access(&replacer, 3);
        access(&replacer, 2);

        evictable(&replacer, 1);
        evictable(&replacer, 2);

        // Frame 3 is pinned. k-distances at t5: frame 1 = 4, frame 2 = 3
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_lru_k_replacer_k_one_skips_history() {
        let replacer = LruKReplacer::new(1, 10);

        access(&replacer, 0);
        access(&replacer, 1);
        access(&replacer, 0);

        evictable(&replacer, 0);
        evictable(&replacer, 1);

        // With k=1 this is plain LRU: frame 1 was touched least recently
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_lru_k_replacer_not_evictable() {
        let replacer = LruKReplacer::new(2, 10);

        access(&replacer, 0);
        access(&replacer, 1);

        // Only mark frame 1 evictable
        evictable(&replacer, 1);

        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_lru_k_replacer_set_evictable_untracked() {
        let replacer = LruKReplacer::new(2, 10);

        evictable(&replacer, 4);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.tracked(), 0);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_lru_k_replacer_invalid_frame() {
        let replacer = LruKReplacer::new(2, 10);
        let frame_id = FrameId::new(10);
        let expected = Err(BufCoreError::InvalidFrameId {
            frame_id,
            replacer_size: 10,
        });

        assert_eq!(replacer.record_access(frame_id), expected);
        assert_eq!(replacer.set_evictable(frame_id, true), expected);
        assert_eq!(replacer.remove(frame_id), expected);
        assert_eq!(replacer.tracked(), 0);
    }

    #[test]
    fn test_lru_k_replacer_remove() {
        let replacer = LruKReplacer::new(2, 10);

        access(&replacer, 0);
        evictable(&replacer, 0);

        assert_eq!(replacer.size(), 1);

        replacer.remove(FrameId::new(0)).unwrap();

        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.tracked(), 0);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_lru_k_replacer_remove_pinned_fails() {
        let replacer = LruKReplacer::new(2, 10);

        access(&replacer, 0);
        assert_eq!(
            replacer.remove(FrameId::new(0)),
            Err(BufCoreError::FrameNotEvictable(FrameId::new(0)))
        );
        assert_eq!(replacer.tracked(), 1);

        // A frame never seen is a silent no-op
        assert_eq!(replacer.remove(FrameId::new(5)), Ok(()));
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_lru_k_replacer_toggle_evictable() {
        let replacer = LruKReplacer::new(2, 10);

        access(&replacer, 0);
        evictable(&replacer, 0);
        evictable(&replacer, 0);
        assert_eq!(replacer.size(), 1);

        replacer.set_evictable(FrameId::new(0), false).unwrap();
        replacer.set_evictable(FrameId::new(0), false).unwrap();
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);

        evictable(&replacer, 0);
        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_lru_k_replacer_largest_k_distance() {
        let replacer = LruKReplacer::new(2, 10);

        // Frame 0: access at t=1, t=2
        // Frame 1: access at t=3, t=4
        // Frame 2: access at t=5, t=6
        for frame in 0..3 {
            access(&replacer, frame);
            access(&replacer, frame);
        }
        for frame in 0..3 {
            evictable(&replacer, frame);
        }

        // k-distances at t=6: frame 0 = 5, frame 1 = 3, frame 2 = 1
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
    }

    #[test]
    fn test_frame_access_info_keeps_last_k() {
        let mut info = FrameAccessInfo::new(2);
        for ts in 1..=5 {
            info.record_access(ts, 2);
        }
        assert_eq!(info.history, VecDeque::from(vec![4, 5]));
        assert_eq!(info.k_distance(7, 2), Some(3));
        assert_eq!(info.k_distance(7, 3), None);
    }
}
