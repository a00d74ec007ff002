use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::common::{FrameId, OxbowError, Result, Timestamp};

/// Tracks access history for a single frame
#[derive(Debug, Default)]
struct FrameAccessInfo {
    /// History of access timestamps, oldest at front, at most k entries
    history: VecDeque<Timestamp>,
    /// Whether this frame is currently evictable
    is_evictable: bool,
}

impl FrameAccessInfo {
    fn record_access(&mut self, timestamp: Timestamp, k: usize) {
        self.history.push_back(timestamp);
        while self.history.len() > k {
            self.history.pop_front();
        }
    }
}

struct ReplacerState {
    frame_info: HashMap<FrameId, FrameAccessInfo>,
    num_evictable: usize,
    current_timestamp: Timestamp,
}

/// LRU-K replacement policy.
///
/// The replacer evicts the evictable frame whose backward k-distance is the
/// largest. A frame with fewer than k recorded accesses has +inf distance and
/// takes priority over any frame with a full history; ties are broken by the
/// oldest timestamp at the front of the history.
pub struct LruKReplacer {
    /// K value for the LRU-K algorithm
    k: usize,
    /// Upper bound on trackable frame ids (frame ids are dense `[0, capacity)`)
    capacity: usize,
    state: Mutex<ReplacerState>,
}

impl LruKReplacer {
    pub fn new(k: usize, capacity: usize) -> Self {
        assert!(k > 0, "LRU-K requires k > 0");
        Self {
            k,
            capacity,
            state: Mutex::new(ReplacerState {
                frame_info: HashMap::new(),
                num_evictable: 0,
                current_timestamp: 0,
            }),
        }
    }

    fn check_frame(&self, frame_id: FrameId) -> Result<()> {
        if frame_id.as_usize() >= self.capacity {
            return Err(OxbowError::InvalidFrameId(frame_id));
        }
        Ok(())
    }

    /// Records that the given frame was accessed, advancing the logical clock.
    pub fn record_access(&self, frame_id: FrameId) -> Result<()> {
        self.check_frame(frame_id)?;

        let mut state = self.state.lock();
        state.current_timestamp += 1;
        let timestamp = state.current_timestamp;
        state
            .frame_info
            .entry(frame_id)
            .or_default()
            .record_access(timestamp, self.k);
        Ok(())
    }

    /// Toggles whether a frame may be chosen as a victim. Creates an empty
    /// record for a frame the replacer has not seen yet.
    pub fn set_evictable(&self, frame_id: FrameId, is_evictable: bool) -> Result<()> {
        self.check_frame(frame_id)?;

        let mut state = self.state.lock();
        let info = state.frame_info.entry(frame_id).or_default();
        if info.is_evictable != is_evictable {
            info.is_evictable = is_evictable;
            if is_evictable {
                state.num_evictable += 1;
            } else {
                state.num_evictable -= 1;
            }
        }
        Ok(())
    }

    /// Drops a frame's record entirely. No-op when the frame is untracked;
    /// removing a tracked but non-evictable frame is a caller bug.
    pub fn remove(&self, frame_id: FrameId) -> Result<()> {
        let mut state = self.state.lock();
        match state.frame_info.get(&frame_id) {
            None => Ok(()),
            Some(info) if !info.is_evictable => Err(OxbowError::FrameNotEvictable(frame_id)),
            Some(_) => {
                state.frame_info.remove(&frame_id);
                state.num_evictable -= 1;
                Ok(())
            }
        }
    }

    /// Evicts the frame with the largest backward k-distance.
    /// Returns None if there are no evictable frames.
    pub fn evict(&self) -> Option<FrameId> {
        let mut state = self.state.lock();
        if state.num_evictable == 0 {
            return None;
        }

        let mut victim: Option<(FrameId, &FrameAccessInfo)> = None;
        for (frame_id, info) in state.frame_info.iter() {
            if !info.is_evictable {
                continue;
            }
            let beats = match victim {
                None => true,
                Some((_, best)) => Self::beats(info, best, self.k),
            };
            if beats {
                victim = Some((*frame_id, info));
            }
        }

        let frame_id = victim.map(|(id, _)| id)?;
        state.frame_info.remove(&frame_id);
        state.num_evictable -= 1;
        log::trace!("lru-k victim: frame {}", frame_id);
        Some(frame_id)
    }

    /// Whether `candidate` is a better victim than `best`: a partial history
    /// beats a full one, otherwise the older front-of-history timestamp wins.
    fn beats(candidate: &FrameAccessInfo, best: &FrameAccessInfo, k: usize) -> bool {
        let cand_partial = candidate.history.len() < k;
        let best_partial = best.history.len() < k;
        if cand_partial != best_partial {
            return cand_partial;
        }
        match (candidate.history.front(), best.history.front()) {
            (Some(c), Some(b)) => c < b,
            (Some(_), None) => false,
            (None, _) => true,
        }
    }

    /// Returns the number of evictable frames.
    pub fn size(&self) -> usize {
        self.state.lock().num_evictable
    }

    /// Returns the k value of this replacer.
    pub fn k(&self) -> usize {
        self.k
    }
}
