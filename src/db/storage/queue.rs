//! Bounded per-shard refresh queue.
//

use parking_lot::Mutex;
use std::collections::VecDeque;

/// Caps how many pending refresh keys a single shard will hold before it
/// starts dropping new enqueue attempts. Keeps backpressure local: a shard
/// that can't keep up with refreshes never blocks the hot `get`/`set` path.
const MAX_PENDING: usize = 4096;

/// FIFO of keys awaiting background refresh, private to one shard.
pub struct Queue {
    inner: Mutex<VecDeque<u64>>,
}

impl Queue {
    /// Attempts to enqueue a key. Returns `false` if the queue is full.
    pub fn try_push(&self, key: u64) -> bool {
        let mut guard = self.inner.lock();
        if guard.len() >= MAX_PENDING {
            return false;
        }
        guard.push_back(key);
        true
    }

    /// Pops the oldest queued key, if any.
    pub fn try_pop(&self) -> Option<u64> {
        self.inner.lock().pop_front()
    }
}

impl Default for Queue {
    fn default() -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(16)),
        }
    }
}
