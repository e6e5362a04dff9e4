// Count-Min Sketch with depth-4 rows of u32 counters, width fixed at 2^17.

use std::sync::atomic::{AtomicU32, Ordering};

use super::helper::mix64;

/// Rows per sketch.
const DEPTH: usize = 4;
/// Counters per row, fixed regardless of configured capacity/shard count.
pub(super) const WIDTH: u32 = 1 << 17;
const WIDTH_MASK: u32 = WIDTH - 1;

/// Sketch is a TinyLFU-style Count-Min Sketch: depth-4 rows of u32 counters.
///
/// Counters saturate at u32::MAX and are updated with plain fetch_add, so a
/// racing increment can be lost under heavy contention; that only biases an
/// estimate down by at most one and never corrupts the structure.
pub struct Sketch {
    rows: [Vec<AtomicU32>; DEPTH],
}

impl Sketch {
    /// Allocates a fresh, all-zero sketch.
    pub fn new() -> Self {
        Self {
            rows: std::array::from_fn(|_| (0..WIDTH as usize).map(|_| AtomicU32::new(0)).collect()),
        }
    }

    /// Increments the counter for h in every row.
    pub fn increment(&self, h: u64) {
        let mut hash = h;
        for row in &self.rows {
            let idx = (hash as u32) & WIDTH_MASK;
            row[idx as usize].fetch_add(1, Ordering::Relaxed);
            hash = mix64(hash);
        }
    }

    /// Returns the min counter across the depth-4 rows for h.
    pub fn estimate(&self, h: u64) -> u32 {
        let mut hash = h;
        let mut min = u32::MAX;
        for row in &self.rows {
            let idx = (hash as u32) & WIDTH_MASK;
            let c = row[idx as usize].load(Ordering::Relaxed);
            if c < min {
                min = c;
            }
            hash = mix64(hash);
        }
        min
    }
}

impl Default for Sketch {
    fn default() -> Self {
        Self::new()
    }
}
