// Sharded TinyLFU admission filter: each shard pairs a pair of Count-Min
// Sketch generations with a doorkeeper, so a candidate only touches one
// shard's atomics.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::Admission as AdmissionConfig;

use super::count_min_sketch::{Sketch, WIDTH};
use super::door_keeper::Doorkeeper;
use super::helper::next_pow2;

/// Sharded admitter for TinyLFU.
pub struct ShardedAdmitter {
    mask: u32,
    shards: Vec<Shard>,
}

/// One independent sketch pair + doorkeeper.
///
/// `current` accumulates counts for the active window; `previous` holds the
/// prior window's counts. A frequency estimate averages both, so a key's
/// weight decays smoothly across rotations instead of dropping to zero the
/// instant a window turns over.
struct Shard {
    current: ArcSwap<Sketch>,
    previous: ArcSwap<Sketch>,
    door: Doorkeeper,
    adds: AtomicU64,
    reset_at: u64,
    rotating: AtomicU8,
}

impl Shard {
    fn new(door_bits: u32, reset_at: u64) -> Self {
        Self {
            current: ArcSwap::new(Arc::new(Sketch::new())),
            previous: ArcSwap::new(Arc::new(Sketch::new())),
            door: Doorkeeper::new(door_bits),
            adds: AtomicU64::new(0),
            reset_at,
            rotating: AtomicU8::new(0),
        }
    }

    /// Records a sight: first sight only marks the doorkeeper, subsequent
    /// sights increment the active sketch generation.
    fn record(&self, h: u64) {
        if self.door.seen_or_add(h) {
            self.current.load().increment(h);
            if self.adds.fetch_add(1, Ordering::Relaxed) + 1 >= self.reset_at {
                self.maybe_rotate();
            }
        }
    }

    /// Averages the frequency estimate across both sketch generations.
    fn estimate(&self, h: u64) -> u32 {
        let cur = self.current.load().estimate(h);
        let prev = self.previous.load().estimate(h);
        (cur + prev) / 2
    }

    fn maybe_rotate(&self) {
        if self
            .rotating
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
        {
            if self.adds.load(Ordering::Relaxed) >= self.reset_at {
                self.rotate();
            }
            self.rotating.store(0, Ordering::Relaxed);
        }
    }

    /// Demotes the active generation to `previous` and starts a fresh
    /// `current`, replacing the sketch pointers atomically. Readers may
    /// briefly see the previous generation mid-swap; that is acceptable.
    fn rotate(&self) {
        let fresh = Arc::new(Sketch::new());
        let retiring = self.current.swap(fresh);
        self.previous.store(retiring);
        self.door.reset();
        self.adds.store(0, Ordering::Relaxed);
    }
}

impl ShardedAdmitter {
    /// Creates a new sharded admitter from config, applying defaults for
    /// any field left unset.
    pub fn new(cfg: &AdmissionConfig) -> Self {
        // `capacity` no longer sizes the sketch: each shard's table is a
        // fixed WIDTH regardless of expected key count. Kept in config for
        // operator-facing capacity planning and forward compatibility.
        let _capacity = cfg.capacity.unwrap_or(10_000).max(1);
        let configured_shards = cfg.shards.unwrap_or(4).max(1);
        let sample_multiplier = cfg.sample_multiplier.unwrap_or(10).max(1) as u64;
        let door_bits_per_counter = cfg.door_bits_per_counter.unwrap_or(8).max(1) as u32;

        let num_shards = next_pow2(configured_shards) as u32;
        let door_bits = WIDTH * door_bits_per_counter;
        let reset_at = sample_multiplier * WIDTH as u64;

        let mut shards_vec = Vec::with_capacity(num_shards as usize);
        for _ in 0..num_shards {
            shards_vec.push(Shard::new(door_bits, reset_at));
        }

        Self {
            mask: num_shards - 1,
            shards: shards_vec,
        }
    }

    /// Records a key access: marks the doorkeeper on first sight, then
    /// increments its sketch frequency on every subsequent sight.
    pub fn record(&self, h: u64) {
        let sh = &self.shards[(h & self.mask as u64) as usize];
        sh.record(h);
    }

    /// Returns true if the candidate should replace the victim.
    ///
    /// A candidate never seen by the doorkeeper gets newcomer amnesty: the
    /// filter has no frequency signal to judge it against, so it is admitted
    /// unconditionally rather than punished for being unseen. Once a
    /// candidate has a frequency signal, it wins ties against the victim.
    pub fn allow(&self, candidate: u64, victim: u64) -> bool {
        let sh = &self.shards[(candidate & self.mask as u64) as usize];
        if !sh.door.probably_seen(candidate) {
            return true;
        }
        let cf = sh.estimate(candidate);
        let vf = sh.estimate(victim);
        cf >= vf
    }

    /// Frequency estimate for a key, for metrics/diagnostics.
    pub fn estimate(&self, h: u64) -> u32 {
        let sh = &self.shards[(h & self.mask as u64) as usize];
        sh.estimate(h)
    }

    /// Forces rotation of every shard's sketch generations and clears every
    /// doorkeeper.
    pub fn reset(&self) {
        for sh in &self.shards {
            sh.rotate();
        }
    }
}

impl Default for ShardedAdmitter {
    fn default() -> Self {
        use std::sync::atomic::AtomicBool;
        let default_cfg = AdmissionConfig {
            enabled: false,
            is_enabled: Arc::new(AtomicBool::new(false)),
            capacity: Some(10_000),
            shards: Some(4),
            sample_multiplier: Some(10),
            door_bits_per_counter: Some(8),
        };
        Self::new(&default_cfg)
    }
}
