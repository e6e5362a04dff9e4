// Package lfu provides tests for admission control components.
//

#[cfg(test)]
mod tests {
    use crate::db::admission::count_min_sketch::Sketch;
    use crate::db::admission::door_keeper::Doorkeeper;
    use crate::db::admission::helper::mix64;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    /// mix_key is a stable generator of 64-bit "hashes" from an integer id.
    fn mix_key(x: u64) -> u64 {
        mix64(x)
    }

    /// The sketch should rank hot keys > cold keys, and a fresh generation
    /// should read back zero everywhere.
    #[test]
    fn test_sketch_ranking_and_aging() {
        let s = Sketch::new();

        // 100 hot keys with 100 hits each; 100 cold keys with 1 hit.
        const HOT_N: usize = 100;
        const HOT_HITS: usize = 100;
        const COLD_N: usize = 100;
        const COLD_HITS: usize = 1;

        // Increment
        for i in 0..HOT_N {
            let h = mix_key(0x100000 + i as u64);
            for _ in 0..HOT_HITS {
                s.increment(h);
            }
        }
        for i in 0..COLD_N {
            let h = mix_key(0x200000 + i as u64);
            for _ in 0..COLD_HITS {
                s.increment(h);
            }
        }

        // Collect estimates
        let mut hot_vals = Vec::with_capacity(HOT_N);
        let mut cold_vals = Vec::with_capacity(COLD_N);
        for i in 0..HOT_N {
            let h = mix_key(0x100000 + i as u64);
            hot_vals.push(s.estimate(h));
        }
        for i in 0..COLD_N {
            let h = mix_key(0x200000 + i as u64);
            cold_vals.push(s.estimate(h));
        }

        // Median hot should be strictly > median cold.
        fn median(xs: &[u32]) -> u32 {
            let mut cp = xs.to_vec();
            // Simple bubble sort for small arrays
            for i in 0..cp.len() - 1 {
                for j in i + 1..cp.len() {
                    if cp[j] < cp[i] {
                        cp.swap(i, j);
                    }
                }
            }
            cp[cp.len() / 2]
        }

        let mh = median(&hot_vals);
        let mc = median(&cold_vals);
        if mh <= mc {
            panic!("median hot <= median cold: hot={} cold={}", mh, mc);
        }

        // A freshly allocated generation must read back zero everywhere.
        let fresh = Sketch::new();
        for i in 0..HOT_N {
            let h = mix_key(0x100000 + i as u64);
            if fresh.estimate(h) != 0 {
                panic!("fresh sketch returned nonzero estimate");
            }
        }
    }

    /// Under high contention, doorkeeper.set must not spin forever.
    /// We bound CAS loops, so the operation should finish quickly and the bit should be set.
    #[tokio::test]
    async fn test_doorkeeper_bounded_cas_under_contention() {
        let d = Arc::new(Doorkeeper::new(64)); // one word
                                               // Choose the same bit for all tasks (key = 3)
        let key: u64 = 3;

        let workers = num_cpus::get() * 4;
        let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let mut join_set = tokio::task::JoinSet::new();

        // Spawn setter tasks
        for _ in 0..workers {
            let d_clone = d.clone();
            let stop_clone = stop.clone();
            join_set.spawn(async move {
                for _ in 0..1000 {
                    if stop_clone.load(Ordering::Relaxed) {
                        return;
                    }
                    // seen_or_add internally calls set() for each bit, exercising the CAS logic
                    d_clone.seen_or_add(key);
                }
            });
        }

        // Wait for all tasks with timeout
        let result = timeout(Duration::from_secs(2), async {
            while let Some(result) = join_set.join_next().await {
                result.unwrap();
            }
        })
        .await;

        if result.is_err() {
            stop.store(true, Ordering::Relaxed);
            panic!("doorkeeper.set under contention took too long (possible spin)");
        }

        // Verify bit is set by checking if probably_seen returns true
        if !d.probably_seen(key) {
            panic!("bit not set after contention");
        }
    }

    /// Hot paths should not allocate.
    #[test]
    fn test_zero_allocs_smoke() {
        let d = Doorkeeper::new(1024);
        let s = Sketch::new();

        let h = mix_key(42);

        // Run many times to ensure no panics and reasonable performance
        for _ in 0..10000 {
            let _ = d.seen_or_add(h);
        }
        for _ in 0..10000 {
            s.increment(h);
        }
        for _ in 0..10000 {
            let _ = s.estimate(h);
        }
    }
}
