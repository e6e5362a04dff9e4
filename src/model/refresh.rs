use std::sync::atomic::Ordering;

use crate::time;
use crate::config::{Config, ConfigTrait};
use super::Entry;

impl Entry {
    /// Checks that elapsed time is greater than TTL (used in hotpath: GET).
    pub fn is_expired(&self, cfg: &Config) -> bool {
        let ttl = cfg.lifetime()
            .and_then(|l| l.ttl)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0);
        
        // Time since the last successful refresh.
        let updated_at = self.updated_at.load(Ordering::Relaxed);
        let elapsed = time::unix_nano() - updated_at;
        
        elapsed > ttl
    }

    /// Probabilistic early-refresh check used by the background refresh sampler.
    ///
    /// Ramps the refresh probability up from 0 at `ttl * coefficient` elapsed to
    /// effectively 1 as `elapsed` approaches `ttl`, so refreshes spread out instead of
    /// stampeding all at once when an entry crosses its TTL.
    pub fn is_probably_expired(&self, cfg: &Config) -> bool {
        let global = cfg.lifetime();

        let ttl = self
            .rule
            .refresh
            .as_ref()
            .and_then(|r| r.ttl)
            .or_else(|| global.and_then(|l| l.ttl))
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0);

        if ttl <= 0 {
            return false;
        }

        let beta = self
            .rule
            .refresh
            .as_ref()
            .and_then(|r| r.beta)
            .filter(|b| *b != 0.0)
            .or_else(|| global.and_then(|l| l.beta))
            .unwrap_or(1.0);

        let coefficient = self
            .rule
            .refresh
            .as_ref()
            .and_then(|r| r.coefficient)
            .filter(|c| *c != 0.0)
            .or_else(|| global.and_then(|l| l.coefficient))
            .unwrap_or(0.0);

        let updated_at = self.updated_at.load(Ordering::Relaxed);
        let elapsed = time::unix_nano() - updated_at;

        let min_stale = (ttl as f64 * coefficient) as i64;
        if elapsed < min_stale {
            return false;
        }

        let x = (elapsed as f64 / ttl as f64).clamp(0.0, 1.0);
        let p = 1.0 - (-beta * x).exp();

        rand::random::<f64>() < p
    }

    /// Tries to mark the entry as refresh queued.
    pub fn try_mark_refresh_queued(&self) -> bool {
        self.refresh_queued
            .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    }

    /// Clears the refresh queued flag.
    pub fn clear_refresh_queued(&self) {
        self.refresh_queued.store(false, Ordering::Relaxed);
    }
}

