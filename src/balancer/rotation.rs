//! Round-robin rotation with health-based skipping
//!
//! The cursor wraps modulo the pool length at selection time, never
//! pre-emptively, so the pool may grow or shrink between refreshes without
//! corrupting it. Skipping is capped at one full pass: when every candidate
//! fails the health check, selection degrades to plain round-robin rather
//! than spinning. Health gating is advisory, not a circuit breaker.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, warn};

use super::stats::StatsTracker;
use crate::error::{BalancerError, Result};
use crate::models::ProxyAddress;

pub struct Rotation {
    cursor: AtomicUsize,
}

impl Rotation {
    pub fn new() -> Self {
        Self {
            cursor: AtomicUsize::new(0),
        }
    }

    /// Pick the next proxy.
    ///
    /// On the terminal attempt a configured fallback is returned
    /// unconditionally, health checks bypassed, before the pool is even
    /// consulted. Otherwise candidates are taken in pool order; unhealthy
    /// ones are skipped (and the skip recorded) for at most one full pass.
    pub fn next(
        &self,
        pool: &[ProxyAddress],
        stats: &StatsTracker,
        last_attempt: bool,
        fallback: Option<&ProxyAddress>,
    ) -> Result<ProxyAddress> {
        if last_attempt {
            if let Some(fallback) = fallback {
                debug!(proxy = %fallback.redacted(), "terminal attempt, using fallback proxy");
                return Ok(fallback.clone());
            }
        }

        if pool.is_empty() {
            return Err(BalancerError::EmptyPool);
        }

        for _ in 0..pool.len() {
            let candidate = &pool[self.advance(pool.len())];
            if stats.is_healthy(candidate) {
                return Ok(candidate.clone());
            }
            stats.record_skip(candidate);
            debug!(proxy = %candidate.redacted(), "skipping unhealthy proxy");
        }

        // full pass without a healthy candidate: degrade instead of spinning
        let candidate = pool[self.advance(pool.len())].clone();
        warn!(
            proxy = %candidate.redacted(),
            pool_size = pool.len(),
            "no healthy proxies in pool, selecting next candidate regardless"
        );
        Ok(candidate)
    }

    /// Take the current index, wrapping to 0 when it no longer fits the
    /// pool, and advance the cursor past it.
    fn advance(&self, len: usize) -> usize {
        let mut cur = self.cursor.load(Ordering::Relaxed);
        loop {
            let idx = if cur >= len { 0 } else { cur };
            match self.cursor.compare_exchange_weak(
                cur,
                idx + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return idx,
                Err(actual) => cur = actual,
            }
        }
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Self::new()
    }
}
