//! Admission budget for outbound dispatches
//!
//! Two independent limits enforced together: an upper bound on
//! concurrently-executing transport calls, and a minimum elapsed time
//! between successive dispatch starts even when concurrency would allow
//! more. Waiters queue in arrival order; nothing is dropped or reordered,
//! only delayed.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tokio::sync::{Semaphore, SemaphorePermit};

pub struct AdmissionBudget {
    concurrency: Semaphore,
    /// One cell replenished per `min_time`; absent when spacing is disabled
    spacing: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    max_concurrent: usize,
}

/// Slot held for the duration of one transport call; released on drop
pub struct AdmissionPermit<'a> {
    _permit: SemaphorePermit<'a>,
}

impl AdmissionBudget {
    pub fn new(max_concurrent: usize, min_time: Duration) -> Self {
        let max_concurrent = max_concurrent.max(1);
        let spacing = Quota::with_period(min_time)
            .map(|quota| quota.allow_burst(NonZeroU32::new(1).unwrap()))
            .map(RateLimiter::direct);

        Self {
            concurrency: Semaphore::new(max_concurrent),
            spacing,
            max_concurrent,
        }
    }

    /// Wait for a dispatch slot. Suspends until both a concurrency slot is
    /// free and the minimum spacing since the previous dispatch start has
    /// elapsed.
    pub async fn acquire(&self) -> AdmissionPermit<'_> {
        let permit = self
            .concurrency
            .acquire()
            .await
            .expect("admission semaphore is never closed");

        if let Some(spacing) = &self.spacing {
            spacing.until_ready().await;
        }

        AdmissionPermit { _permit: permit }
    }

    /// Slots not currently held
    pub fn available(&self) -> usize {
        self.concurrency.available_permits()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}
