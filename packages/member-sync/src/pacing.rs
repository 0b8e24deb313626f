//! Pacing between destructive remote calls.
//!
//! Removal APIs are rate limited per call, so adapters ask a [`Pacer`] for a
//! permit before each one and report back once the call has finished. A
//! permit is granted at least one period after the previous call finished; the
//! first is granted immediately, which means nothing waits after the last call
//! of a batch.

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Default spacing between removals.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

/// The cancellation token fired before a permit was granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("pacing wait cancelled")]
pub struct Cancelled;

/// Gate in front of every mutating remote call.
#[async_trait]
pub trait Pacer: Send + Sync {
    /// Wait until the next call may be issued.
    ///
    /// Returns `Err(Cancelled)` without waiting further once `cancel` fires.
    async fn acquire(&self, cancel: &CancellationToken) -> Result<(), Cancelled>;

    /// The call made under the last permit has finished.
    fn completed(&self) {}
}

/// Spaces permits a fixed delay apart using the tokio timer.
///
/// Safe to share between adapters: each waiter reserves its own slot, so two
/// concurrent callers never receive the same one.
#[derive(Debug)]
pub struct FixedDelay {
    delay: Duration,
    /// Latest reserved permit or finished call, whichever is later.
    last: Mutex<Option<Instant>>,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Claim the next free slot.
    fn reserve(&self) -> Instant {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let slot = match *last {
            Some(at) => (at + self.delay).max(now),
            None => now,
        };
        *last = Some(slot);
        slot
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY)
    }
}

#[async_trait]
impl Pacer for FixedDelay {
    async fn acquire(&self, cancel: &CancellationToken) -> Result<(), Cancelled> {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }

        let slot = self.reserve();
        if slot > Instant::now() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Cancelled),
                _ = tokio::time::sleep_until(slot) => {}
            }
        }

        Ok(())
    }

    fn completed(&self) {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        // A later slot may already be reserved by another waiter.
        if last.map_or(true, |at| at < now) {
            *last = Some(now);
        }
    }
}

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Pacer backed by a governor rate limiter.
///
/// Useful when several adapters talking to the same remote should share one
/// budget: clones share the limiter.
#[derive(Clone)]
pub struct GovernorPacer {
    limiter: Arc<DirectRateLimiter>,
}

impl GovernorPacer {
    /// Allow `calls_per_second` permits per second.
    pub fn per_second(calls_per_second: NonZeroU32) -> Self {
        Self::with_quota(Quota::per_second(calls_per_second))
    }

    /// One permit per `period`. Returns `None` for a zero period.
    pub fn with_period(period: Duration) -> Option<Self> {
        Quota::with_period(period).map(Self::with_quota)
    }

    pub fn with_quota(quota: Quota) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }
}

impl Default for GovernorPacer {
    fn default() -> Self {
        Self::per_second(nonzero!(1u32))
    }
}

#[async_trait]
impl Pacer for GovernorPacer {
    async fn acquire(&self, cancel: &CancellationToken) -> Result<(), Cancelled> {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Cancelled),
            _ = self.limiter.until_ready() => Ok(()),
        }
    }
}

/// Grants every permit immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unpaced;

#[async_trait]
impl Pacer for Unpaced {
    async fn acquire(&self, cancel: &CancellationToken) -> Result<(), Cancelled> {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        Ok(())
    }
}
