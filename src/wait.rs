//! Cooperative wait queue shared by interrupt producers and blocked pollers.

use core::marker::PhantomData;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use spin::relax::{RelaxStrategy, Spin};

/// Epoch-based wait queue.
///
/// Producers call [`notify_all`](Self::notify_all) from any context; it only
/// touches atomics. Waiters re-check their condition and call `R::relax()`
/// between checks, so the embedder decides whether waiting spins or yields to
/// its scheduler.
///
/// The epoch lets a waiter observe "something happened" even when the
/// condition it was waiting for has been retracted in the meantime.
pub struct WaitQueue<R: RelaxStrategy = Spin> {
    /// Number of waiters currently inside `wait_*`.
    waiters: AtomicUsize,
    /// Bumped on every `notify_all`.
    epoch: AtomicU64,
    _relax: PhantomData<fn() -> R>,
}

impl<R: RelaxStrategy> WaitQueue<R> {
    /// Creates an empty wait queue.
    pub const fn new() -> Self {
        Self {
            waiters: AtomicUsize::new(0),
            epoch: AtomicU64::new(0),
            _relax: PhantomData,
        }
    }

    /// Current epoch. Pass it to [`woken_since`](Self::woken_since) later.
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Whether `notify_all` ran since `epoch` was sampled.
    #[inline]
    pub fn woken_since(&self, epoch: u64) -> bool {
        self.epoch() != epoch
    }

    /// Number of blocked waiters.
    #[inline]
    pub fn waiters(&self) -> usize {
        self.waiters.load(Ordering::Acquire)
    }

    /// Blocks until `condition` holds.
    pub fn wait_until<F>(&self, condition: F)
    where
        F: FnMut() -> bool,
    {
        self.wait_until_timeout(condition, 0);
    }

    /// Blocks until `condition` holds or `max_relax` relax rounds elapsed.
    ///
    /// `max_relax == 0` waits forever. Returns `true` if the condition held.
    pub fn wait_until_timeout<F>(&self, mut condition: F, max_relax: usize) -> bool
    where
        F: FnMut() -> bool,
    {
        if condition() {
            return true;
        }

        self.waiters.fetch_add(1, Ordering::AcqRel);
        let mut rounds = 0;

        let satisfied = loop {
            if condition() {
                break true;
            }
            if max_relax > 0 && rounds >= max_relax {
                break false;
            }
            R::relax();
            rounds += 1;
        };

        self.waiters.fetch_sub(1, Ordering::AcqRel);
        satisfied
    }

    /// Wakes every waiter.
    #[inline]
    pub fn notify_all(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }
}

impl<R: RelaxStrategy> Default for WaitQueue<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RelaxStrategy> core::fmt::Debug for WaitQueue<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WaitQueue")
            .field("waiters", &self.waiters())
            .field("epoch", &self.epoch())
            .finish()
    }
}
