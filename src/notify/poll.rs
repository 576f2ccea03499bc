//! Coalescing poll channel.
//!
//! Interrupts OR their line's mask into a shared pending set and wake every
//! blocked poller. A poller consumes events with a countdown over the number
//! of armed lines:
//!
//! - each poll decrements the countdown and returns the pending set;
//! - when the countdown would reach zero, the bits of the most recent event
//!   are cleared from the pending set and the countdown restarts at the
//!   number of armed lines.
//!
//! A consumer that polls less often than interrupts fire still observes every
//! line, while a line that keeps firing does not force a full drain per edge.

use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use spin::relax::{RelaxStrategy, Spin};

use crate::error::{LineError, LineResult};
use crate::hal::LineId;
use crate::wait::WaitQueue;

use super::{Binding, NotificationChannel, PendingEvents};

/// Armed-line count and poll countdown, updated together so the countdown
/// never exceeds the count.
///
/// Layout: `[armed(32) | countdown(32)]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Counters {
    armed: u32,
    countdown: u32,
}

impl Counters {
    const fn pack(self) -> u64 {
        ((self.armed as u64) << 32) | self.countdown as u64
    }

    const fn unpack(raw: u64) -> Self {
        Self {
            armed: (raw >> 32) as u32,
            countdown: raw as u32,
        }
    }
}

/// Shared pending-event set with coalescing consumption.
pub struct CoalescingPollChannel<R: RelaxStrategy = Spin> {
    /// Lines with an undelivered event.
    pending: AtomicU32,
    /// Mask of the most recent event.
    last: AtomicU32,
    /// Packed [`Counters`]: armed lines and polls left before the last event
    /// is consumed. The countdown is always in `0..=armed`.
    counters: AtomicU64,
    waiters: WaitQueue<R>,
}

impl<R: RelaxStrategy> CoalescingPollChannel<R> {
    /// Creates a channel with no armed lines.
    pub const fn new() -> Self {
        Self {
            pending: AtomicU32::new(0),
            last: AtomicU32::new(0),
            counters: AtomicU64::new(0),
            waiters: WaitQueue::new(),
        }
    }

    /// Current pending set, without consuming anything.
    #[inline]
    pub fn peek(&self) -> u32 {
        self.pending.load(Ordering::Acquire)
    }

    fn counters(&self) -> Counters {
        Counters::unpack(self.counters.load(Ordering::Acquire))
    }

    /// Applies `f` to the counters atomically, returning the old and new values.
    fn update_counters(&self, f: impl Fn(Counters) -> Counters) -> (Counters, Counters) {
        let (Ok(raw) | Err(raw)) =
            self.counters
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                    Some(f(Counters::unpack(raw)).pack())
                });
        let old = Counters::unpack(raw);
        (old, f(old))
    }

    /// Number of armed lines.
    #[inline]
    pub fn armed(&self) -> usize {
        self.counters().armed as usize
    }

    /// Remaining polls before the next coalescing clear.
    #[inline]
    pub fn countdown(&self) -> usize {
        self.counters().countdown as usize
    }

    /// Consistent `(armed, countdown)` pair.
    #[inline]
    pub fn snapshot(&self) -> (usize, usize) {
        let counters = self.counters();
        (counters.armed as usize, counters.countdown as usize)
    }

    /// Number of pollers currently blocked.
    #[inline]
    pub fn waiters(&self) -> usize {
        self.waiters.waiters()
    }

    /// Records an event for `mask` and wakes all pollers.
    pub fn signal(&self, mask: u32) {
        self.pending.fetch_or(mask, Ordering::AcqRel);
        self.last.store(mask, Ordering::Release);
        self.waiters.notify_all();
    }

    /// Applies the coalescing rule to the current pending set.
    ///
    /// Returns the pending set as it was before any clearing; zero if nothing
    /// is pending.
    pub fn consume(&self) -> u32 {
        let pending = self.pending.load(Ordering::Acquire);
        if pending == 0 {
            return 0;
        }

        let (old, new) = self.update_counters(|c| Counters {
            armed: c.armed,
            countdown: if c.countdown <= 1 { c.armed } else { c.countdown - 1 },
        });
        trace!("poll countdown {} -> {}", old.countdown, new.countdown);

        if old.countdown <= 1 {
            let last = self.last.load(Ordering::Acquire);
            self.pending.fetch_and(!last, Ordering::AcqRel)
        } else {
            self.pending.load(Ordering::Acquire)
        }
    }

    fn wait_and_consume(&self, max_relax: usize) -> Option<u32> {
        let epoch = self.waiters.epoch();
        let ready = self.waiters.wait_until_timeout(
            || self.peek() != 0 || self.waiters.woken_since(epoch),
            max_relax,
        );
        ready.then(|| self.consume())
    }
}

impl<R: RelaxStrategy> Default for CoalescingPollChannel<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RelaxStrategy> NotificationChannel for CoalescingPollChannel<R> {
    fn binding(&self, raw: u32) -> LineResult<Option<Binding>> {
        Ok((raw != 0).then_some(Binding::PollMask(raw)))
    }

    #[inline]
    fn notify(&self, _line: LineId, binding: Binding) -> LineResult {
        match binding {
            Binding::PollMask(mask) => {
                self.signal(mask);
                Ok(())
            }
            Binding::Recipient(_) => Err(LineError::DeviceUnavailable),
        }
    }

    fn on_arm(&self, line: LineId, _binding: Binding) {
        let (_, new) = self.update_counters(|c| {
            let armed = c.armed.saturating_add(1);
            Counters {
                armed,
                countdown: armed,
            }
        });
        debug!("{:?} armed for polling, {} armed lines", line, new.armed);
    }

    fn on_disarm(&self, line: LineId, binding: Binding) {
        let Binding::PollMask(mask) = binding else {
            return;
        };

        let (_, new) = self.update_counters(|c| {
            let armed = c.armed.saturating_sub(1);
            Counters {
                armed,
                countdown: c.countdown.min(armed),
            }
        });

        // The freed line can never fire again: retract its bits so no poller
        // keeps reporting or waiting on them.
        self.pending.fetch_and(!mask, Ordering::AcqRel);
        let _ = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| Some(last & !mask));
        self.waiters.notify_all();

        debug!("{:?} disarmed from polling, {} armed lines", line, new.armed);
    }
}

impl<R: RelaxStrategy> PendingEvents for CoalescingPollChannel<R> {
    fn poll(&self) -> u32 {
        self.wait_and_consume(0).unwrap_or(0)
    }

    fn poll_timeout(&self, max_relax: usize) -> Option<u32> {
        self.wait_and_consume(max_relax)
    }
}
