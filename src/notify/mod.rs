//! Notification channels fed by the interrupt bridge.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  handle(irq)   ┌──────────────────┐
//! │ Interrupt ctrl   │ ─────────────> │ InterruptBridge  │
//! └──────────────────┘                └────────┬─────────┘
//!                                              │ lookup(irq) -> (line, binding)
//!                                              ▼
//!                                     ┌──────────────────┐
//!                                     │ NotificationChannel
//!                                     │  - CoalescingPollChannel: shared pending mask
//!                                     │  - SignalChannel: per-line recipient
//!                                     └──────────────────┘
//! ```
//!
//! A deployment picks exactly one channel type; the binding carried by the
//! `i` command is interpreted by that channel.

mod poll;
mod signal;

pub use poll::CoalescingPollChannel;
pub use signal::SignalChannel;

use crate::error::LineResult;
use crate::hal::{LineId, Pid};

/// What an armed line is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Bits this line contributes to the shared pending set.
    PollMask(u32),
    /// Process that receives a notification per interrupt.
    Recipient(Pid),
}

/// Strategy that turns an interrupt on a line into a notification.
///
/// `notify`, `on_arm` and `on_disarm` may race with each other and with
/// consumers; implementations use atomics only.
pub trait NotificationChannel: Send + Sync {
    /// Interprets the raw binding field of a create command.
    ///
    /// Zero means "no interrupt requested" for every channel. A value the
    /// channel can never deliver to is an error, and the line is not touched.
    fn binding(&self, raw: u32) -> LineResult<Option<Binding>>;

    /// Dispatches one interrupt for `line`. Called from interrupt context.
    fn notify(&self, line: LineId, binding: Binding) -> LineResult;

    /// A line bound to this channel has been armed. Runs after the interrupt
    /// controller accepted the handler, so a failed arm never reaches here.
    fn on_arm(&self, _line: LineId, _binding: Binding) {}

    /// A line bound to this channel has been disarmed and will never fire again.
    fn on_disarm(&self, _line: LineId, _binding: Binding) {}
}

/// Channels whose consumers wait in-process for pending events.
pub trait PendingEvents {
    /// Blocks until an event is pending (or a line is freed) and consumes it
    /// according to the channel's coalescing rule.
    fn poll(&self) -> u32;

    /// Like [`poll`](Self::poll) but gives up after `max_relax` relax rounds.
    fn poll_timeout(&self, max_relax: usize) -> Option<u32>;
}
