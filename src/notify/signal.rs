//! Per-line asynchronous notification to an external recipient.

use crate::error::{LineError, LineResult};
use crate::hal::{LineId, Notifier, Pid};

use super::{Binding, NotificationChannel};

/// Delivers one queued notification per interrupt to the line's recipient.
///
/// The notification payload is the line id. Delivery is fire-and-forget: the
/// channel keeps no backlog beyond what the [`Notifier`] queues itself.
pub struct SignalChannel<N> {
    notifier: N,
}

impl<N: Notifier> SignalChannel<N> {
    /// Creates a channel on top of a platform notifier.
    pub const fn new(notifier: N) -> Self {
        Self { notifier }
    }

    /// Gets a reference to the platform notifier.
    #[inline]
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    fn send(&self, pid: Pid, line: LineId) -> LineResult {
        let Some(recipient) = self.notifier.locate(pid) else {
            return Err(LineError::DeviceUnavailable);
        };
        self.notifier.deliver(&recipient, line.raw());
        Ok(())
    }
}

impl<N: Notifier> NotificationChannel for SignalChannel<N> {
    fn binding(&self, raw: u32) -> LineResult<Option<Binding>> {
        if raw == 0 {
            return Ok(None);
        }
        // Process ids are positive `i32`s; anything larger names no process.
        match i32::try_from(raw) {
            Ok(pid) => Ok(Some(Binding::Recipient(Pid(pid)))),
            Err(_) => {
                warn!("recipient {} is not a valid process id", raw);
                Err(LineError::DeviceUnavailable)
            }
        }
    }

    fn notify(&self, line: LineId, binding: Binding) -> LineResult {
        match binding {
            Binding::Recipient(pid) => self.send(pid, line),
            Binding::PollMask(_) => Err(LineError::DeviceUnavailable),
        }
    }
}
