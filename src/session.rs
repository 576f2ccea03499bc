//! Single-session admission control for a control channel.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::error::{LineError, LineResult};

/// Non-blocking exclusive gate.
///
/// At most one session is open at a time. A contended `try_open` fails
/// immediately with `ResourceBusy`; there is no queueing and no fairness.
#[derive(Default)]
pub struct SessionGate {
    open: AtomicBool,
}

impl SessionGate {
    /// Creates a closed gate.
    pub const fn new() -> Self {
        Self {
            open: AtomicBool::new(false),
        }
    }

    /// Attempts to open the single session.
    pub fn try_open(&self) -> LineResult {
        self.open
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| LineError::ResourceBusy)
    }

    /// Closes the session.
    ///
    /// Must be paired with exactly one successful [`try_open`](Self::try_open).
    pub fn close(&self) {
        let was_open = self.open.swap(false, Ordering::AcqRel);
        debug_assert!(was_open, "closing a session gate that is not open");
    }

    /// Whether a session currently holds the gate.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl core::fmt::Debug for SessionGate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionGate")
            .field("open", &self.is_open())
            .finish()
    }
}
