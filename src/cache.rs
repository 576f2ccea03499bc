//! Read-side state of a control channel.
//!
//! A control channel is used as "write a command, then read the result". The
//! value produced by the last command lives here until the next read.

use core::fmt::Write;
use core::sync::atomic::{AtomicU32, Ordering};

use arrayvec::ArrayString;

use crate::error::{LineError, LineResult};

/// Largest message a control channel reads or writes in one transfer.
pub const MESSAGE_CAPACITY: usize = 256;

/// Fixed-capacity text buffer for read results.
pub type Message = ArrayString<MESSAGE_CAPACITY>;

/// Last value queried (or set) through the control channel.
#[derive(Debug, Default)]
pub struct ValueCache {
    value: AtomicU32,
}

impl ValueCache {
    /// Creates a cache holding zero.
    pub const fn new() -> Self {
        Self {
            value: AtomicU32::new(0),
        }
    }

    /// Replaces the cached value.
    #[inline]
    pub fn store(&self, value: u32) {
        self.value.store(value, Ordering::Release);
    }

    /// Current cached value.
    #[inline]
    pub fn load(&self) -> u32 {
        self.value.load(Ordering::Acquire)
    }

    /// Renders the cached value as decimal text.
    pub fn render(&self) -> Message {
        let mut message = Message::new();
        // A u32 always fits.
        let _ = write!(message, "{}", self.load());
        message
    }
}

/// Copies the unread part of `message` into `buf`, advancing `offset`.
///
/// Returns 0 once the whole message has been read, so a reader loop sees end
/// of file after one result. A destination too small for the remainder is a
/// `TransferFault`, and nothing is copied.
pub fn copy_out(message: &str, buf: &mut [u8], offset: &mut usize) -> LineResult<usize> {
    let bytes = message.as_bytes();
    if *offset >= bytes.len() {
        return Ok(0);
    }

    let remaining = &bytes[*offset..];
    let dst = buf
        .get_mut(..remaining.len())
        .ok_or(LineError::TransferFault)?;
    dst.copy_from_slice(remaining);

    *offset += remaining.len();
    Ok(remaining.len())
}
