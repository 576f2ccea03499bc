//! Platform collaborators.
//!
//! The crate never programs hardware itself. The embedding kernel implements
//! these traits on top of its line controller, interrupt controller and
//! process table, and hands them to [`GpioDevice`](crate::GpioDevice) or
//! [`PwmDevice`](crate::PwmDevice).

use alloc::sync::Arc;
use core::fmt;

use crate::error::{HwResult, LineError, LineResult};

/// Number of line slots in the GPIO table.
pub const LINE_COUNT: usize = 65;

/// Number of interrupt numbers the registry can track.
pub const IRQ_COUNT: usize = 256;

/// Number of chip slots in the PWM table.
pub const PWM_CHIP_COUNT: usize = 8;

/// Stable index of a line in the fixed-size table.
///
/// A `LineId` can only be built through [`LineId::new`], so holding one
/// proves the id is in `0..LINE_COUNT`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineId(u8);

impl LineId {
    /// Validates a raw id against the table size.
    #[inline]
    pub fn new(raw: u32) -> LineResult<Self> {
        if (raw as usize) < LINE_COUNT {
            Ok(Self(raw as u8))
        } else {
            Err(LineError::InvalidIdentifier)
        }
    }

    /// Builds an id from a table index already known to be in range.
    #[inline]
    pub(crate) const fn from_index(index: usize) -> Self {
        debug_assert!(index < LINE_COUNT);
        Self(index as u8)
    }

    /// Index into the line table.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// The raw id as seen by the platform and by notification payloads.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Debug for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line({})", self.0)
    }
}

/// Hardware interrupt number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IrqNum(pub u32);

/// Identity of an external process that receives asynchronous notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub i32);

/// Line direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Input,
    Output,
}

impl Direction {
    /// Decodes the command field: zero is input, anything else output.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        if raw == 0 { Self::Input } else { Self::Output }
    }
}

/// Platform line controller.
///
/// Errors are opaque platform codes and are surfaced unchanged.
pub trait LineController: Send + Sync {
    /// Acquires exclusive ownership of a line.
    fn request(&self, line: LineId) -> HwResult;
    /// Releases a line acquired with [`request`](Self::request).
    fn free(&self, line: LineId);
    /// Sets the direction; `initial` is the level driven for outputs.
    fn set_direction(&self, line: LineId, direction: Direction, initial: u32) -> HwResult;
    /// Drives an output level.
    fn set_value(&self, line: LineId, value: u32);
    /// Samples the current level.
    fn get_value(&self, line: LineId) -> u32;
    /// Resolves the interrupt number wired to a line.
    fn to_irq(&self, line: LineId) -> HwResult<IrqNum>;
}

/// What an interrupt handler reports back to the interrupt controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqReturn {
    /// The interrupt was consumed.
    Handled,
    /// Nothing could be done with the interrupt.
    NotHandled,
}

/// Callback invoked from interrupt context.
///
/// Implementations must not block, must not allocate and must not take any
/// lock that the configuration path holds.
pub trait IrqHandler: Send + Sync {
    fn handle(&self, irq: IrqNum) -> IrqReturn;
}

/// Platform interrupt controller.
pub trait InterruptController: Send + Sync {
    /// Installs `handler` for `irq`. The handler may fire before this returns.
    fn arm(&self, irq: IrqNum, handler: Arc<dyn IrqHandler>) -> HwResult;
    /// Removes the handler for `irq`.
    ///
    /// Must not return while a handler invocation for `irq` is still running.
    fn disarm(&self, irq: IrqNum);
}

/// Out-of-band notification transport to external processes.
pub trait Notifier: Send + Sync {
    /// Resolved handle to a live recipient.
    type Recipient;

    /// Looks up a recipient by identity.
    fn locate(&self, pid: Pid) -> Option<Self::Recipient>;

    /// Queues a notification carrying `payload`. Fire-and-forget.
    fn deliver(&self, recipient: &Self::Recipient, payload: u32);
}

/// Platform PWM controller.
pub trait PwmController: Send + Sync {
    /// Acquires a PWM chip.
    fn request(&self, chip: usize) -> HwResult;
    /// Starts the output.
    fn enable(&self, chip: usize) -> HwResult;
    /// Applies a duty cycle and period, both in nanoseconds.
    fn config(&self, chip: usize, duty_cycle: u32, period: u32) -> HwResult;
    /// Stops the output.
    fn disable(&self, chip: usize);
    /// Releases a chip acquired with [`request`](Self::request).
    fn free(&self, chip: usize);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_id_bounds() {
        assert_eq!(LineId::new(0).unwrap().index(), 0);
        assert_eq!(LineId::new(64).unwrap().raw(), 64);
        assert_eq!(LineId::new(65), Err(LineError::InvalidIdentifier));
        assert_eq!(LineId::new(u32::MAX), Err(LineError::InvalidIdentifier));
    }

    #[test]
    fn test_direction_from_raw() {
        assert_eq!(Direction::from_raw(0), Direction::Input);
        assert_eq!(Direction::from_raw(1), Direction::Output);
        assert_eq!(Direction::from_raw(7), Direction::Output);
    }
}
