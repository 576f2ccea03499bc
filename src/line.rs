//! Per-line record and its state machine.
//!
//! # State Transitions
//!
//! ```text
//! ┌──────────────┐  configure()   ┌──────────┐  arm (input + binding)  ┌────────────────┐
//! │ Unconfigured │ ─────────────> │ Exported │ ──────────────────────> │ InterruptArmed │
//! └──────────────┘                └──────────┘                         └────────────────┘
//!        ^                             │                                       │
//!        └─────────── free() ──────────┴──────── free() (disarm first) ────────┘
//! ```
//!
//! Arming is part of `configure` and disarming is part of `free`; neither is
//! reachable on its own.

use crate::hal::{Direction, IrqNum, LineId};
use crate::notify::Binding;

/// Lifecycle state of a line, derived from its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    /// No hardware resources held. The only state a create command acts on.
    Unconfigured,
    /// Hardware line requested and configured.
    Exported,
    /// Exported, with its interrupt routed to the notification channel.
    InterruptArmed,
}

/// One slot of the line table.
///
/// Invariant: `irq.is_some()` implies `exported`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line {
    pub id: LineId,
    pub direction: Direction,
    /// Last level set on an output (or the initial level).
    pub value: u32,
    pub exported: bool,
    pub irq: Option<IrqNum>,
    pub binding: Option<Binding>,
}

impl Line {
    /// A fresh, unconfigured line.
    pub const fn new(id: LineId) -> Self {
        Self {
            id,
            direction: Direction::Input,
            value: 0,
            exported: false,
            irq: None,
            binding: None,
        }
    }

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> LineState {
        match (self.exported, self.irq) {
            (false, _) => LineState::Unconfigured,
            (true, None) => LineState::Exported,
            (true, Some(_)) => LineState::InterruptArmed,
        }
    }

    /// Whether the line holds hardware resources.
    #[inline]
    pub fn is_exported(&self) -> bool {
        self.exported
    }

    /// Whether the line's interrupt is routed.
    #[inline]
    pub fn is_armed(&self) -> bool {
        self.irq.is_some()
    }

    /// Marks the line configured.
    pub(crate) fn export(
        &mut self,
        direction: Direction,
        value: u32,
        armed: Option<(IrqNum, Binding)>,
    ) {
        self.direction = direction;
        self.value = value;
        self.exported = true;
        self.irq = armed.map(|(irq, _)| irq);
        self.binding = armed.map(|(_, binding)| binding);
    }

    /// Returns the line to `Unconfigured`, keeping only its id.
    pub(crate) fn reset(&mut self) {
        *self = Self::new(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::Pid;

    #[test]
    fn test_line_initial_state() {
        let line = Line::new(LineId::new(4).unwrap());
        assert_eq!(line.state(), LineState::Unconfigured);
        assert!(!line.is_exported());
        assert!(!line.is_armed());
    }

    #[test]
    fn test_line_state_transitions() {
        let mut line = Line::new(LineId::new(4).unwrap());

        line.export(Direction::Output, 1, None);
        assert_eq!(line.state(), LineState::Exported);
        assert_eq!(line.value, 1);

        line.reset();
        line.export(
            Direction::Input,
            0,
            Some((IrqNum(60), Binding::Recipient(Pid(10)))),
        );
        assert_eq!(line.state(), LineState::InterruptArmed);
        assert_eq!(line.irq, Some(IrqNum(60)));

        line.reset();
        assert_eq!(line, Line::new(LineId::new(4).unwrap()));
    }
}
