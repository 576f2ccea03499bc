//! Interrupt number to line routing.
//!
//! Each slot is a single `AtomicU64`, so the interrupt path can look an entry
//! up without taking a lock. Only the configuration path inserts or removes
//! entries, and it removes an entry only after the interrupt controller has
//! disarmed the number.
//!
//! Slot layout: `[valid(1) | kind(1) | unused(22) | line(8) | payload(32)]`

use core::sync::atomic::{AtomicU64, Ordering};

use crate::error::{HwError, LineResult};
use crate::hal::{IRQ_COUNT, IrqNum, LineId, Pid};
use crate::notify::Binding;

const VALID: u64 = 1 << 63;
const KIND_RECIPIENT: u64 = 1 << 62;
const LINE_SHIFT: u32 = 32;
const LINE_MASK: u64 = 0xff;
const PAYLOAD_MASK: u64 = 0xffff_ffff;

/// Routing entry for one armed interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryEntry {
    pub line: LineId,
    pub binding: Binding,
}

impl RegistryEntry {
    fn pack(self) -> u64 {
        let (kind, payload) = match self.binding {
            Binding::PollMask(mask) => (0, mask as u64),
            Binding::Recipient(Pid(pid)) => (KIND_RECIPIENT, pid as u32 as u64),
        };
        VALID | kind | ((self.line.raw() as u64) << LINE_SHIFT) | payload
    }

    fn unpack(raw: u64) -> Option<Self> {
        if raw & VALID == 0 {
            return None;
        }
        let line = LineId::new(((raw >> LINE_SHIFT) & LINE_MASK) as u32).ok()?;
        let payload = (raw & PAYLOAD_MASK) as u32;
        let binding = if raw & KIND_RECIPIENT != 0 {
            Binding::Recipient(Pid(payload as i32))
        } else {
            Binding::PollMask(payload)
        };
        Some(Self { line, binding })
    }
}

/// Fixed-size arena of routing entries indexed by interrupt number.
pub struct InterruptRegistry {
    slots: [AtomicU64; IRQ_COUNT],
}

impl InterruptRegistry {
    /// Creates a registry with no armed interrupts.
    pub const fn new() -> Self {
        Self {
            slots: [const { AtomicU64::new(0) }; IRQ_COUNT],
        }
    }

    fn slot(&self, irq: IrqNum) -> Option<&AtomicU64> {
        self.slots.get(irq.0 as usize)
    }

    /// Routes `irq` to `line`.
    ///
    /// # Errors
    ///
    /// `HardwareConfigFailure(INVALID)` if the number is outside the registry,
    /// `HardwareConfigFailure(BUSY)` if another line already owns it.
    pub fn insert(&self, irq: IrqNum, line: LineId, binding: Binding) -> LineResult {
        let slot = self.slot(irq).ok_or(HwError::INVALID)?;
        let entry = RegistryEntry { line, binding }.pack();

        slot.compare_exchange(0, entry, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| HwError::BUSY)?;

        debug!("IRQ {} routed to {:?} ({:?})", irq.0, line, binding);
        Ok(())
    }

    /// Removes the entry for `irq`, returning it if one existed.
    pub fn remove(&self, irq: IrqNum) -> Option<RegistryEntry> {
        let old = self.slot(irq)?.swap(0, Ordering::AcqRel);
        let entry = RegistryEntry::unpack(old);
        if let Some(entry) = entry {
            debug!("IRQ {} unrouted from {:?}", irq.0, entry.line);
        }
        entry
    }

    /// Lock-free lookup, safe from interrupt context.
    #[inline]
    pub fn lookup(&self, irq: IrqNum) -> Option<RegistryEntry> {
        RegistryEntry::unpack(self.slot(irq)?.load(Ordering::Acquire))
    }

    /// Interrupt number currently routed to `line`, if any.
    pub fn irq_of(&self, line: LineId) -> Option<IrqNum> {
        self.iter()
            .find(|(_, entry)| entry.line == line)
            .map(|(irq, _)| irq)
    }

    /// Iterates over all armed entries.
    pub fn iter(&self) -> impl Iterator<Item = (IrqNum, RegistryEntry)> + '_ {
        self.slots.iter().enumerate().filter_map(|(irq, slot)| {
            RegistryEntry::unpack(slot.load(Ordering::Acquire))
                .map(|entry| (IrqNum(irq as u32), entry))
        })
    }

    /// Number of armed entries.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Whether no interrupt is routed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InterruptRegistry {
    fn default() -> Self {
        Self::new()
    }
}
