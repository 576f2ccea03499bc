//! Interrupt handler that forwards armed interrupts to the notification channel.

use crate::hal::{IrqHandler, IrqNum, IrqReturn};
use crate::notify::NotificationChannel;

use super::InterruptRegistry;

/// The handler installed for every armed line.
///
/// Owns the routing registry and the deployment's notification channel. The
/// interrupt path only reads atomics: a registry lookup followed by a channel
/// dispatch.
pub struct InterruptBridge<C> {
    registry: InterruptRegistry,
    channel: C,
}

impl<C: NotificationChannel> InterruptBridge<C> {
    /// Creates a bridge with an empty registry.
    pub const fn new(channel: C) -> Self {
        Self {
            registry: InterruptRegistry::new(),
            channel,
        }
    }

    /// Gets a reference to the routing registry.
    #[inline]
    pub fn registry(&self) -> &InterruptRegistry {
        &self.registry
    }

    /// Gets a reference to the notification channel.
    #[inline]
    pub fn channel(&self) -> &C {
        &self.channel
    }
}

impl<C: NotificationChannel> IrqHandler for InterruptBridge<C> {
    fn handle(&self, irq: IrqNum) -> IrqReturn {
        trace!("IRQ {} received", irq.0);

        // Entries are removed only after disarm, so a live handler always
        // finds its entry. A miss means a foreign or spurious interrupt.
        let Some(entry) = self.registry.lookup(irq) else {
            warn!("IRQ {} has no routing entry", irq.0);
            return IrqReturn::NotHandled;
        };

        match self.channel.notify(entry.line, entry.binding) {
            Ok(()) => IrqReturn::Handled,
            Err(err) => {
                warn!("IRQ {} for {:?} not delivered: {}", irq.0, entry.line, err);
                IrqReturn::NotHandled
            }
        }
    }
}
