//! Interrupt routing and the interrupt-context bridge.

mod bridge;
mod registry;

pub use bridge::InterruptBridge;
pub use registry::{InterruptRegistry, RegistryEntry};
