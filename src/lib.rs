#![no_std]

//! # Board I/O control channels
//!
//! This crate exposes the digital I/O lines (and, separately, the PWM chips)
//! of an embedded board through a file-like control channel: a client opens
//! the single session, writes one-line text commands and reads back the
//! result. It is designed for `no_std` kernels and uses the `alloc` crate for
//! the shared interrupt bridge.
//!
//! The platform is reached only through traits in [`hal`]; the crate never
//! touches hardware itself.
//!
//! ## Architecture
//!
//! ### Control path
//! - [`GpioDevice`]: session admission, command dispatch, read cache
//! - [`LineTable`]: fixed-size line arena and its configuration lock
//! - [`Line`]: per-line state machine (`Unconfigured`, `Exported`, `InterruptArmed`)
//!
//! ### Interrupt path
//! - [`InterruptRegistry`]: lock-free IRQ to line routing
//! - [`InterruptBridge`]: the handler installed on every armed IRQ
//! - [`CoalescingPollChannel`]: shared pending mask with edge coalescing
//! - [`SignalChannel`]: per-line asynchronous notification to a process
//!
//! ### PWM
//! - [`PwmDevice`]: the same session model for PWM chips, without interrupts
//!
//! ## Command grammar
//!
//! | Command | GPIO | PWM |
//! |---------|------|-----|
//! | `i id a b` | export line `id`, direction `a` (0 = input), `b` = binding or initial level | request and enable chip `id` |
//! | `r id` | refresh the read cache from line `id` | select chip `id` for reads |
//! | `w id a` / `w id a b` | drive output `id` to `a` | set duty cycle `a` and period `b` |
//! | `f id` | free line `id` | disable and free chip `id` |
//!
//! ## Examples
//!
//! ```rust,ignore
//! use bbio::{CoalescingPollChannel, GpioDevice, GpioDeviceConfig};
//!
//! let device = GpioDevice::new(
//!     GpioDeviceConfig::default(),
//!     board_lines,
//!     board_irqs,
//!     CoalescingPollChannel::new(),
//! );
//!
//! let session = device.open()?;
//! session.write(b"i 3 0 8")?;       // input line 3, contributes bit 3
//! let pending = session.poll();     // blocks until line 3 fires
//! session.write(b"f 3")?;
//! ```

extern crate alloc;
#[macro_use]
extern crate log;

mod cache;
mod command;
mod config;
mod device;
mod error;
pub mod hal;
mod irq;
mod line;
mod notify;
mod pwm;
mod session;
mod table;
mod wait;

pub use cache::{MESSAGE_CAPACITY, Message, ValueCache};
pub use command::{Command, Op};
pub use config::{GpioDeviceConfig, PwmDeviceConfig, PwmReadMode};
pub use device::{GpioDevice, Session};
pub use error::{HwError, HwResult, LineError, LineResult};
pub use irq::{InterruptBridge, InterruptRegistry, RegistryEntry};
pub use line::{Line, LineState};
pub use notify::{
    Binding, CoalescingPollChannel, NotificationChannel, PendingEvents, SignalChannel,
};
pub use pwm::{PwmChip, PwmDevice, PwmSession, PwmTable};
pub use session::SessionGate;
pub use table::LineTable;
pub use wait::WaitQueue;
