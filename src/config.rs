use crate::cache::MESSAGE_CAPACITY;
use crate::hal::PWM_CHIP_COUNT;

/// Configuration of a GPIO control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioDeviceConfig {
    /// Device node name, used in log messages.
    pub name: &'static str,
    /// Longest accepted command in bytes; longer writes fail with `TransferFault`.
    pub max_command_len: usize,
}

impl Default for GpioDeviceConfig {
    fn default() -> Self {
        Self {
            name: "bbgpio",
            max_command_len: MESSAGE_CAPACITY,
        }
    }
}

/// What a read on the PWM control channel returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PwmReadMode {
    /// `"<duty_cycle> <period>"` of the chip selected with `r`.
    #[default]
    Selected,
    /// One `"<id> <period> <duty_cycle>"` line per active chip.
    Snapshot,
}

/// Configuration of a PWM control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmDeviceConfig {
    /// Device node name, used in log messages.
    pub name: &'static str,
    /// Ids at or above this are rejected. Clamped to the table size.
    pub chip_limit: usize,
    pub read_mode: PwmReadMode,
    /// Longest accepted command in bytes.
    pub max_command_len: usize,
}

impl PwmDeviceConfig {
    /// The effective id bound.
    #[inline]
    pub fn chip_limit(&self) -> usize {
        self.chip_limit.min(PWM_CHIP_COUNT)
    }
}

impl Default for PwmDeviceConfig {
    fn default() -> Self {
        Self {
            name: "bbpwm",
            chip_limit: PWM_CHIP_COUNT,
            read_mode: PwmReadMode::Selected,
            max_command_len: MESSAGE_CAPACITY,
        }
    }
}
