//! Error taxonomy for the control channel and the line table.

use core::fmt;

use axerrno::AxError;

/// Opaque error code reported by a platform controller.
///
/// The value is carried through unchanged so that the control channel can
/// report exactly what the line or interrupt controller returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HwError(pub i32);

impl HwError {
    /// The resource is already owned by someone else.
    pub const BUSY: Self = Self(-16);
    /// The platform has no such line or interrupt.
    pub const NO_DEVICE: Self = Self(-19);
    /// The argument is outside what the platform accepts.
    pub const INVALID: Self = Self(-22);

    /// Returns the raw platform code.
    #[inline]
    pub const fn code(self) -> i32 {
        self.0
    }
}

/// Result of a platform controller call.
pub type HwResult<T = ()> = Result<T, HwError>;

/// Errors surfaced by line, session and command operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineError {
    /// The id is outside the fixed line (or chip) table.
    InvalidIdentifier,
    /// Another session already holds the control channel.
    ResourceBusy,
    /// The notification recipient or hardware line could not be found.
    DeviceUnavailable,
    /// Command or result bytes could not be transferred.
    TransferFault,
    /// Acquiring or configuring a line or interrupt failed on the platform.
    HardwareConfigFailure(HwError),
}

/// Result type used throughout the crate.
pub type LineResult<T = ()> = Result<T, LineError>;

impl LineError {
    const EFAULT: i32 = 14;
    const EBUSY: i32 = 16;
    const ENODEV: i32 = 19;
    const EINVAL: i32 = 22;

    /// Negative errno-style code as returned to a control channel caller.
    pub const fn errno(self) -> i32 {
        match self {
            Self::InvalidIdentifier => -Self::EINVAL,
            Self::ResourceBusy => -Self::EBUSY,
            Self::DeviceUnavailable => -Self::ENODEV,
            Self::TransferFault => -Self::EFAULT,
            Self::HardwareConfigFailure(hw) => hw.code(),
        }
    }
}

impl From<HwError> for LineError {
    fn from(err: HwError) -> Self {
        Self::HardwareConfigFailure(err)
    }
}

impl From<LineError> for AxError {
    fn from(err: LineError) -> Self {
        match err {
            LineError::InvalidIdentifier => AxError::InvalidInput,
            LineError::ResourceBusy => AxError::ResourceBusy,
            LineError::DeviceUnavailable => AxError::NotFound,
            LineError::TransferFault => AxError::BadAddress,
            LineError::HardwareConfigFailure(_) => AxError::Io,
        }
    }
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidIdentifier => f.write_str("invalid line identifier"),
            Self::ResourceBusy => f.write_str("device in use by another session"),
            Self::DeviceUnavailable => f.write_str("device or recipient unavailable"),
            Self::TransferFault => f.write_str("control channel transfer failed"),
            Self::HardwareConfigFailure(hw) => {
                write!(f, "hardware configuration failed ({})", hw.code())
            }
        }
    }
}
