//! Status byte convention used by device responses.
//!
//! Most responses start with a status byte. Zero means success and the rest of the
//! payload is the result, anything else is an error reported by the device.

use core::fmt;

use strum_macros::EnumIter;
use thiserror::Error;

/// Status code in the first byte of a response.
#[derive(Debug, EnumIter, PartialEq, Eq, Clone, Copy)]
pub enum DeviceStatus {
    /// 0: Success.
    Ok,
    /// 1: Device transmit error.
    Transmit,
    /// 2: Device is busy.
    Busy,
    /// 3: Device is not ready.
    NotReady,
    /// 4: Error in parameters.
    Parameter,
    /// 5: No response.
    NoResponse,
    /// Any code not listed above.
    Other(u8),
}

impl From<u8> for DeviceStatus {
    fn from(value: u8) -> Self {
        use DeviceStatus as DS;
        match value {
            0x00 => DS::Ok,
            0x01 => DS::Transmit,
            0x02 => DS::Busy,
            0x03 => DS::NotReady,
            0x04 => DS::Parameter,
            0x05 => DS::NoResponse,
            other => DS::Other(other),
        }
    }
}

impl From<DeviceStatus> for u8 {
    fn from(value: DeviceStatus) -> Self {
        match value {
            DeviceStatus::Ok => 0x00,
            DeviceStatus::Transmit => 0x01,
            DeviceStatus::Busy => 0x02,
            DeviceStatus::NotReady => 0x03,
            DeviceStatus::Parameter => 0x04,
            DeviceStatus::NoResponse => 0x05,
            DeviceStatus::Other(code) => code,
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DeviceStatus::Ok => "ok",
            DeviceStatus::Transmit => "transmit error",
            DeviceStatus::Busy => "busy",
            DeviceStatus::NotReady => "not ready",
            DeviceStatus::Parameter => "parameter error",
            DeviceStatus::NoResponse => "no response",
            DeviceStatus::Other(_) => "unknown status",
        };
        write!(f, "{text} (0x{:02X})", u8::from(*self))
    }
}

/// Why a response did not carry a successful result.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusError {
    #[error("Response has no status byte")]
    Missing,
    #[error("Device reported an error: {0}")]
    Device(DeviceStatus),
}

impl<I: embedded_io::Error> From<StatusError> for crate::error::Error<I> {
    fn from(err: StatusError) -> Self {
        match err {
            StatusError::Missing => crate::error::Error::InvalidResponse,
            StatusError::Device(status) => crate::error::Error::Device(status),
        }
    }
}

/// Split a response into its status and result, failing on a non-zero status.
pub fn split_status(response: &[u8]) -> Result<&[u8], StatusError> {
    let (&code, result) = response.split_first().ok_or(StatusError::Missing)?;
    match DeviceStatus::from(code) {
        DeviceStatus::Ok => Ok(result),
        status => Err(StatusError::Device(status)),
    }
}
