//! Our error types for the WAKE protocol.

use thiserror::Error;

use crate::{frame::FrameError, status::DeviceStatus};

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Everything that can go wrong during a WAKE exchange.
///
/// Framing and CRC problems on the receive side never show up here: the decoder
/// resynchronizes and keeps waiting until the deadline, which then reports
/// [`Error::Timeout`].
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    #[error("Serial communication error: {0:?}")]
    Serial(I),
    #[error("No valid response before the deadline")]
    Timeout,
    #[error("Device reported an error: {0}")]
    Device(DeviceStatus),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("Invalid response received")]
    InvalidResponse,
}

impl<I: embedded_io::Error> Error<I> {
    /// The device status code, if the device reported an error.
    pub fn device_status(&self) -> Option<DeviceStatus> {
        match self {
            Error::Device(status) => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }
}
