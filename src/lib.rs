//! This crate implements the WAKE serial protocol used to talk to PSL series programmable power supplies.
//!
//! It supports `no-std` environments by disabling the default `std` feature flag.
//!
//! A WAKE exchange is one request frame from the host followed by one response frame from the device:
//! * Frames start with a `FEND` (`0xC0`) delimiter, followed by an optional address, a command, a length, the payload
//!   and a CRC8.
//! * Everything after the delimiter is byte stuffed so `FEND` never appears inside a frame.
//! * Most responses start with a status byte, `0` meaning success.
//!
//! The protocol layer works over anything implementing [`transport::Transport`], which is built on the
//! [embedded_io] traits. With the `std` feature, [`serial::SerialTransport`] provides one backed by a host serial port.
//!
//! The serial port used for PSU comms should be configured like so:
//! * Default baud rate: 19200
//! * Data bits: 8
//! * Stop bits: 1
//! * Parity: None

#![cfg_attr(not(feature = "std"), no_std)]

pub mod crc;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod psl;
#[cfg(feature = "std")]
pub mod serial;
pub mod session;
pub mod status;
pub mod stuffing;
pub mod transport;

#[cfg(test)]
mod mock_serial;

#[cfg(all(test, not(feature = "std")))]
extern crate std;

/// Log target used unless a session is configured with another one.
pub const LOG_TARGET: &str = "psl_wake";

pub use decoder::FrameDecoder;
pub use error::{Error, Result};
pub use frame::{Frame, Payload};
pub use session::{Wake, WakeConfig};
pub use status::DeviceStatus;
