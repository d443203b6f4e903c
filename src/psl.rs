//! Commands understood by PSL programmable power supplies.
//!
//! For its methods, "get" reads back a configuration value or parameter and
//! "read" returns a measured value.

use core::fmt;

use heapless::String;
use log::debug;
use modular_bitfield::prelude::*;
use strum_macros::EnumIter;

use crate::{
    error::{Error, Result},
    frame::{MAX_PAYLOAD, Payload},
    session::Wake,
    transport::{Clock, Transport},
};

/// Serial settings the PSL firmware uses: 19200 baud, 8N1, no flow control.
pub const BAUD_RATE: u32 = 19_200;

/// Command codes.
#[derive(Debug, EnumIter, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum PslCommand {
    /// Send bytes back unchanged. No status byte.
    Echo = 2,
    /// Human readable device description. No status byte.
    Info = 3,
    /// Measured output voltage and current.
    GetVoltageCurrent = 7,
    /// Output and protection state flags.
    Status = 8,
    /// Read a numbered parameter.
    GetParam = 16,
}

impl From<PslCommand> for u8 {
    fn from(value: PslCommand) -> Self {
        value as u8
    }
}

impl PslCommand {
    /// Whether the response to this command starts with a status byte.
    pub fn has_status(self) -> bool {
        !matches!(self, PslCommand::Echo | PslCommand::Info)
    }
}

/// Parameter numbers for [`PslCommand::GetParam`].
#[derive(Debug, EnumIter, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum PslParameter {
    /// Firmware version, see [`FirmwareVersion`].
    FirmwareVersion = 21,
}

impl From<PslParameter> for u8 {
    fn from(value: PslParameter) -> Self {
        value as u8
    }
}

/// Output and protection flags returned by [`PslCommand::Status`].
#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PslStatus {
    /// Output enabled.
    pub output_on: bool,
    /// Regulating in constant voltage mode.
    pub constant_voltage: bool,
    /// Regulating in constant current mode.
    pub constant_current: bool,
    /// Over voltage protection tripped.
    pub over_voltage: bool,
    /// Over current protection tripped.
    pub over_current: bool,
    /// Over power protection tripped.
    pub over_power: bool,
    /// Over temperature protection tripped.
    pub over_temperature: bool,
    #[skip]
    __: B1,
}

/// Measured output values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Measurement {
    pub voltage_mv: u16,
    pub current_ma: u16,
}

/// Firmware version as stored by the device.
///
/// The first decimal digit is the major version, the remaining digits the minor
/// version: `123` -> `1.23`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion(pub u16);

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut scale = 1u16;
        let mut minor_digits = 0usize;
        while self.0 / scale >= 10 {
            scale *= 10;
            minor_digits += 1;
        }

        write!(f, "{}.", self.0 / scale)?;
        if minor_digits > 0 {
            write!(f, "{:0width$}", self.0 % scale, width = minor_digits)?;
        }
        Ok(())
    }
}

/// Room for a description of [`MAX_PAYLOAD`] Latin-1 characters in UTF-8.
pub const MAX_INFO_LEN: usize = 2 * MAX_PAYLOAD;

/// Device description, one Latin-1 character per byte.
pub type InfoString = String<MAX_INFO_LEN>;

/// Everything [`Psl::update`] reads in one go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PslState {
    pub info: InfoString,
    pub version: FirmwareVersion,
    pub status: PslStatus,
    pub measurement: Measurement,
}

/// A PSL power supply reachable through a [`Wake`] session.
///
/// `N` is the decoder buffer size of the session, see [`Wake`].
pub struct Psl<T: Transport, C: Clock, const N: usize = 64> {
    wake: Wake<T, C, N>,
    /// `0` talks to whichever device is on the line.
    address: u8,
}

impl<T: Transport, C: Clock, const N: usize> Psl<T, C, N> {
    /// Create a new Psl talking to the unaddressed device.
    pub fn new(wake: Wake<T, C, N>) -> Self {
        Self { wake, address: 0 }
    }

    /// Talk to the device with the given WAKE address instead.
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address & 0x7F;
        self
    }

    pub fn wake(&mut self) -> &mut Wake<T, C, N> {
        &mut self.wake
    }

    pub fn into_inner(self) -> Wake<T, C, N> {
        self.wake
    }

    /// Send a command, stripping the status byte for commands that carry one.
    pub fn command(&mut self, command: PslCommand, data: &[u8]) -> Result<Payload, T::Error> {
        if command.has_status() {
            self.wake.command(command.into(), self.address, data)
        } else {
            self.wake.send_command(command.into(), self.address, data)
        }
    }

    /// Return the device description, each byte decoded as Latin-1.
    pub fn get_info(&mut self) -> Result<InfoString, T::Error> {
        let response = self.command(PslCommand::Info, &[])?;
        let mut info = InfoString::new();
        for &byte in response.iter() {
            // At most two UTF-8 bytes per char, which MAX_INFO_LEN allows for.
            let _ = info.push(char::from(byte));
        }
        Ok(info)
    }

    /// Send `data` and return what the device echoes back.
    pub fn echo(&mut self, data: &[u8]) -> Result<Payload, T::Error> {
        self.command(PslCommand::Echo, data)
    }

    /// Read a 16 bit parameter.
    pub fn get_param(&mut self, param: impl Into<u8>) -> Result<u16, T::Error> {
        let response = self.command(PslCommand::GetParam, &[param.into()])?;
        let bytes: [u8; 2] = response
            .as_slice()
            .try_into()
            .map_err(|_| Error::InvalidResponse)?;
        Ok(u16::from_le_bytes(bytes))
    }

    /// Read the firmware version.
    pub fn get_firmware_version(&mut self) -> Result<FirmwareVersion, T::Error> {
        let raw = self.get_param(PslParameter::FirmwareVersion)?;
        Ok(FirmwareVersion(raw))
    }

    /// Return the measured output voltage and current.
    pub fn read_voltage_current(&mut self) -> Result<Measurement, T::Error> {
        let response = self.command(PslCommand::GetVoltageCurrent, &[])?;
        let [v0, v1, i0, i1] = <[u8; 4]>::try_from(response.as_slice())
            .map_err(|_| Error::InvalidResponse)?;
        Ok(Measurement {
            voltage_mv: u16::from_le_bytes([v0, v1]),
            current_ma: u16::from_le_bytes([i0, i1]),
        })
    }

    /// Return the output and protection flags.
    pub fn get_status(&mut self) -> Result<PslStatus, T::Error> {
        let response = self.command(PslCommand::Status, &[])?;
        let bytes: [u8; 1] = response
            .as_slice()
            .try_into()
            .map_err(|_| Error::InvalidResponse)?;
        Ok(PslStatus::from_bytes(bytes))
    }

    /// Read info, firmware version, status and measurements.
    pub fn update(&mut self) -> Result<PslState, T::Error> {
        let state = PslState {
            info: self.get_info()?,
            version: self.get_firmware_version()?,
            status: self.get_status()?,
            measurement: self.read_voltage_current()?,
        };
        debug!(target: self.wake.config().log_target, "Device state: {state:?}");
        Ok(state)
    }
}
