//! [`Transport`] over a host serial port, using the `serialport` crate.

use std::{
    fmt,
    io::{self, Read, Write},
    thread,
    time::Duration,
};

use log::debug;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::{LOG_TARGET, psl::BAUD_RATE, transport::Transport};

/// Time the port is given to settle after opening and before closing.
pub const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// [`std::io::Error`] wrapped so it can be used as an [`embedded_io::Error`].
#[derive(Debug)]
pub struct IoError(pub io::Error);

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl From<io::Error> for IoError {
    fn from(err: io::Error) -> Self {
        Self(err)
    }
}

impl From<serialport::Error> for IoError {
    fn from(err: serialport::Error) -> Self {
        Self(err.into())
    }
}

impl embedded_io::Error for IoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        use embedded_io::ErrorKind as EK;
        match self.0.kind() {
            io::ErrorKind::NotFound => EK::NotFound,
            io::ErrorKind::PermissionDenied => EK::PermissionDenied,
            io::ErrorKind::NotConnected => EK::NotConnected,
            io::ErrorKind::BrokenPipe => EK::BrokenPipe,
            io::ErrorKind::InvalidInput => EK::InvalidInput,
            io::ErrorKind::InvalidData => EK::InvalidData,
            io::ErrorKind::TimedOut => EK::TimedOut,
            io::ErrorKind::Interrupted => EK::Interrupted,
            io::ErrorKind::Unsupported => EK::Unsupported,
            io::ErrorKind::OutOfMemory => EK::OutOfMemory,
            _ => EK::Other,
        }
    }
}

/// A serial port that can be opened and closed repeatedly.
///
/// Reads and writes fail with [`io::ErrorKind::NotConnected`] while closed.
#[derive(Default)]
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `port_name` as 8N1 without flow control.
    ///
    /// Does nothing if the port is already open. `timeout` applies to reads and
    /// writes.
    pub fn open(&mut self, port_name: &str, baud_rate: u32, timeout: Duration) -> Result<(), IoError> {
        if self.port.is_some() {
            return Ok(());
        }

        debug!(target: LOG_TARGET, "Initializing serial port '{port_name}'");
        let port = serialport::new(port_name, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()?;
        port.clear(ClearBuffer::All)?;
        thread::sleep(SETTLE_DELAY);

        debug!(target: LOG_TARGET, "Serial port '{port_name}' is ready.");
        self.port = Some(port);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// Close the port after letting pending output drain.
    pub fn close(&mut self) {
        if let Some(port) = self.port.take() {
            thread::sleep(SETTLE_DELAY);
            drop(port);
        }
    }

    /// Names of the serial ports on this system containing `name_filter`.
    ///
    /// With `try_open`, ports that cannot be opened right now are left out.
    pub fn list_ports(name_filter: &str, try_open: bool) -> Result<Vec<String>, IoError> {
        let ports = serialport::available_ports()?;
        Ok(ports
            .into_iter()
            .map(|p| p.port_name)
            .filter(|name| name.contains(name_filter))
            .filter(|name| !try_open || Self::can_open(name))
            .collect())
    }

    /// The first port whose name contains `name_filter`.
    pub fn find_port(name_filter: &str) -> Result<Option<String>, IoError> {
        Ok(Self::list_ports(name_filter, false)?.into_iter().next())
    }

    fn can_open(port_name: &str) -> bool {
        match serialport::new(port_name, BAUD_RATE).open() {
            Ok(_) => true,
            Err(err) => {
                debug!(target: LOG_TARGET, "Skipping port '{port_name}': {err}");
                false
            }
        }
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>, IoError> {
        self.port
            .as_mut()
            .ok_or_else(|| IoError(io::Error::from(io::ErrorKind::NotConnected)))
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.close();
    }
}

impl embedded_io::ErrorType for SerialTransport {
    type Error = IoError;
}

impl embedded_io::Read for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.port()?.read(buf).map_err(IoError)
    }
}

impl embedded_io::ReadReady for SerialTransport {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.port()?.bytes_to_read()? > 0)
    }
}

impl embedded_io::Write for SerialTransport {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.port()?.write(buf).map_err(IoError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.port()?.flush().map_err(IoError)
    }
}

impl Transport for SerialTransport {
    fn reset_buffers(&mut self) -> Result<(), Self::Error> {
        self.port()?.clear(ClearBuffer::All)?;
        Ok(())
    }
}
