//! Request/response sessions with a WAKE device.

use embedded_io::Write;
use fugit::MillisDurationU64;
use log::{debug, error};

use crate::{
    LOG_TARGET,
    decoder::{DecoderStats, FrameDecoder},
    error::{Error, Result},
    frame::{Frame, HexDump, Payload},
    status::split_status,
    transport::{Clock, Millis, Transport},
};

/// Bytes requested from the transport per poll.
const READ_CHUNK: usize = 32;

/// Settings for a [`Wake`] session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeConfig {
    /// How long to wait for a valid response frame.
    pub timeout: Millis,
    /// Pause between polls when the transport had nothing to read.
    pub poll_interval: Millis,
    /// Log target for everything this session logs.
    pub log_target: &'static str,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            timeout: Millis::millis(5_000),
            poll_interval: Millis::millis(10),
            log_target: LOG_TARGET,
        }
    }
}

impl WakeConfig {
    pub fn with_timeout(mut self, timeout: Millis) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Millis) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_log_target(mut self, log_target: &'static str) -> Self {
        self.log_target = log_target;
        self
    }
}

/// A WAKE session over any [`Transport`].
///
/// Every call writes one frame and then waits for one response frame, so only a
/// single request is ever in flight. `N` sizes the decoder's raw byte buffer.
pub struct Wake<T: Transport, C: Clock, const N: usize = 64> {
    transport: T,
    clock: C,
    config: WakeConfig,
    decoder: FrameDecoder<N>,
}

impl<T: Transport, C: Clock, const N: usize> Wake<T, C, N> {
    pub fn new(transport: T, clock: C, config: WakeConfig) -> Self {
        Self {
            transport,
            clock,
            config,
            decoder: FrameDecoder::new().with_log_target(config.log_target),
        }
    }

    pub fn config(&self) -> &WakeConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Counters of the response decoder over the lifetime of the session.
    pub fn decoder_stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    /// Give back the transport and clock.
    pub fn into_parts(self) -> (T, C) {
        (self.transport, self.clock)
    }

    /// Send a command and return the raw response payload, status byte included.
    pub fn send_command(&mut self, command: u8, address: u8, payload: &[u8]) -> Result<Payload, T::Error> {
        let frame = Frame::new(command, address, payload)?;
        Ok(self.exchange(&frame)?.into_payload())
    }

    /// Send a command whose response starts with a status byte.
    ///
    /// Returns the result bytes after the status. A non-zero status becomes
    /// [`Error::Device`]; it is not retried.
    pub fn command(&mut self, command: u8, address: u8, payload: &[u8]) -> Result<Payload, T::Error> {
        let response = self.send_command(command, address, payload)?;
        let result = split_status(&response)?;
        Payload::from_slice(result).map_err(|_| Error::InvalidResponse)
    }

    /// Write `frame` and wait for the response frame.
    pub fn exchange(&mut self, frame: &Frame) -> Result<Frame, T::Error> {
        let wire = frame.encode();
        debug!(target: self.config.log_target, "Sending packet: {}", HexDump(&wire));

        self.transport.reset_buffers().map_err(Error::Serial)?;
        self.transport.write_all(&wire).map_err(Error::Serial)?;
        self.transport.flush().map_err(Error::Serial)?;

        self.read_response()
    }

    /// Poll the transport until a valid frame arrives or the timeout expires.
    pub fn read_response(&mut self) -> Result<Frame, T::Error> {
        let timeout = MillisDurationU64::millis(self.config.timeout.to_millis() as u64);
        let deadline = self.clock.now() + timeout;
        self.decoder.reset();
        debug!(target: self.config.log_target, "Reading response ...");

        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let read = self
                .transport
                .read_available(&mut chunk)
                .map_err(Error::Serial)?;

            if let Some(frame) = self.decoder.feed(&chunk[..read]) {
                debug!(
                    target: self.config.log_target,
                    "Decoded packet: command 0x{:02X}, data {}",
                    frame.command(),
                    HexDump(frame.payload())
                );
                return Ok(frame);
            }

            if self.clock.now() >= deadline {
                error!(target: self.config.log_target, "Read timeout");
                return Err(Error::Timeout);
            }

            if read == 0 {
                self.clock.delay(self.config.poll_interval);
            }
        }
    }
}
