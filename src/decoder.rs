//! Streaming decoder for WAKE frames.
//!
//! Bytes from the transport arrive in chunks of any size. They are queued in a
//! bounded buffer and the state machine consumes them as far as it can, waiting
//! for more input whenever a state cannot complete. Corrupt frames are dropped
//! and the decoder resynchronizes on the next `FEND`.

use heapless::Deque;
use log::{debug, warn};

use crate::{
    LOG_TARGET,
    crc::Crc8,
    frame::{ADDRESS_FLAG, Frame, HexDump, Payload},
    stuffing::{self, FEND, Unstuffed},
};

/// Where the decoder is within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecoderState {
    /// Discarding input until a `FEND` shows up.
    #[default]
    SeekDelimiter,
    /// Expecting the optional address byte, then the command.
    Command,
    /// Expecting the payload length.
    Length,
    /// Collecting payload bytes.
    Data,
    /// Expecting the checksum.
    Crc,
}

/// Counters describing what the decoder has seen since it was created.
///
/// Counters wrap around at `u32::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecoderStats {
    /// Frames that passed the CRC check.
    pub frames: u32,
    /// Frames dropped because of a CRC mismatch.
    pub crc_errors: u32,
    /// Frames dropped because an escape marker was followed by an invalid byte.
    pub malformed_escapes: u32,
    /// Frames abandoned because a new `FEND` arrived before they were complete.
    pub restarts: u32,
}

/// Frame collected so far.
#[derive(Debug, Default)]
struct Partial {
    address: Option<u8>,
    command: u8,
    length: u8,
    payload: Payload,
}

impl Partial {
    fn expected_crc(&self) -> u8 {
        let mut crc = Crc8::new();
        crc.update_byte(FEND);
        if let Some(address) = self.address {
            crc.update_byte(address | ADDRESS_FLAG);
        }
        crc.update_byte(self.command);
        crc.update_byte(self.length);
        crc.update(&self.payload);
        crc.finish()
    }
}

enum Step {
    /// Not enough buffered input.
    Wait,
    Next(DecoderState),
    Done(Frame),
}

/// Incremental WAKE frame decoder.
///
/// `N` is the capacity of the raw byte buffer. Input is consumed as it is pushed,
/// so the buffer only has to hold one transport chunk; it must be at least 2 so an
/// escape sequence fits.
#[derive(Debug)]
pub struct FrameDecoder<const N: usize = 64> {
    buffer: Deque<u8, N>,
    state: DecoderState,
    partial: Partial,
    stats: DecoderStats,
    log_target: &'static str,
}

impl<const N: usize> Default for FrameDecoder<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> FrameDecoder<N> {
    pub fn new() -> Self {
        const { assert!(N >= 2, "decoder buffer must hold an escape sequence") };
        Self {
            buffer: Deque::new(),
            state: DecoderState::SeekDelimiter,
            partial: Partial::default(),
            stats: DecoderStats::default(),
            log_target: LOG_TARGET,
        }
    }

    /// Log under `target` instead of the crate default.
    pub fn with_log_target(mut self, target: &'static str) -> Self {
        self.log_target = target;
        self
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Number of raw bytes waiting to be interpreted.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any buffered input and partial frame.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.enter(DecoderState::SeekDelimiter);
    }

    /// Push raw transport bytes and return the first frame they complete.
    ///
    /// Anything in `bytes` after the end of a completed frame is discarded.
    pub fn feed(&mut self, mut bytes: &[u8]) -> Option<Frame> {
        loop {
            while let Some((&byte, rest)) = bytes.split_first() {
                if self.buffer.push_back(byte).is_err() {
                    break;
                }
                bytes = rest;
            }

            if let Some(frame) = self.advance() {
                self.buffer.clear();
                return Some(frame);
            }
            if bytes.is_empty() {
                return None;
            }
        }
    }

    /// Run state transitions until one of them has to wait for input.
    fn advance(&mut self) -> Option<Frame> {
        loop {
            let step = match self.state {
                DecoderState::SeekDelimiter => self.seek_delimiter(),
                DecoderState::Command => self.read_command(),
                DecoderState::Length => self.read_length(),
                DecoderState::Data => self.read_data(),
                DecoderState::Crc => self.read_crc(),
            };

            match step {
                Step::Wait => return None,
                Step::Next(state) => self.enter(state),
                Step::Done(frame) => {
                    self.stats.frames = self.stats.frames.wrapping_add(1);
                    self.enter(DecoderState::SeekDelimiter);
                    return Some(frame);
                }
            }
        }
    }

    fn enter(&mut self, state: DecoderState) {
        if matches!(state, DecoderState::SeekDelimiter | DecoderState::Command) {
            self.partial = Partial::default();
        }
        self.state = state;
    }

    fn seek_delimiter(&mut self) -> Step {
        while let Some(byte) = self.buffer.pop_front() {
            if byte == FEND {
                debug!(target: self.log_target, "... start of frame found, decoding");
                return Step::Next(DecoderState::Command);
            }
        }
        Step::Wait
    }

    fn read_command(&mut self) -> Step {
        loop {
            let byte = match self.next_byte() {
                Ok(byte) => byte,
                Err(step) => return step,
            };

            if byte & ADDRESS_FLAG == 0 {
                debug!(target: self.log_target, "... command: 0x{byte:02X}");
                self.partial.command = byte;
                return Step::Next(DecoderState::Length);
            }
            if self.partial.address.is_some() {
                warn!(target: self.log_target, "Second address byte 0x{byte:02X}, resynchronizing");
                return Step::Next(DecoderState::SeekDelimiter);
            }
            debug!(target: self.log_target, "... address: 0x{:02X}", byte & !ADDRESS_FLAG);
            self.partial.address = Some(byte & !ADDRESS_FLAG);
        }
    }

    fn read_length(&mut self) -> Step {
        match self.next_byte() {
            Ok(length) => {
                debug!(target: self.log_target, "... data length: {length}");
                self.partial.length = length;
                Step::Next(DecoderState::Data)
            }
            Err(step) => step,
        }
    }

    fn read_data(&mut self) -> Step {
        while self.partial.payload.len() < self.partial.length as usize {
            let byte = match self.next_byte() {
                Ok(byte) => byte,
                Err(step) => return step,
            };
            // The length field is a u8, so the payload can never outgrow its capacity.
            let _ = self.partial.payload.push(byte);
        }
        debug!(target: self.log_target, "... data received: {}", HexDump(&self.partial.payload));
        Step::Next(DecoderState::Crc)
    }

    fn read_crc(&mut self) -> Step {
        let received = match self.next_byte() {
            Ok(byte) => byte,
            Err(step) => return step,
        };

        let expected = self.partial.expected_crc();
        if received != expected {
            self.stats.crc_errors = self.stats.crc_errors.wrapping_add(1);
            warn!(
                target: self.log_target,
                "CRC mismatch (expected 0x{expected:02X}, received 0x{received:02X}), resynchronizing"
            );
            return Step::Next(DecoderState::SeekDelimiter);
        }

        debug!(target: self.log_target, "Packet decoded");
        let partial = core::mem::take(&mut self.partial);
        Step::Done(Frame::from_parts(
            partial.command,
            partial.address.unwrap_or(0),
            partial.payload,
        ))
    }

    /// Unstuff one byte, or say which step to take when that is not possible.
    fn next_byte(&mut self) -> Result<u8, Step> {
        match stuffing::next_unstuffed(&mut self.buffer) {
            Unstuffed::Byte(byte) => Ok(byte),
            Unstuffed::Pending => Err(Step::Wait),
            Unstuffed::Delimiter => {
                self.stats.restarts = self.stats.restarts.wrapping_add(1);
                debug!(target: self.log_target, "Delimiter inside frame, restarting at new frame");
                Err(Step::Next(DecoderState::Command))
            }
            Unstuffed::Malformed(follow) => {
                self.stats.malformed_escapes = self.stats.malformed_escapes.wrapping_add(1);
                warn!(
                    target: self.log_target,
                    "Escape marker followed by 0x{follow:02X}, resynchronizing"
                );
                Err(Step::Next(DecoderState::SeekDelimiter))
            }
        }
    }
}
