//! WAKE frames and how they are put on the wire.
//!
//! ```text
//! +------+-----------+---------+--------+-------------+-----+
//! | FEND | [address] | command | length | payload ... | crc |
//! +------+-----------+---------+--------+-------------+-----+
//! ```
//!
//! The address byte is only present for addressed frames and carries bit 7 so it
//! can be told apart from a command. The CRC covers every byte before it,
//! including the leading `FEND`. Everything after the `FEND` is stuffed.

use core::fmt;

use heapless::Vec;
use thiserror::Error;

use crate::{
    crc::Crc8,
    stuffing::{self, FEND},
};

/// Largest payload a frame can carry, limited by the one byte length field.
pub const MAX_PAYLOAD: usize = 255;

/// FEND, address, command, length, payload and CRC.
pub const MAX_FRAME_LEN: usize = 4 + MAX_PAYLOAD + 1;

/// Worst case wire length, when every byte after the `FEND` needs escaping.
pub const MAX_WIRE_LEN: usize = 1 + 2 * (MAX_FRAME_LEN - 1);

/// Marks the address byte of an addressed frame.
pub const ADDRESS_FLAG: u8 = 0x80;

/// Payload of a frame.
pub type Payload = Vec<u8, MAX_PAYLOAD>;

/// A fully stuffed frame ready to be written to the transport.
pub type WireFrame = Vec<u8, MAX_WIRE_LEN>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("Payload of {len} bytes exceeds the {} byte limit", MAX_PAYLOAD)]
    PayloadTooLong { len: usize },
}

/// One logical WAKE frame, before stuffing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// `0` means unaddressed.
    address: u8,
    command: u8,
    payload: Payload,
}

impl Frame {
    /// Create a frame. Command and address are truncated to 7 bits.
    pub fn new(command: u8, address: u8, payload: &[u8]) -> Result<Self, FrameError> {
        let payload = Payload::from_slice(payload)
            .map_err(|_| FrameError::PayloadTooLong { len: payload.len() })?;
        Ok(Self::from_parts(command, address, payload))
    }

    pub(crate) fn from_parts(command: u8, address: u8, payload: Payload) -> Self {
        Self {
            address: address & 0x7F,
            command: command & 0x7F,
            payload,
        }
    }

    pub fn command(&self) -> u8 {
        self.command
    }

    /// The device address, `None` for an unaddressed frame.
    pub fn address(&self) -> Option<u8> {
        (self.address != 0).then_some(self.address)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }

    /// Assemble and stuff the frame.
    pub fn encode(&self) -> WireFrame {
        let mut raw: Vec<u8, MAX_FRAME_LEN> = Vec::new();
        // Capacities are sized for the largest possible frame, so none of these can fail.
        let _ = raw.push(FEND);
        if let Some(address) = self.address() {
            let _ = raw.push(address | ADDRESS_FLAG);
        }
        let _ = raw.push(self.command);
        let _ = raw.push(self.payload.len() as u8);
        let _ = raw.extend_from_slice(&self.payload);

        let mut crc = Crc8::new();
        crc.update(&raw);
        let _ = raw.push(crc.finish());

        let mut wire = WireFrame::new();
        let _ = stuffing::stuff(&raw, &mut wire);
        wire
    }
}

/// Build the wire form of a frame in one go.
pub fn build(command: u8, address: u8, payload: &[u8]) -> Result<WireFrame, FrameError> {
    Ok(Frame::new(command, address, payload)?.encode())
}

/// Formats bytes as space separated hex for log output.
pub struct HexDump<'a>(pub &'a [u8]);

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, byte) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        crc::crc8,
        stuffing::{FESC, TFEND, TFESC},
    };

    #[test]
    fn empty_payload_frame() {
        let wire = build(0x07, 0, &[]).unwrap();
        assert_eq!(crc8(&[FEND, 0x07, 0x00]), 0xD0);
        assert_eq!(wire.as_slice(), &[FEND, 0x07, 0x00, 0xD0]);
    }

    #[test]
    fn delimiter_in_payload_is_escaped() {
        let wire = build(0x10, 0, &[0x05, FEND]).unwrap();
        assert_eq!(wire[..6], [FEND, 0x10, 0x02, 0x05, FESC, TFEND]);
        assert_eq!(wire.iter().filter(|&&b| b == FEND).count(), 1);
    }

    #[test]
    fn addressed_frame_sets_high_bit() {
        let frame = Frame::new(0x03, 0x12, &[0xAA]).unwrap();
        assert_eq!(frame.address(), Some(0x12));
        let wire = frame.encode();
        assert_eq!(wire[..5], [FEND, 0x92, 0x03, 0x01, 0xAA]);

        // The CRC itself may have been escaped.
        let mut raw: Vec<u8, 8> = Vec::new();
        stuffing::unstuff(&wire, &mut raw).unwrap();
        assert_eq!(raw.len(), 6);
        assert_eq!(raw[5], crc8(&raw[..5]));
    }

    #[test]
    fn reserved_checksum_is_escaped() {
        assert_eq!(crc8(&[FEND, 0x07, 0x02, 0x00, 0xFC]), FEND);
        let wire = build(0x07, 0, &[0x00, 0xFC]).unwrap();
        assert_eq!(wire.as_slice(), &[FEND, 0x07, 0x02, 0x00, 0xFC, FESC, TFEND]);

        assert_eq!(crc8(&[FEND, 0x07, 0x02, 0x00, 0x96]), FESC);
        let wire = build(0x07, 0, &[0x00, 0x96]).unwrap();
        assert_eq!(wire.as_slice(), &[FEND, 0x07, 0x02, 0x00, 0x96, FESC, TFESC]);
    }

    #[test]
    fn command_and_address_are_masked() {
        let frame = Frame::new(0x87, 0x80, &[]).unwrap();
        assert_eq!(frame.command(), 0x07);
        // 0x80 masks down to 0, which is unaddressed.
        assert_eq!(frame.address(), None);
        assert_eq!(frame.encode(), build(0x07, 0, &[]).unwrap());
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let payload = [0u8; MAX_PAYLOAD + 1];
        assert_eq!(
            Frame::new(0x01, 0, &payload),
            Err(FrameError::PayloadTooLong { len: 256 })
        );
    }

    #[test]
    fn largest_frame_fits_wire_buffer() {
        let payload = [FEND; MAX_PAYLOAD];
        let wire = Frame::new(0x7F, 0x7F, &payload).unwrap().encode();
        // FEND, address, command, length, then every payload byte escaped, then the CRC.
        assert!(wire.len() >= 4 + 2 * MAX_PAYLOAD + 1);
        assert!(wire.len() <= MAX_WIRE_LEN);
    }

    #[test]
    fn hex_dump_format() {
        use std::string::ToString;

        assert_eq!(HexDump(&[0xC0, 0x07, 0x00]).to_string(), "C0 07 00");
        assert_eq!(HexDump(&[]).to_string(), "");
    }
}
