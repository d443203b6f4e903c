//! Byte stuffing for the WAKE wire format.
//!
//! `FEND` only ever appears on the wire as the first byte of a frame. Inside the
//! frame both reserved values are replaced by two byte sequences:
//!
//! | value  | on the wire     |
//! |--------|-----------------|
//! | `FEND` | `FESC`, `TFEND` |
//! | `FESC` | `FESC`, `TFESC` |

use heapless::{Deque, Vec};
use thiserror::Error;

/// Frame delimiter.
pub const FEND: u8 = 0xC0;
/// Escape marker.
pub const FESC: u8 = 0xDB;
/// Stands in for `FEND` after an escape marker.
pub const TFEND: u8 = 0xDC;
/// Stands in for `FESC` after an escape marker.
pub const TFESC: u8 = 0xDD;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StuffError {
    #[error("Output buffer too small")]
    Overflow,
    #[error("Escape marker followed by 0x{follow:02X} at offset {offset}")]
    MalformedEscape { offset: usize, follow: u8 },
    #[error("Escape marker at end of input")]
    TruncatedEscape,
    #[error("Unescaped delimiter at offset {offset}")]
    UnexpectedDelimiter { offset: usize },
}

/// Stuff a complete frame. The first byte is copied as-is since it is the delimiter.
pub fn stuff<const N: usize>(frame: &[u8], out: &mut Vec<u8, N>) -> Result<(), StuffError> {
    let Some((&first, rest)) = frame.split_first() else {
        return Ok(());
    };
    out.push(first).map_err(|_| StuffError::Overflow)?;

    for &byte in rest {
        let escaped: &[u8] = match byte {
            FEND => &[FESC, TFEND],
            FESC => &[FESC, TFESC],
            _ => core::slice::from_ref(&byte),
        };
        out.extend_from_slice(escaped)
            .map_err(|_| StuffError::Overflow)?;
    }
    Ok(())
}

/// Reverse of [`stuff`] for a complete wire frame.
///
/// Streams are decoded with [`next_unstuffed`] instead, this is for whole frames.
pub fn unstuff<const N: usize>(wire: &[u8], out: &mut Vec<u8, N>) -> Result<(), StuffError> {
    let Some((&first, rest)) = wire.split_first() else {
        return Ok(());
    };
    out.push(first).map_err(|_| StuffError::Overflow)?;

    let mut bytes = rest.iter().copied().enumerate();
    while let Some((index, byte)) = bytes.next() {
        let offset = index + 1;
        let value = match byte {
            FEND => return Err(StuffError::UnexpectedDelimiter { offset }),
            FESC => match bytes.next() {
                Some((_, TFEND)) => FEND,
                Some((_, TFESC)) => FESC,
                Some((_, follow)) => return Err(StuffError::MalformedEscape { offset, follow }),
                None => return Err(StuffError::TruncatedEscape),
            },
            other => other,
        };
        out.push(value).map_err(|_| StuffError::Overflow)?;
    }
    Ok(())
}

/// Result of decoding one byte from the front of a stuffed stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unstuffed {
    /// A data byte. Its wire form has been consumed.
    Byte(u8),
    /// Not enough input to decide. Nothing was consumed.
    Pending,
    /// A raw `FEND`, which starts a new frame. It has been consumed.
    Delimiter,
    /// `FESC` followed by something other than `TFEND`/`TFESC`.
    ///
    /// Only the `FESC` is consumed, the follow byte stays buffered.
    Malformed(u8),
}

/// Decode the next byte of a stuffed stream, consuming its wire form.
///
/// An escape marker is never consumed on its own unless what follows it is
/// already buffered.
pub fn next_unstuffed<const N: usize>(buffer: &mut Deque<u8, N>) -> Unstuffed {
    let Some(&byte) = buffer.front() else {
        return Unstuffed::Pending;
    };

    match byte {
        FEND => {
            buffer.pop_front();
            Unstuffed::Delimiter
        }
        FESC => {
            let Some(&follow) = buffer.iter().nth(1) else {
                return Unstuffed::Pending;
            };
            buffer.pop_front();
            match follow {
                TFEND => {
                    buffer.pop_front();
                    Unstuffed::Byte(FEND)
                }
                TFESC => {
                    buffer.pop_front();
                    Unstuffed::Byte(FESC)
                }
                other => Unstuffed::Malformed(other),
            }
        }
        _ => {
            buffer.pop_front();
            Unstuffed::Byte(byte)
        }
    }
}
