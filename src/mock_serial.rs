//! We use this mocking module in unit tests to emulate a serial port and a clock.

use heapless::{Deque, Vec};
use thiserror::Error;

use crate::transport::{Clock, Instant, Millis, Transport};

/// Largest response a test can queue.
const RESPONSE_CAPACITY: usize = 1024;

/// Our mock type used to emulate a serial port connected to a WAKE device.
///
/// Responses are queued up front and released one per write, the way a device
/// only answers once it has been sent a command.
pub struct MockSerial {
    /// Buffer to store data written to the mock serial port
    write_buffer: Vec<u8, RESPONSE_CAPACITY>,
    /// Responses still waiting for a command
    queued: Deque<Vec<u8, RESPONSE_CAPACITY>, 8>,
    /// Bytes the host can currently read
    readable: Deque<u8, RESPONSE_CAPACITY>,
    /// Largest number of bytes handed out per read, to emulate a slow link
    chunk_size: usize,
    /// Number of times the buffers were reset
    resets: usize,
    /// Flag to simulate write errors
    should_error_on_write: bool,
    /// Flag to simulate read errors
    should_error_on_read: bool,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MockSerialError {
    /// Simulated buffer overflow
    #[error("buffer overflow")]
    BufferOverflow,
    /// Generic simulated error for testing
    #[error("simulated error")]
    SimulatedError,
}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockSerialError::BufferOverflow => embedded_io::ErrorKind::OutOfMemory,
            MockSerialError::SimulatedError => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = MockSerialError;
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }

        self.write_buffer
            .extend_from_slice(buf)
            .map_err(|_| MockSerialError::BufferOverflow)?;

        if let Some(response) = self.queued.pop_front() {
            self.release(&response)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        Ok(())
    }
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_read {
            return Err(MockSerialError::SimulatedError);
        }

        let limit = buf.len().min(self.chunk_size);
        let mut read = 0;
        while read < limit {
            let Some(byte) = self.readable.pop_front() else {
                break;
            };
            buf[read] = byte;
            read += 1;
        }
        Ok(read)
    }
}

impl embedded_io::ReadReady for MockSerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        if self.should_error_on_read {
            return Err(MockSerialError::SimulatedError);
        }
        Ok(!self.readable.is_empty())
    }
}

impl Transport for MockSerial {
    fn reset_buffers(&mut self) -> Result<(), Self::Error> {
        self.resets += 1;
        self.readable.clear();
        Ok(())
    }
}

impl MockSerial {
    /// Create a new MockSerial instance with empty buffers
    pub fn new() -> Self {
        Self {
            write_buffer: Vec::new(),
            queued: Deque::new(),
            readable: Deque::new(),
            chunk_size: usize::MAX,
            resets: 0,
            should_error_on_write: false,
            should_error_on_read: false,
        }
    }

    /// Queue bytes to become readable after the next write.
    pub fn queue_response(&mut self, data: &[u8]) -> Result<(), MockSerialError> {
        let response = Vec::from_slice(data).map_err(|_| MockSerialError::BufferOverflow)?;
        self.queued
            .push_back(response)
            .map_err(|_| MockSerialError::BufferOverflow)
    }

    /// Make bytes readable straight away, as if they arrived before any command.
    pub fn inject_readable(&mut self, data: &[u8]) -> Result<(), MockSerialError> {
        self.release(data)
    }

    fn release(&mut self, data: &[u8]) -> Result<(), MockSerialError> {
        for &byte in data {
            self.readable
                .push_back(byte)
                .map_err(|_| MockSerialError::BufferOverflow)?;
        }
        Ok(())
    }

    /// Limit how many bytes a single read returns.
    pub fn set_chunk_size(&mut self, chunk_size: usize) {
        self.chunk_size = chunk_size.max(1);
    }

    /// Get a reference to the data that was written to this mock serial port
    pub fn written_data(&self) -> &[u8] {
        &self.write_buffer
    }

    /// Clear the write buffer
    pub fn clear_written_data(&mut self) {
        self.write_buffer.clear();
    }

    /// How often [`Transport::reset_buffers`] was called.
    pub fn resets(&self) -> usize {
        self.resets
    }

    /// Configure whether write operations should fail with an error
    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }

    /// Configure whether read operations should fail with an error
    pub fn set_read_error(&mut self, should_error: bool) {
        self.should_error_on_read = should_error;
    }
}

/// Virtual clock that only moves when something waits on it.
#[derive(Debug, Default)]
pub struct MockClock {
    now_ms: u64,
    delays: u32,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Milliseconds since the clock was created.
    pub fn elapsed_ms(&self) -> u64 {
        self.now_ms
    }

    /// Number of times [`Clock::delay`] was called.
    pub fn delays(&self) -> u32 {
        self.delays
    }
}

impl Clock for MockClock {
    fn now(&mut self) -> Instant {
        Instant::from_ticks(self.now_ms)
    }

    fn delay(&mut self, duration: Millis) {
        self.delays += 1;
        self.now_ms += duration.to_millis() as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Error, Read, ReadReady, Write};

    #[test]
    fn test_new_mock_serial() {
        let mut mock = MockSerial::new();
        assert_eq!(mock.written_data().len(), 0);
        assert_eq!(mock.resets(), 0);
        assert!(!mock.read_ready().unwrap());
    }

    #[test]
    fn test_write_data() {
        let mut mock = MockSerial::new();
        let test_data = b"Hello, World!";

        let result = mock.write(test_data);
        assert_eq!(result, Ok(test_data.len()));
        assert_eq!(mock.written_data(), test_data);
    }

    #[test]
    fn test_write_buffer_overflow() {
        let mut mock = MockSerial::new();
        let large_data = [0u8; RESPONSE_CAPACITY + 1];

        let result = mock.write(&large_data);
        assert_eq!(result, Err(MockSerialError::BufferOverflow));
    }

    #[test]
    fn test_response_released_by_write() {
        let mut mock = MockSerial::new();
        mock.queue_response(b"first").unwrap();
        mock.queue_response(b"second").unwrap();

        let mut buffer = [0u8; 10];
        assert_eq!(mock.read(&mut buffer), Ok(0));

        mock.write(b"cmd").unwrap();
        assert_eq!(mock.read(&mut buffer), Ok(5));
        assert_eq!(&buffer[..5], b"first");

        mock.write(b"cmd").unwrap();
        assert_eq!(mock.read(&mut buffer), Ok(6));
        assert_eq!(&buffer[..6], b"second");
    }

    #[test]
    fn test_chunked_reads() {
        let mut mock = MockSerial::new();
        mock.set_chunk_size(2);
        mock.inject_readable(b"Hello").unwrap();

        let mut buffer = [0u8; 8];
        assert_eq!(mock.read(&mut buffer), Ok(2));
        assert_eq!(mock.read(&mut buffer), Ok(2));
        assert_eq!(mock.read(&mut buffer), Ok(1));
        assert_eq!(&buffer[..1], b"o");
    }

    #[test]
    fn test_reset_discards_readable_only() {
        let mut mock = MockSerial::new();
        mock.inject_readable(b"stale").unwrap();
        mock.queue_response(b"fresh").unwrap();

        mock.reset_buffers().unwrap();
        assert_eq!(mock.resets(), 1);
        assert!(!mock.read_ready().unwrap());

        mock.write(b"cmd").unwrap();
        let mut buffer = [0u8; 8];
        assert_eq!(mock.read(&mut buffer), Ok(5));
        assert_eq!(&buffer[..5], b"fresh");
    }

    #[test]
    fn test_error_simulation() {
        let mut mock = MockSerial::new();
        mock.set_write_error(true);
        assert_eq!(mock.write(b"test"), Err(MockSerialError::SimulatedError));
        assert_eq!(mock.flush(), Err(MockSerialError::SimulatedError));
        assert_eq!(mock.written_data().len(), 0);

        mock.set_read_error(true);
        let mut buffer = [0u8; 4];
        assert_eq!(mock.read(&mut buffer), Err(MockSerialError::SimulatedError));
        assert!(mock.read_ready().is_err());
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            MockSerialError::BufferOverflow.kind(),
            embedded_io::ErrorKind::OutOfMemory
        );
        assert_eq!(
            MockSerialError::SimulatedError.kind(),
            embedded_io::ErrorKind::Other
        );
    }

    #[test]
    fn test_clear_written_data() {
        let mut mock = MockSerial::new();
        mock.write(b"test data").unwrap();
        assert!(!mock.written_data().is_empty());

        mock.clear_written_data();
        assert!(mock.written_data().is_empty());
    }

    #[test]
    fn test_mock_clock() {
        let mut clock = MockClock::new();
        assert_eq!(clock.now(), Instant::from_ticks(0));
        clock.delay(Millis::millis(10));
        clock.delay(Millis::millis(5));
        assert_eq!(clock.elapsed_ms(), 15);
        assert_eq!(clock.delays(), 2);
    }
}
