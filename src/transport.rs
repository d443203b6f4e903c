//! What the protocol needs from the outside world: a byte pipe and a clock.

use embedded_io::{Error as _, ErrorKind};

/// Millisecond timestamps.
pub type Instant = fugit::TimerInstantU64<1_000>;

/// Millisecond durations, used for timeouts and poll intervals.
pub type Millis = fugit::MillisDurationU32;

/// Most bytes the default [`Transport::reset_buffers`] discards in one call.
pub const RESET_DRAIN_LIMIT: usize = 1024;

/// A byte oriented link to the device.
///
/// Anything that implements the [`embedded_io`] read/write traits can be used. The
/// default methods only rely on [`embedded_io::ReadReady`]; implementations with
/// native buffer control (like a serial port) should override
/// [`Transport::reset_buffers`].
pub trait Transport: embedded_io::Read + embedded_io::Write + embedded_io::ReadReady {
    /// Read whatever is currently buffered without waiting for more.
    ///
    /// Returns `0` when nothing is available. Read timeouts count as nothing
    /// available.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if !self.read_ready()? {
            return Ok(0);
        }
        match self.read(buf) {
            Ok(read) => Ok(read),
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Discard unread input before a new request.
    ///
    /// The default flushes pending output, as [`embedded_io::Write`] cannot drop
    /// it, then reads and discards at most [`RESET_DRAIN_LIMIT`] buffered bytes.
    fn reset_buffers(&mut self) -> Result<(), Self::Error> {
        self.flush()?;
        let mut scratch = [0u8; 32];
        let mut drained = 0;
        while drained < RESET_DRAIN_LIMIT {
            let read = self.read_available(&mut scratch)?;
            if read == 0 {
                break;
            }
            drained += read;
        }
        Ok(())
    }
}

/// Time source used for the response deadline.
pub trait Clock {
    fn now(&mut self) -> Instant;

    /// Block for `duration`.
    fn delay(&mut self, duration: Millis);
}

/// [`Clock`] backed by [`std::time`].
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl StdClock {
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Clock for StdClock {
    fn now(&mut self) -> Instant {
        let elapsed = self.origin.elapsed().as_millis();
        Instant::from_ticks(u64::try_from(elapsed).unwrap_or(u64::MAX))
    }

    fn delay(&mut self, duration: Millis) {
        std::thread::sleep(std::time::Duration::from_millis(duration.to_millis() as u64));
    }
}
