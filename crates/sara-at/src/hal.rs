//! Hardware seams: the serial link and the time source.

use std::io;
use std::thread;
use std::time::{Duration, Instant};

/// Raw byte access to the module's serial link.
pub trait SerialPort {
    /// Write all of `data` to the link.
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Read whatever is available into `buf` without blocking.
    ///
    /// Returns the number of bytes read, which may be zero.
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Number of received bytes waiting to be read.
    fn available(&mut self) -> usize;

    /// Change the link baud rate.
    fn set_baud_rate(&mut self, baud: u32) -> io::Result<()>;
}

/// Monotonic time source with a blocking delay.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;

    /// Block for `duration`.
    fn delay(&self, duration: Duration);
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn delay(&self, duration: Duration) {
        (**self).delay(duration)
    }
}

/// [`Clock`] backed by [`Instant`] and [`thread::sleep`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn delay(&self, duration: Duration) {
        thread::sleep(duration);
    }
}
