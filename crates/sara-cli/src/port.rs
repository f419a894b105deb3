//! Serial link bridged over TCP.
//!
//! Lab setups expose the module's UART through a serial-to-TCP bridge
//! (`ser2net`, a simulator, or a USB adapter shared over the network). Bytes
//! written to the socket go to the module and everything the module sends
//! arrives on the socket, with no framing of its own.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use sara_cellular::SerialPort;
use tracing::{debug, info, trace};

/// Pause before retrying a write the socket was not ready for.
const WRITE_RETRY: Duration = Duration::from_millis(1);

/// How long a write may wait for the bridge to take more bytes.
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on what [`SerialPort::available`] reports.
const PEEK_LIMIT: usize = 1024;

/// [`SerialPort`] over a non-blocking TCP connection.
pub struct TcpSerialPort {
    stream: TcpStream,
    write_timeout: Duration,
}

impl TcpSerialPort {
    /// Connect to a serial bridge at `addr`.
    pub fn connect(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        stream.set_nonblocking(true)?;
        info!("TcpSerialPort: connected to {}", stream.peer_addr()?);
        Ok(TcpSerialPort {
            stream,
            write_timeout: WRITE_TIMEOUT,
        })
    }

    /// Limit how long [`SerialPort::write_all`] waits on a stalled bridge.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }
}

fn bridge_closed() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "serial bridge closed the connection")
}

impl SerialPort for TcpSerialPort {
    /// Fails with [`io::ErrorKind::TimedOut`] if the bridge takes no bytes for
    /// the write timeout.
    fn write_all(&mut self, mut data: &[u8]) -> io::Result<()> {
        let mut deadline = Instant::now() + self.write_timeout;
        while !data.is_empty() {
            match self.stream.write(data) {
                Ok(0) => return Err(bridge_closed()),
                Ok(n) => {
                    data = &data[n..];
                    deadline = Instant::now() + self.write_timeout;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            format!("serial bridge stalled with {} bytes unwritten", data.len()),
                        ));
                    }
                    thread::sleep(WRITE_RETRY);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stream.read(buf) {
            Ok(0) if !buf.is_empty() => Err(bridge_closed()),
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Bytes waiting on the socket, reported up to [`PEEK_LIMIT`].
    ///
    /// A failed peek reports nothing; the error surfaces on the next read.
    fn available(&mut self) -> usize {
        let mut pending = [0u8; PEEK_LIMIT];
        match self.stream.peek(&mut pending) {
            Ok(n) => n,
            Err(e) => {
                if e.kind() != io::ErrorKind::WouldBlock {
                    trace!("TcpSerialPort: peek failed: {}", e);
                }
                0
            }
        }
    }

    fn set_baud_rate(&mut self, baud: u32) -> io::Result<()> {
        // The bridge owns the physical UART settings
        debug!("TcpSerialPort: ignoring baud rate {}", baud);
        Ok(())
    }
}
