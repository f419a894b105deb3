//! Blocking [`AtChannel`] over a [`SerialPort`].

use std::io::{self, Read, Write};
use std::time::Duration;

use tracing::trace;

use crate::channel::AtChannel;
use crate::codec::LineCodec;
use crate::commands::Command;
use crate::error::{AtError, AtResult};
use crate::hal::{Clock, SerialPort};
use crate::responses::{parse_error_line, Expect, HttpHeader, Response};

/// Bytes pulled from the port per read.
const READ_CHUNK: usize = 256;

/// Bytes pushed to the port per write when streaming an upload.
const UPLOAD_CHUNK: usize = 512;

/// Pause between polls of an idle port.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// AT command client driving a serial port.
///
/// Waits are polled against the injected [`Clock`]. For raw transfers the
/// timeout bounds the gap between received bytes, not the whole transfer.
pub struct AtClient<P, C> {
    port: P,
    clock: C,
    codec: LineCodec,
}

impl<P: SerialPort, C: Clock> AtClient<P, C> {
    /// Create a new client owning `port`.
    pub fn new(port: P, clock: C) -> Self {
        AtClient {
            port,
            clock,
            codec: LineCodec::new(),
        }
    }

    /// Get the underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Get the underlying port mutably.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Release the port.
    pub fn into_inner(self) -> P {
        self.port
    }

    /// Move available bytes from the port into the codec.
    fn fill(&mut self) -> AtResult<bool> {
        let mut buf = [0u8; READ_CHUNK];
        let n = self.port.read_available(&mut buf)?;
        if n > 0 {
            trace!("AtClient: received {} bytes", n);
            self.codec.push(&buf[..n]);
        }
        Ok(n > 0)
    }

    /// Poll the codec until `poll` yields a result or `timeout` elapses.
    fn wait<T>(
        &mut self,
        timeout: Duration,
        mut poll: impl FnMut(&mut LineCodec) -> Option<AtResult<T>>,
    ) -> AtResult<T> {
        let deadline = self.clock.now() + timeout;
        loop {
            if let Some(result) = poll(&mut self.codec) {
                return result;
            }
            if self.clock.now() >= deadline {
                trace!("AtClient: timeout, buffer '{}'", self.codec.buffer_as_str());
                return Err(AtError::Timeout);
            }
            if !self.fill()? {
                self.clock.delay(POLL_INTERVAL);
            }
        }
    }

    /// Pass exactly `len` raw bytes to `consume`, chunk by chunk.
    fn read_raw(
        &mut self,
        timeout: Duration,
        len: usize,
        mut consume: impl FnMut(&[u8]) -> AtResult<()>,
    ) -> AtResult<()> {
        let mut remaining = len;
        let mut deadline = self.clock.now() + timeout;
        while remaining > 0 {
            let chunk = self.codec.take(remaining);
            if !chunk.is_empty() {
                remaining -= chunk.len();
                consume(&chunk[..])?;
                deadline = self.clock.now() + timeout;
                continue;
            }
            if self.clock.now() >= deadline {
                trace!("AtClient: raw read timed out with {} of {} bytes left", remaining, len);
                return Err(AtError::Timeout);
            }
            if !self.fill()? {
                self.clock.delay(POLL_INTERVAL);
            }
        }
        Ok(())
    }
}

/// Pop complete lines, stopping at the first error result code.
fn next_error_line(codec: &mut LineCodec) -> Option<AtResult<Response>> {
    while let Some(line) = codec.decode_line() {
        if let Some(err) = parse_error_line(line.trim()) {
            return Some(Err(err));
        }
    }
    None
}

fn map_write_error(err: io::Error) -> AtError {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => AtError::Timeout,
        _ => AtError::Io(err),
    }
}

impl<P: SerialPort, C: Clock> AtChannel for AtClient<P, C> {
    fn flush(&mut self) -> AtResult<()> {
        self.codec.clear();
        let mut buf = [0u8; READ_CHUNK];
        while self.port.read_available(&mut buf)? > 0 {}
        Ok(())
    }

    fn send(&mut self, command: &Command) -> AtResult<()> {
        trace!("AtClient: sending '{}'", command.to_command_string());
        self.port.write_all(&command.encode()).map_err(map_write_error)
    }

    fn expect(&mut self, pattern: &Expect, timeout: Duration) -> AtResult<Response> {
        trace!("AtClient: expecting {:?} within {:?}", pattern, timeout);
        self.wait(timeout, |codec| match pattern {
            Expect::DataPrompt => {
                if codec.decode_prompt() {
                    return Some(Ok(Response::DataPrompt));
                }
                next_error_line(codec)
            }
            Expect::FileContents { name } => {
                if let Some(result) = codec.decode_file_header(name) {
                    return Some(result.map(|length| Response::FileContents { length }));
                }
                next_error_line(codec)
            }
            _ => {
                while let Some(line) = codec.decode_line() {
                    trace!("AtClient: line '{}'", line);
                    if let Some(result) = pattern.match_line(&line) {
                        return Some(result);
                    }
                }
                None
            }
        })
    }

    fn expect_http_header(&mut self, timeout: Duration) -> AtResult<HttpHeader> {
        self.wait(timeout, |codec| codec.decode_http_header())
    }

    fn discard(&mut self, len: usize, timeout: Duration) -> AtResult<()> {
        self.read_raw(timeout, len, |_| Ok(()))
    }

    fn read_raw_to_buffer(&mut self, timeout: Duration, buffer: &mut [u8]) -> AtResult<()> {
        let len = buffer.len();
        let mut offset = 0;
        self.read_raw(timeout, len, |chunk| {
            buffer[offset..offset + chunk.len()].copy_from_slice(chunk);
            offset += chunk.len();
            Ok(())
        })
    }

    fn read_raw_to_sink(&mut self, timeout: Duration, len: usize, sink: &mut dyn Write) -> AtResult<()> {
        self.read_raw(timeout, len, |chunk| sink.write_all(chunk).map_err(AtError::from))?;
        sink.flush()?;
        Ok(())
    }

    fn send_raw(&mut self, data: &[u8]) -> AtResult<()> {
        trace!("AtClient: sending {} raw bytes", data.len());
        self.port.write_all(data).map_err(map_write_error)
    }

    fn send_raw_from(&mut self, source: &mut dyn Read, len: usize) -> AtResult<()> {
        let mut buf = [0u8; UPLOAD_CHUNK];
        let mut remaining = len;
        while remaining > 0 {
            let want = remaining.min(UPLOAD_CHUNK);
            let n = match source.read(&mut buf[..want]) {
                Ok(0) => {
                    return Err(AtError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("source ended with {} of {} bytes left", remaining, len),
                    )))
                }
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(AtError::Io(e)),
            };
            self.port.write_all(&buf[..n]).map_err(map_write_error)?;
            remaining -= n;
        }
        Ok(())
    }

    fn receive_raw(&mut self, buffer: &mut [u8]) -> AtResult<usize> {
        let buffered = self.codec.take(buffer.len());
        if !buffered.is_empty() {
            buffer[..buffered.len()].copy_from_slice(&buffered);
            return Ok(buffered.len());
        }
        Ok(self.port.read_available(buffer)?)
    }

    fn available(&mut self) -> usize {
        self.codec.buffered_len() + self.port.available()
    }

    fn set_baud_rate(&mut self, baud: u32) -> AtResult<()> {
        Ok(self.port.set_baud_rate(baud)?)
    }
}
