//! The request/response primitive the control plane is built on.

use std::io::{Read, Write};
use std::time::Duration;

use crate::commands::Command;
use crate::error::AtResult;
use crate::responses::{Expect, HttpHeader, Response};

/// A half-duplex AT command channel to the module.
///
/// Implementations own the serial link and its receive buffer. None of the
/// methods retry; a timeout or malformed response is reported as-is.
pub trait AtChannel {
    /// Discard any received data that has not been consumed yet.
    fn flush(&mut self) -> AtResult<()>;

    /// Send a command, terminated with `\r`.
    fn send(&mut self, command: &Command) -> AtResult<()>;

    /// Block until a response matching `pattern` arrives or `timeout` elapses.
    fn expect(&mut self, pattern: &Expect, timeout: Duration) -> AtResult<Response>;

    /// Parse the pseudo-HTTP header at the start of a file read-back.
    fn expect_http_header(&mut self, timeout: Duration) -> AtResult<HttpHeader>;

    /// Read and drop exactly `len` bytes of raw data.
    fn discard(&mut self, len: usize, timeout: Duration) -> AtResult<()>;

    /// Read exactly `buffer.len()` bytes of raw data into `buffer`.
    fn read_raw_to_buffer(&mut self, timeout: Duration, buffer: &mut [u8]) -> AtResult<()>;

    /// Read exactly `len` bytes of raw data into `sink`.
    fn read_raw_to_sink(&mut self, timeout: Duration, len: usize, sink: &mut dyn Write) -> AtResult<()>;

    /// Send bytes verbatim, without a terminator.
    fn send_raw(&mut self, data: &[u8]) -> AtResult<()>;

    /// Send exactly `len` bytes read from `source`, verbatim.
    fn send_raw_from(&mut self, source: &mut dyn Read, len: usize) -> AtResult<()>;

    /// Read whatever raw data is available into `buffer` without waiting.
    fn receive_raw(&mut self, buffer: &mut [u8]) -> AtResult<usize>;

    /// Number of received bytes waiting to be read.
    fn available(&mut self) -> usize;

    /// Change the link baud rate.
    fn set_baud_rate(&mut self, baud: u32) -> AtResult<()>;
}
