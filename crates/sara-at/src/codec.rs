//! Line and raw-data codec for the module's serial channel.
//!
//! The channel carries two kinds of traffic. Command responses are text lines
//! terminated with `\r\n`. File transfers switch to raw bytes: the `>` prompt
//! before an upload, and the length-prefixed contents of a read-back, which
//! begin mid-line right after `+URDFILE: "<name>",<len>,"`.

use bytes::{Bytes, BytesMut};

use crate::error::{AtError, AtResult};
use crate::responses::{HttpHeader, DATA_PROMPT, READ_FILE_PREFIX};

/// Maximum command/response line length.
pub const MAX_LINE_LENGTH: usize = 512;

/// Terminator appended to every command.
pub const COMMAND_TERMINATOR: u8 = b'\r';

/// A codec for reading module output.
///
/// - Accumulates received bytes until a complete line is found
/// - Detects the raw data prompt and read-back headers, which are not
///   terminated by a line break
/// - Hands out raw bytes on demand once a transfer is in progress
#[derive(Debug, Default)]
pub struct LineCodec {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
}

impl LineCodec {
    /// Create a new line codec.
    pub fn new() -> Self {
        LineCodec {
            buffer: BytesMut::with_capacity(MAX_LINE_LENGTH * 2),
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode a complete line from the buffer.
    ///
    /// Empty lines are skipped. Returns `None` if more data is needed.
    pub fn decode_line(&mut self) -> Option<String> {
        loop {
            let end = self.buffer.iter().position(|&b| b == b'\r' || b == b'\n')?;

            let line_data = self.buffer.split_to(end);
            let line = String::from_utf8_lossy(&line_data).to_string();

            // Skip the newline character(s)
            self.skip_line_breaks();

            if !line.is_empty() {
                return Some(line);
            }
        }
    }

    /// Consume the `>` data prompt if it is next in the buffer.
    pub fn decode_prompt(&mut self) -> bool {
        self.skip_line_breaks();
        if self.buffer.first() != Some(&DATA_PROMPT) {
            return false;
        }
        let _ = self.buffer.split_to(1);
        if self.buffer.first() == Some(&b' ') {
            let _ = self.buffer.split_to(1);
        }
        true
    }

    /// Try to decode the read-back header `+URDFILE: "<name>",<len>,"`.
    ///
    /// On success the buffer is left positioned at the first content byte and
    /// the content length is returned.
    pub fn decode_file_header(&mut self, name: &str) -> Option<AtResult<usize>> {
        let prefix = format!("{}\"{}\",", READ_FILE_PREFIX, name);
        let start = find(&self.buffer, prefix.as_bytes())?;
        let digits_start = start + prefix.len();

        let rest = &self.buffer[digits_start..];
        let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();

        if digits < rest.len() && rest[digits] != b',' {
            let _ = self.buffer.split_to(digits_start);
            return Some(Err(AtError::UnexpectedResponse(
                "invalid file length in read-back header".to_string(),
            )));
        }
        if rest.len() < digits + 2 {
            return None;
        }
        if digits == 0 || rest[digits + 1] != b'"' {
            let _ = self.buffer.split_to(digits_start);
            return Some(Err(AtError::UnexpectedResponse(
                "malformed read-back header".to_string(),
            )));
        }

        let length = String::from_utf8_lossy(&rest[..digits]).parse::<usize>();
        let _ = self.buffer.split_to(digits_start + digits + 2);
        Some(length.map_err(|e| AtError::UnexpectedResponse(format!("invalid file length: {}", e))))
    }

    /// Try to decode the pseudo-HTTP header at the start of the buffer.
    ///
    /// On success the header bytes are consumed.
    pub fn decode_http_header(&mut self) -> Option<AtResult<HttpHeader>> {
        let result = HttpHeader::parse(&self.buffer)?;
        if let Ok(header) = &result {
            let _ = self.buffer.split_to(header.consumed);
        }
        Some(result)
    }

    /// Take up to `max` buffered bytes.
    pub fn take(&mut self, max: usize) -> Bytes {
        let n = max.min(self.buffer.len());
        self.buffer.split_to(n).freeze()
    }

    /// Encode a command for transmission.
    ///
    /// Appends the carriage return terminator.
    pub fn encode_command(cmd: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(cmd.len() + 1);
        buf.extend_from_slice(cmd.as_bytes());
        buf.push(COMMAND_TERMINATOR);
        buf
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Get the current buffer contents as a string (for debugging).
    pub fn buffer_as_str(&self) -> String {
        String::from_utf8_lossy(&self.buffer).to_string()
    }

    fn skip_line_breaks(&mut self) {
        let n = self
            .buffer
            .iter()
            .take_while(|&&b| b == b'\r' || b == b'\n')
            .count();
        let _ = self.buffer.split_to(n);
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
