//! Response patterns and parsing.
//!
//! The module answers on the same line-oriented channel it receives commands
//! on, interleaved with unsolicited result codes. A caller waits for one
//! [`Expect`] pattern at a time; lines that neither match the pattern nor
//! report an error are skipped.

use crate::commands::HttpCommand;
use crate::error::{AtError, AtResult};

/// Final result code of a successful command.
pub const OK: &str = "OK";

/// Final result code of a failed command when numeric errors are disabled.
pub const ERROR: &str = "ERROR";

/// Prefix of a numeric extended error.
pub const CME_ERROR_PREFIX: &str = "+CME ERROR:";

/// Acknowledgment of an `abort` request.
pub const ABORTED: &str = "ABORTED";

/// Prefix of the unsolicited HTTP command result.
pub const HTTP_RESULT_PREFIX: &str = "+UUHTTPCR:";

/// Marker in an extended network search line carrying the country code.
pub const CELL_MARKER: &str = "MCC:";

/// Prefix of a file read-back response.
pub const READ_FILE_PREFIX: &str = "+URDFILE: ";

/// Prompt sent by the module when it is ready to receive raw file data.
pub const DATA_PROMPT: u8 = b'>';

/// Maximum size of an embedded HTTP header before it is considered malformed.
pub const MAX_HTTP_HEADER_LEN: usize = 4096;

/// A response pattern to wait for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expect {
    /// The `OK` final result code.
    Ok,
    /// The subscriber identity line returned by `+CIMI`.
    Imsi,
    /// A cell line reported during an extended network search.
    CellFound,
    /// The `ABORTED` acknowledgment.
    Aborted,
    /// A successful `+UUHTTPCR` result for the given HTTP command.
    HttpResult(HttpCommand),
    /// The start of a file read-back, carrying the file length.
    FileContents { name: String },
    /// The `>` prompt that precedes raw file data.
    DataPrompt,
}

/// Parsed response matching an [`Expect`] pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ok,
    /// The raw identity text, unvalidated.
    Imsi(String),
    Cell {
        /// Mobile country code of the first cell found.
        mcc: u32,
    },
    Aborted,
    HttpResult { command: HttpCommand },
    FileContents {
        /// Number of bytes following the opening quote.
        length: usize,
    },
    DataPrompt,
}

impl Expect {
    /// Match a complete line against this pattern.
    ///
    /// Returns `None` if the line is unrelated and waiting should continue.
    /// Error result codes always terminate the wait.
    pub fn match_line(&self, line: &str) -> Option<AtResult<Response>> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if let Some(err) = parse_error_line(line) {
            return Some(Err(err));
        }

        match self {
            Expect::Ok => (line == OK).then_some(Ok(Response::Ok)),
            Expect::Imsi => {
                // Echo and unsolicited codes are not identities
                if line == OK || line.starts_with('+') || line.starts_with("AT") {
                    None
                } else {
                    Some(Ok(Response::Imsi(line.to_string())))
                }
            }
            Expect::CellFound => {
                let start = line.find(CELL_MARKER)? + CELL_MARKER.len();
                Some(parse_leading_number(&line[start..]).map(|mcc| Response::Cell { mcc }))
            }
            Expect::Aborted => (line == ABORTED).then_some(Ok(Response::Aborted)),
            Expect::HttpResult(command) => {
                let rest = line.strip_prefix(HTTP_RESULT_PREFIX)?;
                parse_http_result(rest, *command)
            }
            // Handled on the raw byte stream by the codec
            Expect::FileContents { .. } | Expect::DataPrompt => None,
        }
    }
}

/// Recognize the error result codes.
pub fn parse_error_line(line: &str) -> Option<AtError> {
    if line == ERROR {
        return Some(AtError::Error);
    }
    let code = line.strip_prefix(CME_ERROR_PREFIX)?.trim();
    Some(match code.parse::<u16>() {
        Ok(code) => AtError::Cme(code),
        Err(_) => AtError::UnexpectedResponse(line.to_string()),
    })
}

/// Parse the decimal digits at the start of `text`.
fn parse_leading_number(text: &str) -> AtResult<u32> {
    let text = text.trim_start();
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    text[..end]
        .parse()
        .map_err(|_| AtError::UnexpectedResponse(format!("invalid number: {}", text)))
}

/// Parse `<profile>,<command>,<result>` of a `+UUHTTPCR` line.
fn parse_http_result(rest: &str, expected: HttpCommand) -> Option<AtResult<Response>> {
    let parts: Vec<&str> = rest.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Some(Err(AtError::UnexpectedResponse(format!(
            "expected 3 fields in HTTP result, got {}: {}",
            parts.len(),
            rest
        ))));
    }

    let command = match parts[1].parse::<u8>().ok().and_then(HttpCommand::from_value) {
        Some(command) => command,
        None => {
            return Some(Err(AtError::UnexpectedResponse(format!(
                "invalid HTTP command: {}",
                parts[1]
            ))))
        }
    };
    if command != expected {
        return None;
    }

    match parts[2] {
        "1" => Some(Ok(Response::HttpResult { command })),
        other => Some(Err(AtError::UnexpectedResponse(format!(
            "HTTP {:?} failed with result {}",
            command, other
        )))),
    }
}

/// Pseudo-HTTP header embedded at the start of a staged response file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpHeader {
    /// Bytes taken by the status line, headers and blank line.
    pub consumed: usize,
    /// Numeric HTTP status code.
    pub status: u16,
}

impl HttpHeader {
    /// Parse a header from the start of `data`.
    ///
    /// Returns `None` while the terminating blank line has not arrived yet.
    pub fn parse(data: &[u8]) -> Option<AtResult<HttpHeader>> {
        let end = match data.windows(4).position(|w| w == b"\r\n\r\n") {
            Some(pos) => pos + 4,
            None if data.len() > MAX_HTTP_HEADER_LEN => {
                return Some(Err(AtError::UnexpectedResponse(format!(
                    "HTTP header exceeds {} bytes",
                    MAX_HTTP_HEADER_LEN
                ))))
            }
            None => return None,
        };

        let head = String::from_utf8_lossy(&data[..end]);
        let status_line = head.lines().next().unwrap_or_default();
        let mut fields = status_line.split_whitespace();

        let status = match (fields.next(), fields.next()) {
            (Some(version), Some(code)) if version.starts_with("HTTP/") => code.parse::<u16>().ok(),
            _ => None,
        };

        Some(match status {
            Some(status) => Ok(HttpHeader {
                consumed: end,
                status,
            }),
            None => Err(AtError::UnexpectedResponse(format!(
                "invalid HTTP status line: {}",
                status_line
            ))),
        })
    }

    /// Check if the status code is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
