//! Error types for the AT command channel.

use thiserror::Error;

/// `+CME ERROR` code reported by the module when a named file does not exist.
pub const CME_FILE_NOT_FOUND: u16 = 1612;

/// Errors that can occur while exchanging AT commands with the module.
#[derive(Debug, Error)]
pub enum AtError {
    /// No matching response arrived before the deadline.
    #[error("timeout waiting for response")]
    Timeout,

    /// A response arrived but could not be parsed against the expected pattern.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The module reported a numeric extended error (`+CME ERROR: <n>`).
    #[error("module error code {0}")]
    Cme(u16),

    /// The module reported a bare `ERROR` result code.
    #[error("module returned ERROR")]
    Error,

    /// Received data does not fit the space reserved for it.
    #[error("buffer overflow: max {max} bytes, got {actual}")]
    BufferOverflow { max: usize, actual: usize },

    /// The serial link or a storage sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AtError {
    /// Whether the module reported that the addressed file does not exist.
    pub fn is_file_not_found(&self) -> bool {
        matches!(self, AtError::Cme(CME_FILE_NOT_FOUND))
    }
}

/// Result type alias for AT channel operations.
pub type AtResult<T> = Result<T, AtError>;
