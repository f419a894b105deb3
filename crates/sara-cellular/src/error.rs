//! Error types for the cellular control plane.

use sara_at::AtError;
use thiserror::Error;

/// Errors returned by every modem operation.
///
/// This is a closed set: whatever the channel reports is folded into one of
/// these kinds by the `From<AtError>` conversion.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CellularError {
    /// The module is off, unresponsive, or did not answer within the boot window.
    #[error("module failed to boot")]
    BootFailure,

    /// Transport or module fault not otherwise classified.
    #[error("device error: {0}")]
    Device(String),

    /// An expected response did not arrive in time.
    #[error("timeout waiting for module response")]
    Timeout,

    /// A response arrived but did not match what was expected.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// A transferred body does not fit the destination.
    #[error("buffer overflow: capacity {capacity} bytes, body {required} bytes")]
    BufferOverflow { capacity: usize, required: usize },

    /// The tunneled HTTP transaction reported a non-success status.
    #[error("HTTP status {status}")]
    Http { status: u16 },
}

impl From<AtError> for CellularError {
    fn from(err: AtError) -> Self {
        match err {
            AtError::Timeout => CellularError::Timeout,
            AtError::UnexpectedResponse(text) => CellularError::UnexpectedResponse(text),
            AtError::Cme(code) => CellularError::UnexpectedResponse(format!("+CME ERROR: {}", code)),
            AtError::Error => CellularError::UnexpectedResponse("ERROR".to_string()),
            AtError::BufferOverflow { max, actual } => CellularError::BufferOverflow {
                capacity: max,
                required: actual,
            },
            AtError::Io(e) => CellularError::Device(e.to_string()),
        }
    }
}

/// Result type alias for modem operations.
pub type CellularResult<T> = Result<T, CellularError>;
