//! OBD-II Error Types

use crate::session::SessionState;
use thiserror::Error;

/// Errors that can occur during OBD-II communication
///
/// A missing marker or short payload in an otherwise delivered response is
/// not an error: decoders report it as `None`.
#[derive(Debug, Error)]
pub enum ObdError {
    /// Serial port open, write or read failure
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// No prompt character arrived within the read timeout
    #[error("Timeout waiting for OBD response after {0}ms")]
    Timeout(u64),

    /// Channel closed by the adapter or by a higher layer
    #[error("OBD adapter disconnected")]
    Disconnected,

    /// Strict initialisation saw an unexpected answer
    #[error("Adapter rejected {command}: {response:?}")]
    InitRejected { command: String, response: String },

    /// PID not in the session's supported set
    #[error("PID {0:02X} not supported by vehicle")]
    PidNotSupported(u8),

    /// Operation issued outside the `Ready` state
    #[error("Session not ready (state: {0:?})")]
    NotReady(SessionState),
}

impl ObdError {
    /// Whether this error means the channel can no longer be trusted
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ObdError::SerialError(_) | ObdError::Timeout(_) | ObdError::Disconnected
        )
    }
}

impl From<std::io::Error> for ObdError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionAborted => ObdError::Disconnected,
            _ => ObdError::SerialError(err.to_string()),
        }
    }
}

impl From<tokio_serial::Error> for ObdError {
    fn from(err: tokio_serial::Error) -> Self {
        ObdError::SerialError(err.to_string())
    }
}
