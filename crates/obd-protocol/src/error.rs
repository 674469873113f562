//! OBD-II Error Types

use std::io::ErrorKind;
use thiserror::Error;

/// Errors that can occur during OBD-II communication
#[derive(Debug, Clone, Error)]
pub enum ObdError {
    /// Serial port connection error
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// Timeout waiting for response
    #[error("Timeout waiting for OBD response after {0}ms")]
    Timeout(u64),

    /// Invalid response from adapter
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The adapter echoed back something other than the command we sent
    #[error("ECHO mismatch: sent {sent:?}, received {received:?}")]
    EchoMismatch { sent: String, received: String },

    /// The vehicle did not answer the request
    #[error("NO DATA")]
    NoData,

    /// Adapter not responding
    #[error("OBD adapter not responding")]
    AdapterNotResponding,

    /// CAN bus error
    #[error("CAN bus error: {0}")]
    CanBusError(String),

    /// The serial link is gone; nothing more can be exchanged on it
    #[error("OBD session lost: {0}")]
    SessionLost(String),

    /// No candidate device path could be opened
    #[error("No OBD adapter found after {rounds} round(s), tried {tried:?}")]
    NoDevice { tried: Vec<String>, rounds: u32 },
}

impl ObdError {
    /// Whether the session can no longer be used for further commands
    pub fn is_session_lost(&self) -> bool {
        matches!(self, ObdError::SessionLost(_))
    }
}

impl From<std::io::Error> for ObdError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            ErrorKind::BrokenPipe
            | ErrorKind::NotConnected
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::UnexpectedEof => ObdError::SessionLost(err.to_string()),
            _ => ObdError::SerialError(err.to_string()),
        }
    }
}

impl From<tokio_serial::Error> for ObdError {
    fn from(err: tokio_serial::Error) -> Self {
        ObdError::SerialError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnect_kinds_map_to_session_lost() {
        let err: ObdError = std::io::Error::new(ErrorKind::BrokenPipe, "unplugged").into();
        assert!(err.is_session_lost());

        let err: ObdError = std::io::Error::new(ErrorKind::UnexpectedEof, "eof").into();
        assert!(err.is_session_lost());
    }

    #[test]
    fn test_other_io_errors_are_transient() {
        let err: ObdError = std::io::Error::new(ErrorKind::InvalidData, "garbage").into();
        assert!(matches!(err, ObdError::SerialError(_)));
        assert!(!err.is_session_lost());
    }

    #[test]
    fn test_driver_timeout_is_a_serial_error() {
        // The configured command timeout is reported by the client itself.
        let err: ObdError = std::io::Error::new(ErrorKind::TimedOut, "read timed out").into();
        assert!(matches!(err, ObdError::SerialError(_)));
        assert!(!err.is_session_lost());
    }
}
