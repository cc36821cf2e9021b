//! Error handling for CarveCraft
//!
//! Provides the error taxonomy shared by every layer:
//! - Connection errors (settings validation, port access, link state)
//! - Controller errors (per-command failures, rejections, timeouts)
//! - G-Code errors (program file access)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Connection error type
///
/// Raised while establishing, using, or tearing down the link to the
/// controller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectionError {
    /// Settings were rejected before the transport was contacted
    #[error("Invalid connection settings: {reason}")]
    InvalidSettings {
        /// Why the settings were rejected.
        reason: String,
    },

    /// The transport refused to open the port
    #[error("Failed to open port {port}: {reason}")]
    ConnectFailed {
        /// The port that could not be opened.
        port: String,
        /// The reason reported by the transport.
        reason: String,
    },

    /// An operation needed a live connection and there was none
    #[error("Not connected to device")]
    NotConnected,

    /// A connect was attempted while a connection already exists
    #[error("Already connected to {port}")]
    AlreadyConnected {
        /// The port of the existing connection.
        port: String,
    },

    /// Enumerating serial ports failed
    #[error("Failed to enumerate ports: {reason}")]
    PortEnumeration {
        /// The reason reported by the operating system.
        reason: String,
    },

    /// The link failed while closing
    #[error("Failed to close port {port}: {reason}")]
    CloseFailed {
        /// The port being closed.
        port: String,
        /// The reason reported by the transport.
        reason: String,
    },
}

/// Controller error type
///
/// Represents the failure of a single command line sent to the controller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControllerError {
    /// Transport-level failure while writing or awaiting the reply
    #[error("Command '{command}' failed: {reason}")]
    CommandFailed {
        /// The offending command line.
        command: String,
        /// What went wrong.
        reason: String,
    },

    /// No reply arrived in time
    #[error("Command '{command}' timed out after {timeout_ms}ms")]
    Timeout {
        /// The offending command line.
        command: String,
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// The controller answered with an error reply
    #[error("Command '{command}' rejected by controller: {reply}")]
    CommandRejected {
        /// The offending command line.
        command: String,
        /// The raw reply line.
        reply: String,
    },

    /// The operation is not allowed in the current machine state
    #[error("Operation '{operation}' not allowed while {state}")]
    InvalidState {
        /// The refused operation.
        operation: String,
        /// Description of the current state.
        state: String,
    },
}

impl ControllerError {
    /// The command line this error refers to, if any
    pub fn command(&self) -> Option<&str> {
        match self {
            ControllerError::CommandFailed { command, .. }
            | ControllerError::Timeout { command, .. }
            | ControllerError::CommandRejected { command, .. } => Some(command),
            ControllerError::InvalidState { .. } => None,
        }
    }
}

/// G-Code error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GcodeError {
    /// Program file could not be read or written
    #[error("File error: {reason}")]
    FileError {
        /// The reason for the file error.
        reason: String,
    },
}

/// Main error type for CarveCraft
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Controller error
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// G-Code error
    #[error(transparent)]
    Gcode(#[from] GcodeError),
}

impl Error {
    /// Shorthand for `ConnectionError::NotConnected`
    pub fn not_connected() -> Self {
        Error::Connection(ConnectionError::NotConnected)
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Controller(ControllerError::Timeout { .. }))
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Check if this is the not-connected precondition failure
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Error::Connection(ConnectionError::NotConnected))
    }

    /// Check if this is a per-command failure (including timeouts and rejections)
    pub fn is_command_failure(&self) -> bool {
        matches!(
            self,
            Error::Controller(
                ControllerError::CommandFailed { .. }
                    | ControllerError::Timeout { .. }
                    | ControllerError::CommandRejected { .. }
            )
        )
    }

    /// The command line this error refers to, if any
    pub fn command(&self) -> Option<&str> {
        match self {
            Error::Controller(e) => e.command(),
            _ => None,
        }
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_display() {
        let err = ConnectionError::InvalidSettings {
            reason: "port must not be empty".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid connection settings: port must not be empty"
        );
        assert_eq!(
            ConnectionError::NotConnected.to_string(),
            "Not connected to device"
        );
    }

    #[test]
    fn test_command_error_carries_line() {
        let err: Error = ControllerError::CommandRejected {
            command: "G1 X1 Q".to_string(),
            reply: "error:20".to_string(),
        }
        .into();
        assert!(err.is_command_failure());
        assert_eq!(err.command(), Some("G1 X1 Q"));
        assert!(err.to_string().contains("G1 X1 Q"));
    }

    #[test]
    fn test_predicates() {
        let timeout: Error = ControllerError::Timeout {
            command: "G28".to_string(),
            timeout_ms: 5000,
        }
        .into();
        assert!(timeout.is_timeout());
        assert!(timeout.is_command_failure());
        assert!(!timeout.is_connection_error());

        let nc = Error::not_connected();
        assert!(nc.is_not_connected());
        assert!(nc.is_connection_error());
        assert_eq!(nc.command(), None);

        let state: Error = ControllerError::InvalidState {
            operation: "jog".to_string(),
            state: "running".to_string(),
        }
        .into();
        assert!(!state.is_command_failure());
    }
}
