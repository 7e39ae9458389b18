//! # Error Types
//!
//! Custom error types for Joydrive using `thiserror`.
//!
//! Nothing in the crate recovers from these locally. Every variant travels
//! up to `main` and ends the process.

use thiserror::Error;

use crate::transport::LinkState;

/// Main error type for Joydrive
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The controller index no longer refers to an attached device
    #[error("Controller {index} is no longer available")]
    DeviceUnavailable {
        /// Ordinal index from the enumeration that produced the handle
        index: usize,
    },

    /// The initial link to the remote device could not be established
    #[error("Failed to connect to {address} on channel {channel}: {reason}")]
    Connection {
        address: String,
        channel: u8,
        reason: String,
    },

    /// A write on an established link failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// A transport operation was attempted in a state that does not allow it
    #[error("Cannot {operation} while link is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: LinkState,
    },

    /// The input subsystem could not be queried
    #[error("Input error: {0}")]
    Input(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Joydrive
pub type Result<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_unavailable_message() {
        let err = HarnessError::DeviceUnavailable { index: 2 };
        assert_eq!(err.to_string(), "Controller 2 is no longer available");
    }

    #[test]
    fn test_connection_message_names_address_and_channel() {
        let err = HarnessError::Connection {
            address: "3C:71:BF:A6:E3:5E".to_string(),
            channel: 1,
            reason: "No such device".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("3C:71:BF:A6:E3:5E"));
        assert!(msg.contains("channel 1"));
        assert!(msg.contains("No such device"));
    }

    #[test]
    fn test_invalid_state_message() {
        let err = HarnessError::InvalidState {
            operation: "send command",
            state: LinkState::Closed,
        };
        assert_eq!(err.to_string(), "Cannot send command while link is Closed");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: HarnessError = io.into();
        assert!(matches!(err, HarnessError::Io(_)));
    }
}
