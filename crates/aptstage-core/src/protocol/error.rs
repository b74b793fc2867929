//! Protocol errors

use thiserror::Error;

/// Errors that can occur while talking to an APT controller
#[derive(Error, Debug)]
pub enum AptError {
    /// Fewer bytes than the header or data block requires
    #[error("Truncated frame: expected {expected} bytes, got {actual}")]
    TruncatedFrame {
        /// Bytes required
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// A frame or parameter that cannot be encoded or used
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Target position outside the stage's linear range
    #[error("{requested} requested, but allowed range is {min:.2}..{max:.2}")]
    OutOfRange {
        /// Requested position
        requested: f64,
        /// Lower end of the range
        min: f64,
        /// Upper end of the range
        max: f64,
    },

    /// Unit conversion attempted on an uncalibrated stage
    #[error("Stage has no calibration: {0}")]
    UnconfiguredProfile(String),

    /// No matching reply before the configured request timeout
    #[error("Timed out waiting for message {expected:#06x}")]
    Timeout {
        /// Message ID that was awaited
        expected: u16,
    },

    /// The session was closed
    #[error("Not connected to controller")]
    NotConnected,

    /// The serial port could not be opened or configured
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// No controller with the requested serial number is attached
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Failure of the underlying byte stream
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
