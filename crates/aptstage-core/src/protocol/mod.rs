//! APT Protocol Communication
//!
//! Implements the Thorlabs APT binary message protocol for motor controllers.
//!
//! Every message starts with a fixed 6-byte header; a flag in the destination
//! byte announces an optional data block whose length replaces the two header
//! parameters.

mod controller;
mod error;
pub mod frame;
pub mod message_id;
mod queue;
pub mod serial;
pub mod transport;

pub use controller::{
    Controller, ControllerConfig, EndOfMoveMessages, StopMode, DEFAULT_SETTLE_POLL_MS,
};
pub use error::AptError;
pub use frame::{DataBuilder, Frame, FrameHeader, Payload};
pub use message_id::MessageId;
pub use queue::PendingQueue;
pub use serial::{find_port, list_controllers, open_port, PortInfo};
pub use transport::{SerialChannel, Transport};

/// Result type used throughout the crate
pub type AptResult<T> = std::result::Result<T, AptError>;

/// Default baud rate for APT controllers
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Size of the fixed message header
pub const HEADER_SIZE: usize = 6;

/// Default destination address (generic USB unit)
pub const DEFAULT_DEST: u8 = 0x50;

/// Default source address (host)
pub const DEFAULT_SRC: u8 = 0x01;

/// Channel used by single-channel controllers
pub const DEFAULT_CHANNEL: u16 = 1;
