//! Protocol message identifiers
//!
//! The subset of the APT message set needed to drive a single-channel
//! motor controller.

use serde::{Deserialize, Serialize};

/// APT message identifiers used by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageId {
    /// Flash the front panel LED
    Identify,

    /// Request hardware information
    HwReqInfo,
    /// Hardware information reply
    HwGetInfo,

    /// Write homing parameters
    SetHomeParams,
    /// Request homing parameters
    ReqHomeParams,
    /// Homing parameters reply
    GetHomeParams,

    /// Start a homing move
    MoveHome,
    /// Homing finished
    MoveHomed,

    /// Start an absolute move
    MoveAbsolute,
    /// Move finished (carries a status block)
    MoveCompleted,

    /// Request the position counter
    ReqPosCounter,
    /// Position counter reply
    GetPosCounter,

    /// Request a status update
    ReqStatusUpdate,
    /// Status update reply
    GetStatusUpdate,
    /// "Server alive" acknowledgement
    AckStatusUpdate,

    /// Write trapezoidal velocity parameters
    SetVelParams,
    /// Request trapezoidal velocity parameters
    ReqVelParams,
    /// Velocity parameters reply
    GetVelParams,

    /// Stop sending end-of-move notifications
    SuspendEndOfMoveMsgs,
    /// Resume sending end-of-move notifications
    ResumeEndOfMoveMsgs,

    /// Stop the motor
    MoveStop,
    /// Motor stopped
    MoveStopped,

    /// Restore EEPROM stage defaults
    ResetDefaults,
}

impl MessageId {
    /// All identifiers known to this crate
    pub const ALL: [MessageId; 23] = [
        MessageId::Identify,
        MessageId::HwReqInfo,
        MessageId::HwGetInfo,
        MessageId::SetHomeParams,
        MessageId::ReqHomeParams,
        MessageId::GetHomeParams,
        MessageId::MoveHome,
        MessageId::MoveHomed,
        MessageId::MoveAbsolute,
        MessageId::MoveCompleted,
        MessageId::ReqPosCounter,
        MessageId::GetPosCounter,
        MessageId::ReqStatusUpdate,
        MessageId::GetStatusUpdate,
        MessageId::AckStatusUpdate,
        MessageId::SetVelParams,
        MessageId::ReqVelParams,
        MessageId::GetVelParams,
        MessageId::SuspendEndOfMoveMsgs,
        MessageId::ResumeEndOfMoveMsgs,
        MessageId::MoveStop,
        MessageId::MoveStopped,
        MessageId::ResetDefaults,
    ];

    /// Get the 16-bit wire identifier
    pub fn code(&self) -> u16 {
        match self {
            MessageId::Identify => 0x0223,
            MessageId::HwReqInfo => 0x0005,
            MessageId::HwGetInfo => 0x0006,
            MessageId::SetHomeParams => 0x0440,
            MessageId::ReqHomeParams => 0x0441,
            MessageId::GetHomeParams => 0x0442,
            MessageId::MoveHome => 0x0443,
            MessageId::MoveHomed => 0x0444,
            MessageId::MoveAbsolute => 0x0453,
            MessageId::MoveCompleted => 0x0464,
            MessageId::ReqPosCounter => 0x0411,
            MessageId::GetPosCounter => 0x0412,
            MessageId::ReqStatusUpdate => 0x0490,
            MessageId::GetStatusUpdate => 0x0491,
            MessageId::AckStatusUpdate => 0x0492,
            MessageId::SetVelParams => 0x0413,
            MessageId::ReqVelParams => 0x0414,
            MessageId::GetVelParams => 0x0415,
            MessageId::SuspendEndOfMoveMsgs => 0x046B,
            MessageId::ResumeEndOfMoveMsgs => 0x046C,
            MessageId::MoveStop => 0x0465,
            MessageId::MoveStopped => 0x0466,
            MessageId::ResetDefaults => 0x0686,
        }
    }

    /// Look up an identifier from its wire value
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|id| id.code() == code)
    }

    /// The message the controller answers with, if any
    pub fn reply(&self) -> Option<MessageId> {
        match self {
            MessageId::HwReqInfo => Some(MessageId::HwGetInfo),
            MessageId::ReqHomeParams => Some(MessageId::GetHomeParams),
            MessageId::MoveHome => Some(MessageId::MoveHomed),
            MessageId::MoveAbsolute => Some(MessageId::MoveCompleted),
            MessageId::ReqPosCounter => Some(MessageId::GetPosCounter),
            MessageId::ReqStatusUpdate => Some(MessageId::GetStatusUpdate),
            MessageId::ReqVelParams => Some(MessageId::GetVelParams),
            MessageId::MoveStop => Some(MessageId::MoveStopped),
            _ => None,
        }
    }
}

impl From<MessageId> for u16 {
    fn from(id: MessageId) -> u16 {
        id.code()
    }
}
