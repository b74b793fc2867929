//! Fixed-layout parameter blocks exchanged with the controller

use byteorder::{ByteOrder, LittleEndian};

use super::ensure_len;
use crate::protocol::{AptError, DataBuilder};

/// Homing parameters, in controller units
///
/// Direction and limit switch are documented as unused, but stages mis-home
/// when they are zeroed; always round-trip the values the controller reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HomeParams {
    /// Channel the parameters apply to
    pub channel: u16,
    /// Homing direction as stored on the controller
    pub direction: u16,
    /// Limit switch used for homing
    pub limit_switch: u16,
    /// Homing velocity in APT units
    pub velocity: i32,
    /// Distance from the home switch to the zero position, in counts
    pub offset: i32,
}

impl HomeParams {
    /// Size of the data block
    pub const SIZE: usize = 14;

    /// Decode the data block
    pub fn parse(data: &[u8]) -> Result<Self, AptError> {
        ensure_len(data, Self::SIZE)?;
        Ok(Self {
            channel: LittleEndian::read_u16(&data[0..2]),
            direction: LittleEndian::read_u16(&data[2..4]),
            limit_switch: LittleEndian::read_u16(&data[4..6]),
            velocity: LittleEndian::read_i32(&data[6..10]),
            offset: LittleEndian::read_i32(&data[10..14]),
        })
    }

    /// Encode the data block
    pub fn to_bytes(&self) -> Vec<u8> {
        DataBuilder::new()
            .u16_le(self.channel)
            .u16_le(self.direction)
            .u16_le(self.limit_switch)
            .i32_le(self.velocity)
            .i32_le(self.offset)
            .build()
    }
}

/// Trapezoidal velocity parameters, in controller units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VelocityParams {
    /// Channel the parameters apply to
    pub channel: u16,
    /// Always zero on the wire
    pub min_velocity: i32,
    /// Acceleration in APT units
    pub acceleration: i32,
    /// Maximum velocity in APT units
    pub max_velocity: i32,
}

impl VelocityParams {
    /// Size of the data block
    pub const SIZE: usize = 14;

    /// Decode the data block
    pub fn parse(data: &[u8]) -> Result<Self, AptError> {
        ensure_len(data, Self::SIZE)?;
        Ok(Self {
            channel: LittleEndian::read_u16(&data[0..2]),
            min_velocity: LittleEndian::read_i32(&data[2..6]),
            acceleration: LittleEndian::read_i32(&data[6..10]),
            max_velocity: LittleEndian::read_i32(&data[10..14]),
        })
    }

    /// Encode the data block
    pub fn to_bytes(&self) -> Vec<u8> {
        DataBuilder::new()
            .u16_le(self.channel)
            .i32_le(self.min_velocity)
            .i32_le(self.acceleration)
            .i32_le(self.max_velocity)
            .build()
    }
}

/// Trapezoidal velocity profile in physical units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityProfile {
    /// mm/s
    pub min_velocity: f64,
    /// mm/s²
    pub acceleration: f64,
    /// mm/s
    pub max_velocity: f64,
}

/// Position counter reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionCounter {
    /// Channel the counter belongs to
    pub channel: u16,
    /// Position in encoder counts
    pub position: i32,
}

impl PositionCounter {
    /// Size of the data block
    pub const SIZE: usize = 6;

    /// Decode the data block
    pub fn parse(data: &[u8]) -> Result<Self, AptError> {
        ensure_len(data, Self::SIZE)?;
        Ok(Self {
            channel: LittleEndian::read_u16(&data[0..2]),
            position: LittleEndian::read_i32(&data[2..6]),
        })
    }
}

/// Data block of a MOVE_ABSOLUTE request
pub fn move_absolute_data(channel: u16, position: i32) -> Vec<u8> {
    DataBuilder::new().u16_le(channel).i32_le(position).build()
}
