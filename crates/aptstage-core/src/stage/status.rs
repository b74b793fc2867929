//! Controller status decoding
//!
//! A status block is 14 bytes, little-endian:
//! - 2 bytes: Channel
//! - 4 bytes: Position counter (signed)
//! - 2 bytes: Velocity (signed, despite the manual listing it as unsigned)
//! - 2 bytes: Reserved
//! - 4 bytes: Status bits

use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

use super::{ensure_len, DeviceProfile};
use crate::protocol::AptError;

/// Size of a status block
pub const STATUS_SIZE: usize = 14;

/// Status bit masks
#[allow(missing_docs)]
pub mod bits {
    pub const FORWARD_LIMIT: u32 = 0x0000_0001;
    pub const REVERSE_LIMIT: u32 = 0x0000_0002;
    pub const MOVING_FORWARD: u32 = 0x0000_0010;
    pub const MOVING_REVERSE: u32 = 0x0000_0020;
    pub const JOGGING_FORWARD: u32 = 0x0000_0040;
    pub const JOGGING_REVERSE: u32 = 0x0000_0080;
    pub const HOMING: u32 = 0x0000_0200;
    pub const HOMED: u32 = 0x0000_0400;
    pub const TRACKING: u32 = 0x0000_1000;
    pub const SETTLED: u32 = 0x0000_2000;
    pub const EXCESSIVE_POSITION_ERROR: u32 = 0x0000_4000;
    pub const MOTOR_CURRENT_LIMIT: u32 = 0x0100_0000;
    pub const CHANNEL_ENABLED: u32 = 0x8000_0000;
}

/// Readable descriptions, in reporting order
const FLAG_TABLE: [(u32, &str); 13] = [
    (bits::FORWARD_LIMIT, "Forward hardware limit switch active"),
    (bits::REVERSE_LIMIT, "Reverse hardware limit switch active"),
    (bits::MOVING_FORWARD, "In motion, moving forward"),
    (bits::MOVING_REVERSE, "In motion, moving backward"),
    (bits::JOGGING_FORWARD, "In motion, jogging forward"),
    (bits::JOGGING_REVERSE, "In motion, jogging backward"),
    (bits::HOMING, "In motion, homing"),
    (bits::HOMED, "Homed"),
    (bits::TRACKING, "Tracking"),
    (bits::SETTLED, "Settled"),
    (bits::EXCESSIVE_POSITION_ERROR, "Excessive position error"),
    (bits::MOTOR_CURRENT_LIMIT, "Motor current limit reached"),
    (bits::CHANNEL_ENABLED, "Channel enabled"),
];

/// Snapshot of a controller channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerStatus {
    /// Channel the status refers to
    pub channel: u16,
    /// Position in encoder counts
    pub position_raw: i32,
    /// Velocity in controller units
    pub velocity_raw: i16,
    /// Raw status bits
    pub statusbits: u32,
    position_scale: f64,
    velocity_scale: f64,
}

impl ControllerStatus {
    /// Decode a status block using the stage's calibration
    pub fn parse(data: &[u8], profile: &DeviceProfile) -> Result<Self, AptError> {
        ensure_len(data, STATUS_SIZE)?;

        Ok(Self {
            channel: LittleEndian::read_u16(&data[0..2]),
            position_raw: LittleEndian::read_i32(&data[2..6]),
            velocity_raw: LittleEndian::read_i16(&data[6..8]),
            // data[8..10] reserved
            statusbits: LittleEndian::read_u32(&data[10..14]),
            position_scale: profile.position_scale(),
            velocity_scale: profile.status_velocity_scale(),
        })
    }

    /// Position in mm (degrees on rotary stages)
    pub fn position(&self) -> f64 {
        f64::from(self.position_raw) / self.position_scale
    }

    /// Velocity in mm/s
    pub fn velocity(&self) -> f64 {
        f64::from(self.velocity_raw) / self.velocity_scale
    }

    /// Whether the reported velocity is exactly zero
    pub fn is_stationary(&self) -> bool {
        self.velocity_raw == 0
    }

    fn bit(&self, mask: u32) -> bool {
        self.statusbits & mask != 0
    }

    /// Forward hardware limit switch is active
    pub fn forward_hardware_limit_switch_active(&self) -> bool {
        self.bit(bits::FORWARD_LIMIT)
    }

    /// Reverse hardware limit switch is active
    pub fn reverse_hardware_limit_switch_active(&self) -> bool {
        self.bit(bits::REVERSE_LIMIT)
    }

    /// Moving in either direction
    pub fn moving(&self) -> bool {
        self.moving_forward() || self.moving_reverse()
    }

    /// Moving forward
    pub fn moving_forward(&self) -> bool {
        self.bit(bits::MOVING_FORWARD)
    }

    /// Moving in reverse
    pub fn moving_reverse(&self) -> bool {
        self.bit(bits::MOVING_REVERSE)
    }

    /// Jogging forward
    pub fn jogging_forward(&self) -> bool {
        self.bit(bits::JOGGING_FORWARD)
    }

    /// Jogging in reverse
    pub fn jogging_reverse(&self) -> bool {
        self.bit(bits::JOGGING_REVERSE)
    }

    /// Homing in progress
    pub fn homing(&self) -> bool {
        self.bit(bits::HOMING)
    }

    /// Homed since power-up
    pub fn homed(&self) -> bool {
        self.bit(bits::HOMED)
    }

    /// Tracking the commanded position
    pub fn tracking(&self) -> bool {
        self.bit(bits::TRACKING)
    }

    /// Settled at the commanded position
    pub fn settled(&self) -> bool {
        self.bit(bits::SETTLED)
    }

    /// The stage was impeded and lost track of where it is; re-home it
    pub fn excessive_position_error(&self) -> bool {
        self.bit(bits::EXCESSIVE_POSITION_ERROR)
    }

    /// Motor current limit reached
    pub fn motor_current_limit_reached(&self) -> bool {
        self.bit(bits::MOTOR_CURRENT_LIMIT)
    }

    /// Channel is enabled
    pub fn channel_enabled(&self) -> bool {
        self.bit(bits::CHANNEL_ENABLED)
    }

    /// One description per set flag, in table order
    pub fn flag_strings(&self) -> Vec<String> {
        FLAG_TABLE
            .iter()
            .filter(|(mask, _)| self.bit(*mask))
            .map(|(_, text)| text.to_string())
            .collect()
    }

    /// Fixed-width summary `"H MTS FRE"`
    ///
    /// H homed; M moving, T tracking, S settled; F/R forward/reverse limit
    /// switch, E excessive position error. Clear flags print as `-`.
    pub fn short_status(&self) -> String {
        let mark = |flag: bool, letter: char| if flag { letter } else { '-' };
        [
            mark(self.homed(), 'H'),
            ' ',
            mark(self.moving(), 'M'),
            mark(self.tracking(), 'T'),
            mark(self.settled(), 'S'),
            ' ',
            mark(self.forward_hardware_limit_switch_active(), 'F'),
            mark(self.reverse_hardware_limit_switch_active(), 'R'),
            mark(self.excessive_position_error(), 'E'),
        ]
        .iter()
        .collect()
    }
}

impl fmt::Display for ControllerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pos={:.2}mm vel={:.2}mm/s, flags={:?}",
            self.position(),
            self.velocity(),
            self.flag_strings()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageModel;
    use pretty_assertions::assert_eq;

    fn block(channel: u16, position: i32, velocity: i16, statusbits: u32) -> Vec<u8> {
        let mut data = vec![0u8; STATUS_SIZE];
        LittleEndian::write_u16(&mut data[0..2], channel);
        LittleEndian::write_i32(&mut data[2..6], position);
        LittleEndian::write_i16(&mut data[6..8], velocity);
        LittleEndian::write_u32(&mut data[10..14], statusbits);
        data
    }

    fn parse(data: &[u8]) -> ControllerStatus {
        let profile = StageModel::Mts50.profile().unwrap();
        ControllerStatus::parse(data, &profile).unwrap()
    }

    #[test]
    fn test_homed_and_moving_forward() {
        let status = parse(&block(1, 0, 0, 0x0000_0410));

        assert!(status.homed());
        assert!(status.moving_forward());
        assert!(status.moving());
        assert!(!status.moving_reverse());
        assert!(!status.forward_hardware_limit_switch_active());
        assert!(!status.reverse_hardware_limit_switch_active());
        assert!(!status.jogging_forward());
        assert!(!status.jogging_reverse());
        assert!(!status.homing());
        assert!(!status.tracking());
        assert!(!status.settled());
        assert!(!status.excessive_position_error());
        assert!(!status.motor_current_limit_reached());
        assert!(!status.channel_enabled());

        assert_eq!(
            status.flag_strings(),
            vec!["In motion, moving forward".to_string(), "Homed".to_string()]
        );
    }

    #[test]
    fn test_no_flags() {
        let status = parse(&block(1, 0, 0, 0));
        assert!(status.flag_strings().is_empty());
        assert!(!status.moving());
        assert_eq!(status.short_status(), "- --- ---");
    }

    #[test]
    fn test_every_flag_reported_in_table_order() {
        let all = FLAG_TABLE.iter().fold(0u32, |acc, (mask, _)| acc | mask);
        let status = parse(&block(1, 0, 0, all));
        let expected: Vec<String> = FLAG_TABLE.iter().map(|(_, t)| t.to_string()).collect();
        assert_eq!(status.flag_strings(), expected);
        assert_eq!(status.short_status(), "H MTS FRE");
    }

    #[test]
    fn test_position_and_velocity_scaling() {
        let status = parse(&block(1, 24576 * 10, -35, bits::MOVING_REVERSE));
        assert_eq!(status.channel, 1);
        assert_eq!(status.position(), 10.0);
        assert_eq!(status.velocity(), -3.5);
        assert!(!status.is_stationary());
        assert_eq!(status.short_status(), "- M-- ---");
    }

    #[test]
    fn test_custom_status_velocity_scale() {
        let profile = StageModel::Mts50
            .profile()
            .unwrap()
            .with_status_velocity_scale(4.0)
            .unwrap();
        let status = ControllerStatus::parse(&block(1, 0, -10, 0), &profile).unwrap();
        assert_eq!(status.velocity(), -2.5);
        assert_eq!(profile.status_velocity(8), 2.0);

        let default = parse(&block(1, 0, -10, 0));
        assert_eq!(default.velocity(), -1.0);

        assert!(profile.with_status_velocity_scale(0.0).is_err());
    }

    #[test]
    fn test_display() {
        let status = parse(&block(1, 24576, 0, bits::HOMED));
        assert_eq!(status.to_string(), "pos=1.00mm vel=0.00mm/s, flags=[\"Homed\"]");
    }

    #[test]
    fn test_short_block_rejected() {
        let profile = StageModel::Mts50.profile().unwrap();
        let err = ControllerStatus::parse(&[0u8; 10], &profile).unwrap_err();
        assert!(matches!(
            err,
            AptError::TruncatedFrame {
                expected: 14,
                actual: 10
            }
        ));
    }
}
