//! Hardware information block (reply to HW_REQ_INFO)

use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;

use super::ensure_len;
use crate::protocol::AptError;

/// Size of the hardware information block
pub const INFO_SIZE: usize = 84;

/// Identity and firmware details reported by a controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HardwareInfo {
    /// Serial number printed on the unit
    pub serial_number: u32,
    /// Model name, e.g. `TDC001`
    pub model: String,
    /// 44 for brushless DC controllers, 45 for multi-channel motherboards
    pub hardware_type: u16,
    /// Firmware version as `major.interim.minor`
    pub firmware_version: String,
    /// Free-text notes
    pub notes: String,
    /// Hardware revision
    pub hardware_version: u16,
    /// Modification state of the hardware
    pub modification_state: u16,
    /// Number of motor channels
    pub channels: u16,
}

impl HardwareInfo {
    /// Decode the 84-byte information block
    ///
    /// Layout: serial (4), model (8), type (2), firmware minor/interim/major
    /// plus one pad byte (4), notes (48), reserved (12), hardware version (2),
    /// modification state (2), channel count (2).
    pub fn parse(data: &[u8]) -> Result<Self, AptError> {
        ensure_len(data, INFO_SIZE)?;

        let firmware = &data[14..18];
        let firmware_version = format!("{}.{}.{}", firmware[2], firmware[1], firmware[0]);

        Ok(Self {
            serial_number: LittleEndian::read_u32(&data[0..4]),
            model: text_field(&data[4..12]),
            hardware_type: LittleEndian::read_u16(&data[12..14]),
            firmware_version,
            notes: text_field(&data[18..66]),
            // data[66..78] reserved
            hardware_version: LittleEndian::read_u16(&data[78..80]),
            modification_state: LittleEndian::read_u16(&data[80..82]),
            channels: LittleEndian::read_u16(&data[82..84]),
        })
    }
}

/// NUL-padded text up to the first NUL
fn text_field(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}
