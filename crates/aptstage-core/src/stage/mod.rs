//! Stage Model
//!
//! Per-model calibration and the fixed-layout data blocks a controller sends
//! back: status updates, hardware info, homing and velocity parameters.

pub mod info;
pub mod params;
pub mod profile;
pub mod status;

pub use info::HardwareInfo;
pub use params::{HomeParams, PositionCounter, VelocityParams, VelocityProfile};
pub use profile::{DeviceProfile, StageModel};
pub use status::ControllerStatus;

use crate::protocol::AptError;

/// Fail with `TruncatedFrame` unless `data` holds at least `len` bytes
pub(crate) fn ensure_len(data: &[u8], len: usize) -> Result<(), AptError> {
    if data.len() < len {
        return Err(AptError::TruncatedFrame {
            expected: len,
            actual: data.len(),
        });
    }
    Ok(())
}
