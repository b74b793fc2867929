//! Stage calibration
//!
//! Converts between physical units and controller (APT) units:
//! - Position: mm (or degrees on rotary stages) ↔ encoder counts
//! - Velocity: mm/s ↔ APT velocity units
//! - Acceleration: mm/s² ↔ APT acceleration units
//!
//! The conversion is always `physical = raw / scale` and `raw = physical * scale`.

use serde::{Deserialize, Serialize};

use crate::protocol::AptError;

/// Controller sampling interval used by the APT velocity/acceleration units
const SAMPLE_INTERVAL: f64 = 2048.0 / 6e6;

/// Divisor for the velocity reported in status updates.
///
/// Found by characterizing real stages; the scaling in the protocol manual does
/// not match measured speeds.
pub const STATUS_VELOCITY_SCALE: f64 = 10.0;

/// Known stage models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageModel {
    /// MTS50/M-Z8 motorized translation stage
    Mts50,
    /// LTS300 long travel stage
    Lts300,
    /// KDC101 driving a Z8-series actuator
    Kdc101,
    /// PRM1 rotation mount (degrees)
    Prm1,
    /// Unknown stage; no calibration, not usable for motion
    #[default]
    Generic,
}

impl StageModel {
    /// Human-readable model name
    pub fn name(&self) -> &'static str {
        match self {
            StageModel::Mts50 => "MTS50/M-Z8",
            StageModel::Lts300 => "LTS300",
            StageModel::Kdc101 => "KDC101",
            StageModel::Prm1 => "PRM1",
            StageModel::Generic => "generic",
        }
    }

    /// Whether positions are angles rather than distances
    pub fn is_rotary(&self) -> bool {
        matches!(self, StageModel::Prm1)
    }

    /// Calibration for this model, `None` for the generic stage
    pub fn profile(&self) -> Option<DeviceProfile> {
        match self {
            StageModel::Mts50 => {
                // 48 steps/rev, 256:1 gearbox, 0.5 mm pitch
                let enc = 48.0 * 256.0 * 2.0;
                Some(DeviceProfile::from_encoder(enc, (0.0, 50.0), 0.45, 0.45))
            }
            StageModel::Lts300 => Some(DeviceProfile {
                // Trinamic microstep units
                position_scale: 409600.0,
                velocity_scale: 21987328.0,
                acceleration_scale: 4506.0,
                status_velocity_scale: STATUS_VELOCITY_SCALE,
                linear_range: (0.0, 300.0),
                max_velocity: 5.0,
                max_acceleration: 5.0,
            }),
            StageModel::Kdc101 => Some(DeviceProfile::from_encoder(
                34304.0,
                (0.0, 50.0),
                0.48,
                0.48,
            )),
            StageModel::Prm1 => {
                // measured counts per degree
                Some(DeviceProfile::from_encoder(1919.2698, (-180.0, 180.0), 0.3, 0.3))
            }
            StageModel::Generic => None,
        }
    }
}

/// Scale and limit constants for one stage model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceProfile {
    position_scale: f64,
    velocity_scale: f64,
    acceleration_scale: f64,
    status_velocity_scale: f64,
    linear_range: (f64, f64),
    max_velocity: f64,
    max_acceleration: f64,
}

impl DeviceProfile {
    /// Build a calibration for a custom stage
    ///
    /// All scales and limits must be strictly positive and the range ordered.
    pub fn new(
        position_scale: f64,
        velocity_scale: f64,
        acceleration_scale: f64,
        linear_range: (f64, f64),
        max_velocity: f64,
        max_acceleration: f64,
    ) -> Result<Self, AptError> {
        for (name, value) in [
            ("position_scale", position_scale),
            ("velocity_scale", velocity_scale),
            ("acceleration_scale", acceleration_scale),
            ("max_velocity", max_velocity),
            ("max_acceleration", max_acceleration),
        ] {
            ensure_positive(name, value)?;
        }
        if !(linear_range.0 < linear_range.1) {
            return Err(AptError::InvalidPayload(format!(
                "linear range {:?} is empty",
                linear_range
            )));
        }

        Ok(Self {
            position_scale,
            velocity_scale,
            acceleration_scale,
            status_velocity_scale: STATUS_VELOCITY_SCALE,
            linear_range,
            max_velocity,
            max_acceleration,
        })
    }

    /// Calibration derived from encoder counts per unit, per the APT manual
    fn from_encoder(
        counts_per_unit: f64,
        linear_range: (f64, f64),
        max_velocity: f64,
        max_acceleration: f64,
    ) -> Self {
        Self {
            position_scale: counts_per_unit,
            velocity_scale: counts_per_unit * SAMPLE_INTERVAL * 65536.0,
            acceleration_scale: counts_per_unit * SAMPLE_INTERVAL * SAMPLE_INTERVAL * 65536.0,
            status_velocity_scale: STATUS_VELOCITY_SCALE,
            linear_range,
            max_velocity,
            max_acceleration,
        }
    }

    /// Replace the velocity/acceleration ceilings
    pub fn with_limits(mut self, max_velocity: f64, max_acceleration: f64) -> Result<Self, AptError> {
        ensure_positive("max_velocity", max_velocity)?;
        ensure_positive("max_acceleration", max_acceleration)?;
        self.max_velocity = max_velocity;
        self.max_acceleration = max_acceleration;
        Ok(self)
    }

    /// Replace the divisor applied to status-update velocities
    pub fn with_status_velocity_scale(mut self, scale: f64) -> Result<Self, AptError> {
        ensure_positive("status_velocity_scale", scale)?;
        self.status_velocity_scale = scale;
        Ok(self)
    }

    /// Encoder counts per mm (per degree on rotary stages)
    pub fn position_scale(&self) -> f64 {
        self.position_scale
    }

    /// APT velocity units per mm/s
    pub fn velocity_scale(&self) -> f64 {
        self.velocity_scale
    }

    /// APT acceleration units per mm/s²
    pub fn acceleration_scale(&self) -> f64 {
        self.acceleration_scale
    }

    /// Divisor for status-update velocities
    pub fn status_velocity_scale(&self) -> f64 {
        self.status_velocity_scale
    }

    /// Allowed (min, max) position
    pub fn linear_range(&self) -> (f64, f64) {
        self.linear_range
    }

    /// Velocity ceiling in mm/s
    pub fn max_velocity(&self) -> f64 {
        self.max_velocity
    }

    /// Acceleration ceiling in mm/s²
    pub fn max_acceleration(&self) -> f64 {
        self.max_acceleration
    }

    /// Convert a position to encoder counts (nearest count)
    pub fn to_raw_position(&self, mm: f64) -> i32 {
        to_counts(mm * self.position_scale)
    }

    /// Convert a position to encoder counts, rejecting targets that are not
    /// finite or do not fit the 32-bit position counter
    ///
    /// The linear range is not checked.
    pub fn try_to_raw_position(&self, mm: f64) -> Result<i32, AptError> {
        let counts = (mm * self.position_scale).round();
        if !counts.is_finite() || counts < f64::from(i32::MIN) || counts > f64::from(i32::MAX) {
            let (min, max) = self.linear_range;
            return Err(AptError::OutOfRange {
                requested: mm,
                min,
                max,
            });
        }
        Ok(counts as i32)
    }

    /// Convert encoder counts to a position
    pub fn to_mm(&self, raw: i32) -> f64 {
        f64::from(raw) / self.position_scale
    }

    /// Convert a velocity to APT units
    pub fn to_raw_velocity(&self, mm_per_s: f64) -> i32 {
        to_counts(mm_per_s * self.velocity_scale)
    }

    /// Convert APT velocity units to mm/s
    pub fn velocity_from_raw(&self, raw: i32) -> f64 {
        f64::from(raw) / self.velocity_scale
    }

    /// Convert an acceleration to APT units
    pub fn to_raw_acceleration(&self, mm_per_s2: f64) -> i32 {
        to_counts(mm_per_s2 * self.acceleration_scale)
    }

    /// Convert APT acceleration units to mm/s²
    pub fn acceleration_from_raw(&self, raw: i32) -> f64 {
        f64::from(raw) / self.acceleration_scale
    }

    /// Convert a status-update velocity to mm/s
    pub fn status_velocity(&self, raw: i16) -> f64 {
        f64::from(raw) / self.status_velocity_scale
    }

    /// Whole encoder counts lying inside the linear range
    pub fn raw_range(&self) -> (i32, i32) {
        let (min, max) = self.linear_range;
        (
            to_counts((min * self.position_scale).ceil()),
            to_counts((max * self.position_scale).floor()),
        )
    }

    /// Encoder count for a target, checked against the linear range
    ///
    /// Targets inside the range map to the nearest count that is also inside
    /// it, so both range ends are accepted at any scale. A target that rounds
    /// onto the range end from less than half a count outside is accepted too.
    pub fn checked_raw_position(&self, mm: f64) -> Result<i32, AptError> {
        let (min, max) = self.linear_range;
        let out_of_range = || AptError::OutOfRange {
            requested: mm,
            min,
            max,
        };
        if !mm.is_finite() {
            return Err(out_of_range());
        }

        let (raw_min, raw_max) = self.raw_range();
        if raw_min > raw_max {
            // range narrower than one count
            return Err(out_of_range());
        }
        let raw = self.to_raw_position(mm);
        if (min..=max).contains(&mm) {
            return Ok(raw.clamp(raw_min, raw_max));
        }
        if (raw_min..=raw_max).contains(&raw) {
            return Ok(raw);
        }
        Err(out_of_range())
    }

    /// Check a target against the linear range at controller resolution
    ///
    /// The result is exactly the position the controller will be asked to
    /// reach.
    pub fn clamp_position(&self, mm: f64) -> Result<f64, AptError> {
        self.checked_raw_position(mm).map(|raw| self.to_mm(raw))
    }

    /// Limit a home offset to 0..=max of the linear range
    pub fn clamp_offset(&self, mm: f64) -> f64 {
        mm.min(self.linear_range.1).max(0.0)
    }

    /// Limit a velocity to the stage maximum
    pub fn clamp_velocity(&self, mm_per_s: f64) -> f64 {
        mm_per_s.min(self.max_velocity)
    }

    /// Limit an acceleration to the stage maximum
    pub fn clamp_acceleration(&self, mm_per_s2: f64) -> f64 {
        mm_per_s2.min(self.max_acceleration)
    }
}

/// Round to the nearest count, saturating at the `i32` bounds
fn to_counts(value: f64) -> i32 {
    value.round() as i32
}

fn ensure_positive(name: &str, value: f64) -> Result<(), AptError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(AptError::InvalidPayload(format!(
            "{} must be positive, got {}",
            name, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mts50() -> DeviceProfile {
        StageModel::Mts50.profile().unwrap()
    }

    #[test]
    fn test_mts50_constants() {
        let p = mts50();
        assert_eq!(p.position_scale(), 24576.0);
        assert!((p.velocity_scale() - 24576.0 * 2048.0 / 6e6 * 65536.0).abs() < 1e-6);
        assert_eq!(p.linear_range(), (0.0, 50.0));
        assert_eq!(p.status_velocity_scale(), 10.0);
    }

    #[test]
    fn test_rotary_models() {
        assert!(StageModel::Prm1.is_rotary());
        assert!(!StageModel::Mts50.is_rotary());
        assert!(!StageModel::Lts300.is_rotary());
    }

    #[test]
    fn test_generic_has_no_profile() {
        assert!(StageModel::Generic.profile().is_none());
        assert_eq!(StageModel::default(), StageModel::Generic);
    }

    #[test]
    fn test_position_roundtrip_within_one_count() {
        for model in [StageModel::Mts50, StageModel::Lts300, StageModel::Kdc101, StageModel::Prm1] {
            let p = model.profile().unwrap();
            let (min, max) = p.linear_range();
            for i in 0..=1000 {
                let mm = min + (max - min) * f64::from(i) / 1000.0;
                let back = p.to_mm(p.to_raw_position(mm));
                assert!(
                    (back - mm).abs() < 1.0 / p.position_scale(),
                    "{:?}: {} -> {}",
                    model,
                    mm,
                    back
                );
            }
        }
    }

    #[test]
    fn test_clamp_accepts_boundaries() {
        for model in [StageModel::Mts50, StageModel::Lts300, StageModel::Kdc101, StageModel::Prm1] {
            let p = model.profile().unwrap();
            let (min, max) = p.linear_range();
            assert!(p.clamp_position(min).is_ok(), "{:?} min", model);
            assert!(p.clamp_position(max).is_ok(), "{:?} max", model);
        }
        assert_eq!(mts50().clamp_position(50.0).unwrap(), 50.0);
    }

    #[test]
    fn test_clamp_rejects_outside() {
        let p = mts50();
        match p.clamp_position(50.1) {
            Err(AptError::OutOfRange { requested, min, max }) => {
                assert_eq!(requested, 50.1);
                assert_eq!((min, max), (0.0, 50.0));
            }
            other => panic!("expected OutOfRange, got {:?}", other),
        }
        assert!(p.clamp_position(-0.01).is_err());
        assert!(p.clamp_position(f64::NAN).is_err());
    }

    #[test]
    fn test_clamp_snaps_sub_count_overshoot() {
        // Less than half a count past the end rounds onto the boundary
        let p = mts50();
        let snapped = p.clamp_position(50.0 + 0.4 / p.position_scale()).unwrap();
        assert_eq!(snapped, 50.0);
        assert!(p.clamp_position(50.0 + 0.6 / p.position_scale()).is_err());
    }

    #[test]
    fn test_range_ends_stay_inside_at_fractional_scale() {
        let p = StageModel::Prm1.profile().unwrap();
        // -180 * 1919.2698 = -345468.564, nearest count lies outside
        assert_eq!(p.to_raw_position(-180.0), -345_469);
        assert_eq!(p.raw_range(), (-345_468, 345_468));
        assert_eq!(p.checked_raw_position(-180.0).unwrap(), -345_468);
        assert_eq!(p.checked_raw_position(180.0).unwrap(), 345_468);
        assert!(p.clamp_position(-180.0).unwrap() >= -180.0);
        assert!(p.checked_raw_position(-180.001).is_err());
    }

    #[test]
    fn test_rounding_to_nearest_count() {
        let p = StageModel::Lts300.profile().unwrap();
        // 128.7 * 409600 lands just below a whole count in floating point
        assert_eq!(p.to_raw_position(128.7), 52_715_520);
        assert_eq!(mts50().to_raw_position(-1.0), -24576);
        assert_eq!(mts50().to_raw_velocity(0.0), 0);
    }

    #[test]
    fn test_non_finite_targets_rejected() {
        let p = mts50();
        assert!(p.checked_raw_position(f64::INFINITY).is_err());
        assert!(p.checked_raw_position(f64::NEG_INFINITY).is_err());
        assert!(p.checked_raw_position(f64::NAN).is_err());

        assert!(p.try_to_raw_position(f64::NAN).is_err());
        assert!(p.try_to_raw_position(f64::INFINITY).is_err());
        assert!(p.try_to_raw_position(1e6).is_err());
        assert_eq!(p.try_to_raw_position(60.0).unwrap(), 1_474_560);
    }

    #[test]
    fn test_offset_and_velocity_clamps() {
        let p = mts50();
        assert_eq!(p.clamp_offset(-3.0), 0.0);
        assert_eq!(p.clamp_offset(80.0), 50.0);
        assert_eq!(p.clamp_offset(12.5), 12.5);
        assert_eq!(p.clamp_velocity(10.0), 0.45);
        assert_eq!(p.clamp_acceleration(0.1), 0.1);
    }

    #[test]
    fn test_custom_profile_validation() {
        assert!(DeviceProfile::new(1000.0, 1.0, 1.0, (0.0, 10.0), 1.0, 1.0).is_ok());
        assert!(DeviceProfile::new(0.0, 1.0, 1.0, (0.0, 10.0), 1.0, 1.0).is_err());
        assert!(DeviceProfile::new(1000.0, 1.0, 1.0, (10.0, 0.0), 1.0, 1.0).is_err());
        assert!(mts50().with_limits(-1.0, 1.0).is_err());
        assert_eq!(mts50().with_limits(0.2, 0.1).unwrap().max_velocity(), 0.2);
    }

    #[test]
    fn test_velocity_conversions() {
        let p = StageModel::Lts300.profile().unwrap();
        assert_eq!(p.to_raw_velocity(1.0), 21987328);
        assert_eq!(p.velocity_from_raw(21987328), 1.0);
        assert_eq!(p.to_raw_acceleration(2.0), 9012);
        assert_eq!(p.status_velocity(-25), -2.5);
    }
}
