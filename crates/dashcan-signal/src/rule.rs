use std::fmt;

use serde::Serialize;

/// Engine speed frame.
pub const ENGINE_RPM_ID: u32 = 0xAA;
/// Vehicle speed frame.
pub const VEHICLE_SPEED_ID: u32 = 0x1B4;
/// Engine coolant temperature frame.
pub const ENGINE_TEMPERATURE_ID: u32 = 0x1D0;
/// Park distance control sensor frame.
pub const PARK_DISTANCE_ID: u32 = 0x1C2;
/// Multi-function steering wheel button frame.
pub const STEERING_WHEEL_ID: u32 = 0x1D6;

/// Upper bounds (exclusive) of the calibrated values.
pub const MAX_RPM: i64 = 5000;
pub const MAX_SPEED: i64 = 260;
pub const MAX_ENGINE_TEMP: i64 = 150;

/// Stored value before the first decode.
pub const UNSET_VALUE: i64 = -1;

/// The physical signal a rule decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    EngineRpm,
    VehicleSpeed,
    EngineTemperature,
    ParkDistance,
    SteeringWheel,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::EngineRpm => "rpm",
            SignalKind::VehicleSpeed => "speed",
            SignalKind::EngineTemperature => "engine temp",
            SignalKind::ParkDistance => "pdc",
            SignalKind::SteeringWheel => "mfl",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One identifier's decode descriptor plus its last seen value.
///
/// Extraction is `(word >> shift) & mask` on the payload word; the kind
/// selects the calibration applied afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalRule {
    pub id: u32,
    pub kind: SignalKind,
    /// Required payload length in bytes.
    pub len: usize,
    pub shift: u32,
    pub mask: u64,
    /// Valid calibrated range is `[0, bound)`; `None` skips validation.
    pub bound: Option<i64>,
    /// Last decoded value, [`UNSET_VALUE`] until the first change.
    pub last: i64,
}

impl SignalRule {
    pub fn new(id: u32, kind: SignalKind) -> Self {
        let (len, shift, mask, bound) = match kind {
            SignalKind::EngineRpm => (8, 16, 0xFFFF, Some(MAX_RPM)),
            SignalKind::VehicleSpeed => (8, 48, 0xFFFF, Some(MAX_SPEED)),
            SignalKind::EngineTemperature => (8, 56, 0xFF, Some(MAX_ENGINE_TEMP)),
            SignalKind::ParkDistance => (8, 32, 0xFFFF_FFFF, None),
            SignalKind::SteeringWheel => (2, 0, 0xFFFF, None),
        };
        Self {
            id,
            kind,
            len,
            shift,
            mask,
            bound,
            last: UNSET_VALUE,
        }
    }

    /// The raw field, before calibration.
    pub fn extract(&self, word: u64) -> u64 {
        (word >> self.shift) & self.mask
    }

    /// Convert a raw field into physical units.
    ///
    /// RPM and speed arrive little-endian inside a big-endian word, so both
    /// are byte-swapped as signed 16-bit values. Integer steps narrow the way
    /// the dashboard firmware does: wrapping subtraction, truncating division,
    /// and a truncating float-to-int cast for the mph to km/h factor.
    pub fn calibrate(&self, raw: u64) -> i64 {
        match self.kind {
            SignalKind::EngineRpm => {
                let value = (raw as u16 as i16).swap_bytes();
                i64::from(value / 4)
            }
            SignalKind::VehicleSpeed => {
                let value = (raw as u16 as i16).wrapping_sub(192).swap_bytes() / 16;
                i64::from((f32::from(value) * 1.6) as i16)
            }
            SignalKind::EngineTemperature => i64::from((raw as u8 as i8).wrapping_sub(48)),
            SignalKind::ParkDistance | SignalKind::SteeringWheel => raw as i64,
        }
    }

    /// True if `value` lies in the rule's valid range.
    pub fn in_range(&self, value: i64) -> bool {
        match self.bound {
            Some(bound) => (0..bound).contains(&value),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpm_is_byte_swapped_then_quartered() {
        let rule = SignalRule::new(ENGINE_RPM_ID, SignalKind::EngineRpm);
        let raw = rule.extract(0x0000_0000_340D_0000);
        assert_eq!(raw, 0x340D);
        assert_eq!(rule.calibrate(raw), 845);
    }

    #[test]
    fn speed_offset_swap_divide_and_scale() {
        let rule = SignalRule::new(VEHICLE_SPEED_ID, SignalKind::VehicleSpeed);
        let raw = rule.extract(0x20C4_0000_0000_0000);
        assert_eq!(raw, 0x20C4);
        // 0x20C4 - 192 = 0x2004, swapped 0x0420 = 1056, / 16 = 66, * 1.6 = 105.6
        assert_eq!(rule.calibrate(raw), 105);
    }

    #[test]
    fn negative_speed_stays_negative() {
        let rule = SignalRule::new(VEHICLE_SPEED_ID, SignalKind::VehicleSpeed);
        // 0x0000 - 192 = 0xFF40, swapped 0x40FF = 16639, / 16 = 1039, * 1.6 = 1662
        assert_eq!(rule.calibrate(0x0000), 1662);
        // 0x00C0 - 192 = 0, 0x00BF - 192 = -1 swapped is still -1, / 16 = 0
        assert_eq!(rule.calibrate(0x00C0), 0);
        assert_eq!(rule.calibrate(0x00BF), 0);
        assert!(!rule.in_range(1662));
    }

    #[test]
    fn temperature_is_signed_byte_offset() {
        let rule = SignalRule::new(ENGINE_TEMPERATURE_ID, SignalKind::EngineTemperature);
        assert_eq!(rule.calibrate(rule.extract(0x8B00_0000_0000_0000)), 91);
        assert_eq!(rule.calibrate(rule.extract(0)), -48);
        // 0x10 - 48 wraps through the signed byte.
        assert_eq!(rule.calibrate(0x10), -32);
        assert_eq!(rule.calibrate(0xF0), -64);
    }

    #[test]
    fn park_distance_takes_high_half() {
        let rule = SignalRule::new(PARK_DISTANCE_ID, SignalKind::ParkDistance);
        let raw = rule.extract(0x8D72_5B5A_FFFF_FFFF);
        assert_eq!(raw, 0x8D72_5B5A);
        assert_eq!(rule.calibrate(raw), 0x8D72_5B5A);
        assert!(rule.in_range(i64::MAX));
    }

    #[test]
    fn ranges_are_half_open() {
        let rule = SignalRule::new(ENGINE_RPM_ID, SignalKind::EngineRpm);
        assert!(rule.in_range(0));
        assert!(rule.in_range(4999));
        assert!(!rule.in_range(5000));
        assert!(!rule.in_range(-1));
    }

    #[test]
    fn steering_wheel_rule_is_two_bytes() {
        let rule = SignalRule::new(STEERING_WHEEL_ID, SignalKind::SteeringWheel);
        assert_eq!(rule.len, 2);
        assert_eq!(rule.extract(0xC001), 0xC001);
        assert_eq!(rule.last, UNSET_VALUE);
    }
}
