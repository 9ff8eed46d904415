//! Velocity scaling and curves.
//!
//! A conditioned peak is first mapped from the pad's calibrated `min..max` window onto the full
//! sensor range ([`scale`]) and then bent into a 7-bit MIDI value ([`curve`]).

use num_traits::Float;

use crate::settings::CurveType;
use crate::types::{MAX_SENSOR_VALUE, MAX_VELOCITY, SensorValue, Velocity};

/// Maps `value` from `min..=max` onto `0..=1023`.
///
/// Values below `min` map to 0, values at or above `max` to 1023. `min` itself maps to 1 so that
/// a reading right at the threshold is never mistaken for silence.
pub fn scale(value: SensorValue, min: SensorValue, max: SensorValue) -> SensorValue {
    if value == 0 || value < min {
        return 0;
    } else if value >= max {
        return MAX_SENSOR_VALUE;
    }

    const OUT_MIN: u32 = 1;
    let scaled = (value - min) as u32 * (MAX_SENSOR_VALUE as u32 - OUT_MIN) / (max - min) as u32;
    (scaled + OUT_MIN) as SensorValue
}

/// Bends a scaled value (`0..=1023`) into a MIDI velocity (`0..=127`).
///
/// Zero is always silence; every other input yields at least 1.
pub fn curve(value: SensorValue, curve_type: CurveType) -> Velocity {
    if value == 0 {
        return 0;
    }
    let value = value.min(MAX_SENSOR_VALUE);

    match curve_type {
        CurveType::Linear => {
            // 10 to 7 bit
            let result = ((value - 1) >> 3) + 1;
            result.min(MAX_VELOCITY as SensorValue) as Velocity
        }
        CurveType::Exponential1 => curve_func(value, 1.002),
        CurveType::Exponential2 => curve_func(value, 1.004),
        CurveType::Logarithmic1 => curve_func(value, 0.998),
        CurveType::Logarithmic2 => curve_func(value, 0.996),
    }
}

/// [`scale`] followed by [`curve`].
pub fn scale_and_curve(
    value: SensorValue,
    min: SensorValue,
    max: SensorValue,
    curve_type: CurveType,
) -> Velocity {
    curve(scale(value, min, max), curve_type)
}

/// `base^(x-1)` normalized against `base^1022`, mapped onto `1..=127`.
///
/// Bases above one give a concave-up (exponential) response, bases below one a concave-down
/// (logarithmic) one.
fn curve_func(value: SensorValue, base: f64) -> Velocity {
    let curve_value = Float::powi(base, value as i32 - 1) - 1.0;
    let curve_max = Float::powi(base, MAX_SENSOR_VALUE as i32 - 1) - 1.0;
    let output = curve_value / curve_max * (MAX_VELOCITY - 1) as f64;
    (Float::round(output) as Velocity).min(MAX_VELOCITY - 1) + 1
}
