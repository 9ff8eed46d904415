//! Continuous controllers such as the hi-hat pedal.
//!
//! There is no peak/scan/mask cycle here: the position is evaluated every cycle. A "hit" is the
//! chick of a closing hi-hat.

use super::PadInput;
use crate::hihat::{pedal_percent, reduce_noise};
use crate::io::DrumIo;
use crate::pad::DrumPad;
use crate::pin::ReadFlags;
use crate::scale::scale_and_curve;
use crate::types::TimeUs;

pub fn sense<IO: DrumIo>(pad: &mut DrumPad, now: TimeUs, input: &mut PadInput<'_, IO>) {
    if !pad.is_connector_active() {
        return;
    }

    let raw = input.read(0, ReadFlags::CONTROLLER);
    let denoised = reduce_noise(raw, pad.sensor_values[0], pad.settings.move_detect_tolerance);
    pad.sensor_values[0] = denoised;
    pad.sensor_values[1] = raw;

    pad.clear_hits();

    let (min, max) = (pad.settings.zone_thresholds_min[0], pad.settings.zone_thresholds_max[0]);
    let percent = pedal_percent(denoised, min, max);
    if let Some(velocity) = pad.hihat.update_position(now / 1000, percent, &pad.settings) {
        pad.hit_velocities[0] = velocity;
        pad.hits[0] = velocity > 0;
    }

    let cc = scale_and_curve(denoised, min, max, pad.settings.curve_type);
    pad.hihat.update_cc(cc);
}
