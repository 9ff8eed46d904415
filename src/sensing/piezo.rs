//! Pads where every zone is a piezo (drum heads and rims, piezo-only cymbals).

use super::{PadInput, SensingState, mask_active, scan_active};
use crate::io::DrumIo;
use crate::pad::DrumPad;
use crate::pin::ReadFlags;
use crate::scale::{curve, scale};
use crate::types::{MAX_ZONES, TimeUs};

/// Factor applied to the preferred zone at a head/rim bias of ±100.
const MAX_PREFERENCE_MULT: u32 = 5;

pub fn sense<IO: DrumIo>(pad: &mut DrumPad, now: TimeUs, input: &mut PadInput<'_, IO>) {
    if !pad.is_connector_active() {
        return;
    }

    let flags = ReadFlags::auto_calibrate(pad.auto_calibrate());
    for zone in 0..pad.active_zone_count() {
        pad.sensor_values[zone] = input.read(zone, flags);
    }
    pad.clear_hits();

    pad.sensing_state = match pad.sensing_state {
        SensingState::PeakDetect => peak_detect(pad, now),
        SensingState::Scan => scan(pad, now),
        SensingState::Mask if mask_active(pad, now) => SensingState::Mask,
        SensingState::Mask => SensingState::PeakDetect,
    };
}

fn peak_detect(pad: &mut DrumPad, now: TimeUs) -> SensingState {
    let zones = pad.active_zone_count();
    let detected = (0..zones).any(|zone| pad.sensor_values[zone] >= pad.settings.zone_thresholds_min[zone]);
    if !detected {
        return SensingState::PeakDetect;
    }

    pad.hit_time_us = now;
    pad.max_zone_values[..zones].copy_from_slice(&pad.sensor_values[..zones]);
    SensingState::Scan
}

fn scan(pad: &mut DrumPad, now: TimeUs) -> SensingState {
    let zones = pad.active_zone_count();
    for zone in 0..zones {
        pad.max_zone_values[zone] = pad.max_zone_values[zone].max(pad.sensor_values[zone]);
    }

    if scan_active(pad, now) {
        return SensingState::Scan;
    }

    pad.scan_end_us = now;

    let mut evaluation = [0u32; MAX_ZONES];
    for zone in 0..zones {
        let scaled = scale(
            pad.max_zone_values[zone],
            pad.settings.zone_thresholds_min[zone],
            pad.settings.zone_thresholds_max[zone],
        );
        evaluation[zone] = scaled as u32;
        pad.hit_velocities[zone] = curve(scaled, pad.settings.curve_type);
    }

    let hit_zone = determine_hit_zone(&mut evaluation[..zones], pad.settings.head_rim_bias);
    pad.hits[hit_zone] = true;

    log::debug!(
        "[Hit '{}' {}] head: {}/127 ({}) rim: {}/127 ({})",
        pad.name(),
        if hit_zone == 0 { "Head" } else { "Rim" },
        pad.hit_velocities[0],
        pad.max_zone_values[0],
        if zones >= 2 { pad.hit_velocities[1] } else { 0 },
        if zones >= 2 { pad.max_zone_values[1] } else { 0 },
    );

    SensingState::Mask
}

/// Picks the winning zone. The preferred zone (head for a negative bias, rim otherwise) is boosted
/// by up to 5x before the comparison and wins ties.
fn determine_hit_zone(evaluation: &mut [u32], head_rim_bias: i8) -> usize {
    if evaluation.len() <= 1 {
        return 0;
    }

    let preferred = if head_rim_bias < 0 { 0 } else { 1 };
    let bias = head_rim_bias.unsigned_abs() as u32;
    evaluation[preferred] += evaluation[preferred] * MAX_PREFERENCE_MULT * bias / 100;

    let mut max_index = preferred;
    for (index, &value) in evaluation.iter().enumerate() {
        if value > evaluation[max_index] {
            max_index = index;
        }
    }
    max_index
}
