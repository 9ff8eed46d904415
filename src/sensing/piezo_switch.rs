//! Cymbals with a piezo on the bow and switches on edge and cup.
//!
//! Only the piezo delivers a velocity. Switch zones count the cycles they were pressed during the
//! scan window and the most pressed switch decides the zone. A scan that ends without any piezo
//! signal while the choke switch was pressed is a choke.

use super::{PadInput, SensingState, mask_active, scan_active};
use crate::io::DrumIo;
use crate::pad::{DrumPad, LastCymbalEvent};
use crate::pin::ReadFlags;
use crate::scale::scale_and_curve;
use crate::settings::{ChokeType, ZonesType};
use crate::types::{MAX_ZONES, TimeUs, ZoneIndex};

const MAIN_PIEZO: ZoneIndex = 0;
const SWITCH_ZONE_OFFSET: ZoneIndex = 1;

pub fn sense<IO: DrumIo>(pad: &mut DrumPad, now: TimeUs, input: &mut PadInput<'_, IO>) {
    if !pad.is_connector_active() {
        return;
    }

    pad.clear_hits();
    pad.cymbal.is_choked = false;
    read_input_values(pad, input);

    pad.sensing_state = match pad.sensing_state {
        SensingState::PeakDetect => detect_peak(pad, now),
        SensingState::Scan => scan(pad, now),
        SensingState::Mask if mask_active(pad, now) => SensingState::Mask,
        SensingState::Mask => SensingState::PeakDetect,
    };
}

fn read_input_values<IO: DrumIo>(pad: &mut DrumPad, input: &mut PadInput<'_, IO>) {
    let single_trs = pad.settings.zones_type == ZonesType::Zones3PiezoAndSwitches1Trs;
    for pin in 0..pad.active_pin_count() {
        let value = input.read(pin, ReadFlags::NONE);

        if single_trs && pin == 1 {
            // edge and cup share the ring, the cup switch gives the higher voltage
            let zone = if value >= pad.settings.zone_thresholds_min[2] { 2 } else { 1 };
            pad.sensor_values[zone] = value;
            pad.sensor_values[3 - zone] = 0;
        } else {
            pad.sensor_values[pin] = value;
        }
    }
}

fn is_switch_pressed(pad: &DrumPad, zone: ZoneIndex) -> bool {
    pad.sensor_values[zone] >= pad.settings.zone_thresholds_min[zone]
}

fn is_choke_switch_pressed(pad: &DrumPad) -> bool {
    let zone = match pad.settings.choke_type {
        ChokeType::None => return false,
        ChokeType::SwitchEdge => 1,
        ChokeType::SwitchCup => 2,
    };
    pad.active_zone_count() > zone && is_switch_pressed(pad, zone)
}

fn detect_peak(pad: &mut DrumPad, now: TimeUs) -> SensingState {
    let peak = is_switch_pressed(pad, MAIN_PIEZO);
    // not sure yet whether it is choked, a hit may still follow within the scan window
    let maybe_choked = is_choke_switch_pressed(pad);
    if !peak && !maybe_choked {
        return SensingState::PeakDetect;
    }

    pad.hit_time_us = now;
    pad.max_zone_values = [0; MAX_ZONES];
    update_max_values(pad);
    SensingState::Scan
}

fn scan(pad: &mut DrumPad, now: TimeUs) -> SensingState {
    update_max_values(pad);

    if scan_active(pad, now) {
        return SensingState::Scan;
    }

    pad.scan_end_us = now;

    let max_piezo = pad.max_zone_values[MAIN_PIEZO];
    let hit_zone = find_hit_zone(pad);

    if max_piezo == 0 {
        if pad.cymbal.last_event == LastCymbalEvent::Choked {
            // Already choked: skip the mask so a hit while still holding the cymbal is not
            // swallowed by repeated choke scans.
            return SensingState::PeakDetect;
        }
        pad.cymbal.is_choked = true;
        pad.cymbal.last_event = LastCymbalEvent::Choked;
        log::debug!("[Choked '{}']", pad.name());
    } else {
        pad.hit_velocities[hit_zone] = scale_and_curve(
            max_piezo,
            pad.settings.zone_thresholds_min[MAIN_PIEZO],
            pad.settings.zone_thresholds_max[MAIN_PIEZO],
            pad.settings.curve_type,
        );
        pad.hits[hit_zone] = true;
        pad.cymbal.last_event = LastCymbalEvent::Hit;
        log::debug!(
            "[Hit '{}' {}] {}/127 (piezo {}, edge {}, cup {})",
            pad.name(),
            ["Bow", "Edge", "Cup"][hit_zone],
            pad.hit_velocities[hit_zone],
            max_piezo,
            pad.max_zone_values[1],
            pad.max_zone_values[2],
        );
    }

    SensingState::Mask
}

fn update_max_values(pad: &mut DrumPad) {
    // below threshold the piezo may just be choked, keep the maximum at 0 then
    let piezo = pad.sensor_values[MAIN_PIEZO];
    if piezo > pad.max_zone_values[MAIN_PIEZO] && is_switch_pressed(pad, MAIN_PIEZO) {
        pad.max_zone_values[MAIN_PIEZO] = piezo;
    }

    for zone in SWITCH_ZONE_OFFSET..pad.active_zone_count() {
        if is_switch_pressed(pad, zone) {
            pad.max_zone_values[zone] = pad.max_zone_values[zone].saturating_add(1);
        }
    }
}

/// The most pressed switch, or the bow if no switch was pressed. Earlier switches win ties.
fn find_hit_zone(pad: &DrumPad) -> ZoneIndex {
    let zones = pad.active_zone_count();
    if zones <= SWITCH_ZONE_OFFSET {
        return MAIN_PIEZO;
    }

    let presses = &pad.max_zone_values[SWITCH_ZONE_OFFSET..zones];
    let mut max_index = 0;
    for (index, &count) in presses.iter().enumerate() {
        if count > presses[max_index] {
            max_index = index;
        }
    }

    if presses[max_index] > 0 { max_index + SWITCH_ZONE_OFFSET } else { MAIN_PIEZO }
}
