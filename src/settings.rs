//! Per-pad calibration settings and note mappings.

use serde::{Deserialize, Serialize};

use crate::types::{MAX_SENSOR_VALUE, MAX_ZONES, MidiNote, SensorValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PadType {
    #[default]
    Drum,
    Cymbal,
    /// Only sensed through the cymbal it is paired with.
    Pedal,
}

/// Number and kind of zone sensors of a pad.
///
/// A snare with head and rim has two zones, a kick drum one. A pedal always has a single
/// zone: its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ZonesType {
    Zones1Controller,
    #[default]
    Zones1Piezo,
    Zones2Piezos,
    Zones2PiezoAndSwitch,
    Zones3Piezos,
    /// Three zones on two TRS jacks (separate edge and cup switch pins).
    Zones3PiezoAndSwitches2Trs,
    /// Three zones on a single TRS jack, edge and cup switches share one pin.
    Zones3PiezoAndSwitches1Trs,
}

impl ZonesType {
    pub fn zone_count(self) -> usize {
        match self {
            Self::Zones2Piezos | Self::Zones2PiezoAndSwitch => 2,
            Self::Zones3Piezos
            | Self::Zones3PiezoAndSwitches1Trs
            | Self::Zones3PiezoAndSwitches2Trs => 3,
            Self::Zones1Controller | Self::Zones1Piezo => 1,
        }
    }

    /// Pins needed to sense every zone. Equals the zone count except for 1TRS cymbals.
    pub fn required_pin_count(self) -> usize {
        match self {
            Self::Zones3PiezoAndSwitches1Trs => 2,
            _ => self.zone_count(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChokeType {
    #[default]
    None,
    /// Choke by grabbing the edge (rim switch).
    SwitchEdge,
    /// Choke by grabbing the cup (cup switch).
    SwitchCup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CurveType {
    #[default]
    Linear,
    Exponential1,
    Exponential2,
    Logarithmic1,
    Logarithmic2,
}

pub const THRESHOLD_MIN_DEFAULT: SensorValue = MAX_SENSOR_VALUE / 2;
pub const THRESHOLD_MAX_DEFAULT: SensorValue = MAX_SENSOR_VALUE;

/// Calibration of a single pad.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DrumSettings {
    pub pad_type: PadType,
    pub zones_type: ZonesType,
    pub choke_type: ChokeType,
    pub curve_type: CurveType,

    pub zone_thresholds_min: [SensorValue; MAX_ZONES],
    pub zone_thresholds_max: [SensorValue; MAX_ZONES],

    /// Peak search window after the first threshold crossing (drum, cymbal).
    pub scan_time_us: u16,
    /// Debounce window after a hit (drum, cymbal).
    pub mask_time_ms: u8,

    /// Head/rim preference, `-100` (head) ..= `100` (rim).
    pub head_rim_bias: i8,
    /// Stored and round-tripped with the kit configuration. The sensing does not detect cross
    /// sticks yet, so the flag has no effect on hits.
    pub cross_note_enabled: bool,

    /// Relative position (% of the min/max range) from which the hi-hat counts as almost closed.
    pub almost_closed_threshold: f32,
    /// Relative position (% of the min/max range) from which the hi-hat counts as closed.
    pub closed_threshold: f32,
    pub move_detect_tolerance: SensorValue,
    pub chick_detect_timeout_ms: u8,
}

impl DrumSettings {
    pub fn zone_count(&self) -> usize {
        self.zones_type.zone_count()
    }
}

impl Default for DrumSettings {
    fn default() -> Self {
        Self {
            pad_type: PadType::default(),
            zones_type: ZonesType::default(),
            choke_type: ChokeType::default(),
            curve_type: CurveType::default(),
            zone_thresholds_min: [THRESHOLD_MIN_DEFAULT; MAX_ZONES],
            zone_thresholds_max: [THRESHOLD_MAX_DEFAULT; MAX_ZONES],
            scan_time_us: 3,
            mask_time_ms: 30,
            head_rim_bias: 0,
            cross_note_enabled: false,
            almost_closed_threshold: 90.0,
            closed_threshold: 100.0,
            move_detect_tolerance: 50,
            chick_detect_timeout_ms: 20,
        }
    }
}

/// Notes sent for each zone of a pad. `None` means the zone stays silent on MIDI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DrumMappings {
    pub note_main: Option<MidiNote>,
    pub note_rim: Option<MidiNote>,
    /// Cymbal cup.
    pub note_cup: Option<MidiNote>,
    /// Snare cross stick.
    pub note_cross: Option<MidiNote>,

    /// Hi-hat: set on the pedal to play the closed notes of the cymbal while closed.
    pub closed_notes_enabled: bool,
    pub note_close_main: Option<MidiNote>,
    pub note_close_rim: Option<MidiNote>,
    pub note_close_cup: Option<MidiNote>,
}

impl DrumMappings {
    /// Open cymbal notes in zone order (bow, edge, cup).
    pub fn cymbal_notes(&self) -> [Option<MidiNote>; MAX_ZONES] {
        [self.note_main, self.note_rim, self.note_cup]
    }

    /// Closed hi-hat notes in zone order (bow, edge, cup).
    pub fn closed_cymbal_notes(&self) -> [Option<MidiNote>; MAX_ZONES] {
        [self.note_close_main, self.note_close_rim, self.note_close_cup]
    }
}
