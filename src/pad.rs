//! Drum pads: configuration plus the per-cycle sensing state.

use crate::hihat::HiHatData;
use crate::io::DrumIo;
use crate::sensing::{PadInput, SensingState, Strategy};
use crate::settings::{DrumMappings, DrumSettings, PadType, ZonesType};
use crate::types::{ConnectorId, MAX_ZONES, Name, PadId, SensorValue, TimeUs, Velocity, name};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LastCymbalEvent {
    #[default]
    None,
    Hit,
    Choked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CymbalData {
    /// Set on the cycle a choke was detected.
    pub is_choked: bool,
    pub last_event: LastCymbalEvent,
}

/// One playing surface.
///
/// Pads live in a fixed array of the kit and are addressed by [`PadId`]. The public fields hold
/// the sensing results of the last cycle.
#[derive(Debug, Clone)]
pub struct DrumPad {
    name: Name,
    role: Name,
    group: Name,
    enabled: bool,
    auto_calibrate: bool,

    pub settings: DrumSettings,
    pub mappings: DrumMappings,

    pedal: Option<PadId>,
    connector: Option<ConnectorId>,
    connector_pin_count: usize,

    pub(crate) sensing_state: SensingState,

    pub hihat: HiHatData,
    pub cymbal: CymbalData,

    /// Start of the scan window.
    pub hit_time_us: TimeUs,
    /// End of the scan window, start of the mask window.
    pub scan_end_us: TimeUs,

    /// Conditioned input of the current cycle. A controller keeps its denoised value in slot 0
    /// and the raw value in slot 1.
    pub sensor_values: [SensorValue; MAX_ZONES],
    /// Peaks of the running scan. Switch zones count presses instead.
    pub max_zone_values: [SensorValue; MAX_ZONES],
    pub hit_velocities: [Velocity; MAX_ZONES],
    pub hits: [bool; MAX_ZONES],
}

impl DrumPad {
    pub fn new(name: &str, settings: DrumSettings) -> Self {
        Self {
            name: crate::types::name(name),
            role: Name::new(),
            group: Name::new(),
            enabled: true,
            auto_calibrate: false,
            settings,
            mappings: DrumMappings::default(),
            pedal: None,
            connector: None,
            connector_pin_count: 0,
            sensing_state: SensingState::default(),
            hihat: HiHatData::default(),
            cymbal: CymbalData::default(),
            hit_time_us: 0,
            scan_end_us: 0,
            sensor_values: [0; MAX_ZONES],
            max_zone_values: [0; MAX_ZONES],
            hit_velocities: [0; MAX_ZONES],
            hits: [false; MAX_ZONES],
        }
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.role = name(role);
        self
    }

    pub fn with_group(mut self, group: &str) -> Self {
        self.group = name(group);
        self
    }

    pub fn with_mappings(mut self, mappings: DrumMappings) -> Self {
        self.mappings = mappings;
        self
    }

    pub fn with_auto_calibrate(mut self, auto_calibrate: bool) -> Self {
        self.auto_calibrate = auto_calibrate;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn auto_calibrate(&self) -> bool {
        self.auto_calibrate
    }

    pub fn pad_type(&self) -> PadType {
        self.settings.pad_type
    }

    pub fn pedal(&self) -> Option<PadId> {
        self.pedal
    }

    pub(crate) fn set_pedal(&mut self, pedal: Option<PadId>) {
        self.pedal = pedal;
    }

    pub fn connector(&self) -> Option<ConnectorId> {
        self.connector
    }

    /// Wires the pad to a connector with `pin_count` pins.
    pub fn attach_connector(&mut self, connector: ConnectorId, pin_count: usize) {
        self.connector = Some(connector);
        self.connector_pin_count = pin_count;
    }

    pub fn sensing_state(&self) -> SensingState {
        self.sensing_state
    }

    pub fn is_connector_active(&self) -> bool {
        self.connector.is_some() && self.connector_pin_count > 0
    }

    /// Pins currently usable for sensing.
    ///
    /// A 3 zone cymbal on two TRS jacks has 3 pins with both jacks plugged in, 2 with one and 1
    /// with a mono plug. A 3 zone cymbal with both switches on the ring of a single TRS jack never
    /// has more than 2.
    pub fn active_pin_count(&self) -> usize {
        if self.connector.is_none() {
            return 0;
        }
        self.connector_pin_count
            .min(self.settings.zones_type.required_pin_count())
    }

    /// Zones currently usable for sensing. Equals [`Self::active_pin_count`] except for single
    /// TRS cymbals where both pins give all three zones.
    pub fn active_zone_count(&self) -> usize {
        let pins = self.active_pin_count();
        if self.settings.zones_type == ZonesType::Zones3PiezoAndSwitches1Trs && pins == 2 {
            return 3;
        }
        pins
    }

    pub fn is_hit(&self) -> bool {
        self.hits.iter().any(|&hit| hit)
    }

    /// Zone that was hit this cycle, if any. Lower zones win if several are set.
    pub fn hit_zone(&self) -> Option<usize> {
        self.hits.iter().position(|&hit| hit)
    }

    /// Runs one cycle of the pad's sensing strategy.
    pub fn sense<IO: DrumIo>(&mut self, now: TimeUs, input: &mut PadInput<'_, IO>) {
        Strategy::from(self.settings.zones_type).sense(self, now, input);
    }

    pub(crate) fn clear_hits(&mut self) {
        self.hits = [false; MAX_ZONES];
        self.hit_velocities = [0; MAX_ZONES];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad(zones: ZonesType, pins: usize) -> DrumPad {
        let mut pad = DrumPad::new("pad", DrumSettings { zones_type: zones, ..Default::default() });
        pad.attach_connector(ConnectorId(0), pins);
        pad
    }

    #[test]
    fn unconnected_pad_has_no_zones() {
        let pad = DrumPad::new("snare", DrumSettings::default());
        assert!(!pad.is_connector_active());
        assert_eq!(pad.active_pin_count(), 0);
        assert_eq!(pad.active_zone_count(), 0);
    }

    #[test]
    fn zone_count_follows_plugged_pins() {
        assert_eq!(pad(ZonesType::Zones3PiezoAndSwitches2Trs, 3).active_zone_count(), 3);
        assert_eq!(pad(ZonesType::Zones3PiezoAndSwitches2Trs, 2).active_zone_count(), 2);
        assert_eq!(pad(ZonesType::Zones2Piezos, 3).active_zone_count(), 2);
        assert_eq!(pad(ZonesType::Zones1Piezo, 0).active_zone_count(), 0);
        assert!(!pad(ZonesType::Zones1Piezo, 0).is_connector_active());
    }

    #[test]
    fn single_trs_cymbal_has_three_zones_on_two_pins() {
        let cymbal = pad(ZonesType::Zones3PiezoAndSwitches1Trs, 3);
        assert_eq!(cymbal.active_pin_count(), 2);
        assert_eq!(cymbal.active_zone_count(), 3);
        assert_eq!(pad(ZonesType::Zones3PiezoAndSwitches1Trs, 1).active_zone_count(), 1);
    }

    #[test]
    fn hit_zone_reports_first_hit() {
        let mut pad = pad(ZonesType::Zones2Piezos, 2);
        assert_eq!(pad.hit_zone(), None);
        pad.hits = [false, true, false];
        assert!(pad.is_hit());
        assert_eq!(pad.hit_zone(), Some(1));
    }
}
