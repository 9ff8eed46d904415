//! Serializable kit configuration and how it is applied to a [`DrumKit`].
//!
//! The layout follows the JSON the trigger module stores: a `general` section, a list of
//! multiplexers, the connectors and the pads. Loading and storing the document is up to the
//! caller, this module only maps it onto the kit.

use core::fmt::{self, Write};

use heapless::Vec;
use serde::de::{self, IgnoredAny, MapAccess, Unexpected, Visitor};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::io::DrumIo;
use crate::kit::{DEFAULT_MIDI_CHANNEL, DEFAULT_PEDAL_CC, DrumKit};
use crate::midi::{Channel, MidiOut};
use crate::mux::{DrumMux, MuxType};
use crate::pad::DrumPad;
use crate::pin::DrumPin;
use crate::settings::{DrumMappings, DrumSettings};
use crate::types::{
    MAX_CONNECTOR_COUNT, MAX_MUX_COUNT, MAX_PAD_COUNT, MAX_SENSOR_PINS, MuxId, Name, PadId, PinId,
    TimeMs,
};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KitConfig {
    pub general: GeneralConfig,
    pub mux: Vec<MuxConfig, MAX_MUX_COUNT>,
    pub connectors: Vec<ConnectorConfig, MAX_CONNECTOR_COUNT>,
    pub pads: Vec<PadConfig, MAX_PAD_COUNT>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneralConfig {
    pub gate_time_ms: TimeMs,
    pub midi_channel: Channel,
    pub pedal_cc: u8,
    /// Flush the multiplexers after scan pauses. Off for simulated boards.
    pub mux_flush: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            gate_time_ms: 0,
            midi_channel: DEFAULT_MIDI_CHANNEL,
            pedal_cc: DEFAULT_PEDAL_CC,
            mux_flush: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MuxConfig {
    #[serde(rename = "type")]
    pub kind: MuxType,
    pub pins: MuxPinsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MuxPinsConfig {
    pub select: Vec<PinId, 4>,
    pub analog_in: PinId,
    #[serde(default)]
    pub enable: Option<PinId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    pub id: Name,
    pub pins: Vec<PinConfig, MAX_SENSOR_PINS>,
}

/// A connector pin: either a plain pin number or `{ "mux": 0, "channel": 5 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinConfig {
    Direct(PinId),
    Mux { mux: u8, channel: u8 },
}

impl From<PinConfig> for DrumPin {
    fn from(pin: PinConfig) -> Self {
        match pin {
            PinConfig::Direct(pin) => DrumPin::direct(pin),
            PinConfig::Mux { mux, channel } => DrumPin::mux(MuxId(mux), channel),
        }
    }
}

impl Serialize for PinConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Self::Direct(pin) => serializer.serialize_u8(pin),
            Self::Mux { mux, channel } => {
                let mut state = serializer.serialize_struct("PinConfig", 2)?;
                state.serialize_field("mux", &mux)?;
                state.serialize_field("channel", &channel)?;
                state.end()
            }
        }
    }
}

struct PinConfigVisitor;

impl<'de> Visitor<'de> for PinConfigVisitor {
    type Value = PinConfig;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a pin number or a mux channel")
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<PinConfig, E> {
        u8::try_from(value)
            .map(PinConfig::Direct)
            .map_err(|_| E::invalid_value(Unexpected::Unsigned(value), &self))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<PinConfig, E> {
        u8::try_from(value)
            .map(PinConfig::Direct)
            .map_err(|_| E::invalid_value(Unexpected::Signed(value), &self))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<PinConfig, A::Error> {
        let (mut mux, mut channel) = (None, None);
        while let Some(key) = map.next_key::<heapless::String<16>>()? {
            match key.as_str() {
                "mux" => mux = Some(map.next_value()?),
                "channel" => channel = Some(map.next_value()?),
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        let mux = mux.ok_or_else(|| <A::Error as de::Error>::missing_field("mux"))?;
        let channel = channel.ok_or_else(|| <A::Error as de::Error>::missing_field("channel"))?;
        Ok(PinConfig::Mux { mux, channel })
    }
}

impl<'de> Deserialize<'de> for PinConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PinConfigVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PadConfig {
    #[serde(default)]
    pub name: Name,
    #[serde(default)]
    pub role: Name,
    #[serde(default)]
    pub group: Name,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(default, rename = "autocalibrate")]
    pub auto_calibrate: bool,
    /// Id of the connector the pad is plugged into.
    #[serde(default)]
    pub connector: Option<Name>,
    /// Role of the pedal pad, cymbals only.
    #[serde(default)]
    pub pedal: Option<Name>,
    #[serde(default)]
    pub settings: DrumSettings,
    #[serde(default)]
    pub mappings: DrumMappings,
}

fn enabled_default() -> bool {
    true
}

impl PadConfig {
    fn to_pad(&self, index: usize) -> DrumPad {
        let name = or_unknown(&self.name, index);
        let role = or_unknown(&self.role, index);

        let mut pad = DrumPad::new(&name, self.settings)
            .with_role(&role)
            .with_group(&self.group)
            .with_mappings(self.mappings)
            .with_auto_calibrate(self.auto_calibrate);
        pad.set_enabled(self.enabled);
        pad
    }
}

/// Pads without name or role are called `Unknown<index>`.
fn or_unknown(value: &Name, index: usize) -> Name {
    if !value.is_empty() {
        return value.clone();
    }
    let mut name = Name::new();
    // "Unknown" plus at most two digits always fits
    let _ = write!(name, "Unknown{}", index);
    name
}

impl KitConfig {
    /// Rebuilds `kit` from this configuration.
    ///
    /// Order matters: connectors reference multiplexers by index and pads reference connectors by
    /// id. Entities that fail are logged and skipped, a pad whose connector is missing is kept but
    /// disabled.
    pub fn apply<IO: DrumIo, M: MidiOut>(&self, kit: &mut DrumKit, io: &mut IO, midi: &mut M) {
        kit.clear(io, midi);

        kit.set_gate_time(self.general.gate_time_ms);
        kit.set_midi_channel(self.general.midi_channel);
        kit.set_pedal_cc(self.general.pedal_cc);
        kit.set_mux_flush(self.general.mux_flush);

        for config in &self.mux {
            let pins = &config.pins;
            match DrumMux::new(config.kind, &pins.select, pins.analog_in, pins.enable) {
                Ok(mux) => {
                    if let Err(err) = kit.add_mux(mux, io) {
                        log::error!("{}", err);
                    }
                }
                Err(err) => log::error!("Invalid mux: {}", err),
            }
        }

        for config in &self.connectors {
            let pins: Vec<DrumPin, MAX_SENSOR_PINS> =
                config.pins.iter().map(|&pin| DrumPin::from(pin)).collect();
            if let Err(err) = kit.add_connector(&config.id, &pins, io) {
                log::error!("Connector[{}]: {} -> skip", config.id, err);
            }
        }

        let mut added: Vec<(PadId, &PadConfig), MAX_PAD_COUNT> = Vec::new();
        for (index, config) in self.pads.iter().enumerate() {
            match kit.add_pad(config.to_pad(index), config.connector.as_deref()) {
                Ok(id) => {
                    let _ = added.push((id, config));
                }
                Err(err) => {
                    log::error!("{}", err);
                    break;
                }
            }
        }

        for (id, config) in added {
            let Some(pedal) = &config.pedal else {
                continue;
            };
            if let Err(err) = kit.link_pedal(id, pedal) {
                log::error!("Pad[{}]: {}", config.name, err);
            }
        }

        log::info!(
            "Config: #multiplexers: {}, #pads: {}, #connectors: {}",
            kit.muxes().len(),
            kit.pads().len(),
            kit.connectors().len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{PadType, ZonesType};
    use crate::testutil::{MockIo, MockMidi};
    use crate::types::ConnectorId;

    const KIT: &str = r#"{
        "general": { "gateTimeMs": 20, "midiChannel": 3, "muxFlush": false },
        "mux": [
            { "type": "HC4051", "pins": { "select": [16, 17, 18], "analogIn": 2, "enable": 19 } },
            { "type": "HC4067", "pins": { "select": [20, 21, 22], "analogIn": 3 } },
            { "type": "HC4067", "pins": { "select": [20, 21, 22, 23], "analogIn": 3 } }
        ],
        "connectors": [
            { "id": "snare", "pins": [0, 1] },
            { "id": "hihat", "pins": [{ "mux": 0, "channel": 4 }, { "mux": 0, "channel": 5 }] },
            { "id": "pedal", "pins": [{ "mux": 1, "channel": 15 }] },
            { "id": "broken", "pins": [{ "mux": 0, "channel": 9 }] },
            { "id": "snare", "pins": [4] }
        ],
        "pads": [
            {
                "name": "Snare", "role": "snare", "connector": "snare", "autocalibrate": true,
                "settings": { "zonesType": "Zones2Piezos", "zoneThresholdsMin": [40, 60, 60] },
                "mappings": { "noteMain": 38, "noteRim": 40 }
            },
            {
                "name": "Hi-Hat", "role": "hihat", "connector": "hihat", "pedal": "hihatPedal",
                "settings": { "padType": "Cymbal", "zonesType": "Zones2PiezoAndSwitch" }
            },
            {
                "name": "Pedal", "role": "hihatPedal", "connector": "pedal",
                "settings": { "padType": "Pedal", "zonesType": "Zones1Controller" }
            },
            { "name": "Tom", "connector": "broken" },
            { "connector": "snare", "enabled": false }
        ]
    }"#;

    fn apply(json: &str) -> (DrumKit, MockIo) {
        let config: KitConfig = serde_json::from_str(json).unwrap();
        let (mut kit, mut io, mut midi) = (DrumKit::new(), MockIo::new(), MockMidi::new());
        config.apply(&mut kit, &mut io, &mut midi);
        (kit, io)
    }

    #[test]
    fn pin_config_forms() {
        let pins: std::vec::Vec<PinConfig> =
            serde_json::from_str(r#"[7, {"channel": 3, "mux": 1}]"#).unwrap();
        assert_eq!(pins, [PinConfig::Direct(7), PinConfig::Mux { mux: 1, channel: 3 }]);
        assert_eq!(serde_json::to_string(&pins).unwrap(), r#"[7,{"mux":1,"channel":3}]"#);

        assert!(serde_json::from_str::<PinConfig>("300").is_err());
        assert!(serde_json::from_str::<PinConfig>(r#"{"mux": 1}"#).is_err());
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: KitConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.general, GeneralConfig::default());
        assert!(config.pads.is_empty());
    }

    #[test]
    fn general_section() {
        let (kit, _) = apply(KIT);
        assert_eq!(kit.gate_time(), 20);
        assert_eq!(kit.midi_channel(), 3);
        assert_eq!(kit.pedal_cc(), DEFAULT_PEDAL_CC);
    }

    #[test]
    fn invalid_entities_are_skipped() {
        let (kit, _) = apply(KIT);

        // the HC4067 with three select pins is dropped
        assert_eq!(kit.muxes().len(), 2);
        assert_eq!(kit.muxes()[1].kind(), MuxType::HC4067);

        // channel 9 of an HC4051 and the duplicate id are dropped
        let ids: std::vec::Vec<&str> = kit.connectors().iter().map(|c| c.id()).collect();
        assert_eq!(ids, ["snare", "hihat", "pedal"]);
    }

    #[test]
    fn pads_are_configured() {
        let (kit, _) = apply(KIT);
        assert_eq!(kit.pads().len(), 5);

        let snare = kit.pad(kit.find_pad_by_role("snare").unwrap()).unwrap();
        assert!(snare.is_enabled());
        assert!(snare.auto_calibrate());
        assert_eq!(snare.connector(), Some(ConnectorId(0)));
        assert_eq!(snare.settings.zone_thresholds_min, [40, 60, 60]);
        assert_eq!(snare.settings.scan_time_us, 3);
        assert_eq!(snare.mappings.note_rim, Some(40));
        assert_eq!(snare.active_zone_count(), 2);

        let tom = kit.pad(kit.find_pad_by_name("Tom").unwrap()).unwrap();
        assert!(!tom.is_enabled());
        assert_eq!(tom.role(), "Unknown3");

        let unnamed = &kit.pads()[4];
        assert_eq!(unnamed.name(), "Unknown4");
        assert!(!unnamed.is_enabled());
        assert_eq!(unnamed.connector(), Some(ConnectorId(0)));
    }

    #[test]
    fn hihat_is_linked_to_its_pedal() {
        let (kit, _) = apply(KIT);
        let hihat = kit.pad(kit.find_pad_by_role("hihat").unwrap()).unwrap();
        let pedal = kit.find_pad_by_role("hihatPedal").unwrap();
        assert_eq!(hihat.pad_type(), PadType::Cymbal);
        assert_eq!(hihat.pedal(), Some(pedal));
        assert_eq!(kit.pad(pedal).unwrap().settings.zones_type, ZonesType::Zones1Controller);
    }

    #[test]
    fn pedal_must_be_a_pedal() {
        let (kit, _) = apply(
            r#"{
                "connectors": [{ "id": "a", "pins": [0] }, { "id": "b", "pins": [1] }],
                "pads": [
                    { "name": "Ride", "role": "ride", "connector": "a", "pedal": "kick",
                      "settings": { "padType": "Cymbal" } },
                    { "name": "Kick", "role": "kick", "connector": "b" },
                    { "name": "Crash", "role": "crash", "connector": "a", "pedal": "nope",
                      "settings": { "padType": "Cymbal" } }
                ]
            }"#,
        );
        assert!(kit.pads().iter().all(|pad| pad.pedal().is_none()));
        assert!(kit.pads().iter().all(|pad| pad.is_enabled()));
    }

    #[test]
    fn muxes_are_initialized() {
        let (kit, io) = apply(KIT);
        assert!(kit.muxes().iter().all(|mux| mux.is_initialized()));
        assert_eq!(io.output(19), Some(crate::io::PinState::High));
    }

    #[test]
    fn reapply_replaces_the_kit() {
        let (mut kit, mut io) = apply(KIT);
        let config: KitConfig = serde_json::from_str(
            r#"{ "connectors": [{ "id": "kick", "pins": [5] }],
                 "pads": [{ "name": "Kick", "connector": "kick" }] }"#,
        )
        .unwrap();
        config.apply(&mut kit, &mut io, &mut MockMidi::new());

        assert!(kit.muxes().is_empty());
        assert_eq!(kit.connectors().len(), 1);
        assert_eq!(kit.pads().len(), 1);
        assert_eq!(kit.pads()[0].name(), "Kick");
        assert_eq!(kit.find_connector("kick"), Some(ConnectorId(0)));
    }
}
