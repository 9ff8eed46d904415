//! Scalar types and limits shared by the whole sensing pipeline.

/// Conditioned or raw 10-bit sensor reading.
pub type SensorValue = u16;
/// MIDI velocity, pressure or controller value (7 bit).
pub type Velocity = u8;
/// MIDI note number (7 bit).
pub type MidiNote = u8;
/// Physical pin number as understood by the [`crate::io::DrumIo`] implementation.
pub type PinId = u8;
/// Zone position within a pad (0 = main/head/bow).
pub type ZoneIndex = usize;

pub type TimeUs = u64;
pub type TimeMs = u64;

/// Largest value a sensor reading can take after conditioning.
pub const MAX_SENSOR_VALUE: SensorValue = 1023;
/// Largest MIDI data byte.
pub const MAX_VELOCITY: Velocity = 127;

/// Maximum zones a single pad can sense.
pub const MAX_ZONES: usize = 3;
/// Maximum pins a connector can carry.
pub const MAX_SENSOR_PINS: usize = 3;

pub const MAX_PAD_COUNT: usize = 20;
pub const MAX_MUX_COUNT: usize = 4;
pub const MAX_CONNECTOR_COUNT: usize = 32;

/// Index of a multiplexer within the kit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MuxId(pub u8);

/// Index of a connector within the kit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectorId(pub u8);

/// Index of a pad within the kit. Stable for the lifetime of the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PadId(pub u8);

impl PadId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Fixed-length name used for pads, roles, groups and connector ids.
pub type Name = heapless::String<24>;

/// Builds a [`Name`], cutting `s` off at the capacity.
pub fn name(s: &str) -> Name {
    let mut name = Name::new();
    for c in s.chars() {
        if name.push(c).is_err() {
            break;
        }
    }
    name
}
