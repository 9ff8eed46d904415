//! Mock board and MIDI transport used by the unit tests.

use std::cell::Cell;
use std::collections::HashMap;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;

use crate::error::IoError;
use crate::io::{DrumIo, Led, PinState};
use crate::midi::{MidiMessage, MidiOut};
use crate::types::{PinId, SensorValue, TimeUs};

/// A mock board. Analog values are scripted per pin, digital writes are recorded.
#[derive(Default)]
pub struct MockIo {
    analog: HashMap<PinId, SensorValue>,
    /// Values returned for a mux analog-in pin, indexed by the channel currently selected.
    mux_channels: HashMap<PinId, [SensorValue; 16]>,
    /// Select pins of the mux wired to an analog-in pin, lowest bit first.
    mux_select: HashMap<PinId, Vec<PinId>>,
    outputs: HashMap<PinId, PinState>,
    pub writes: Vec<(PinId, PinState)>,
    pub reads: Vec<PinId>,
    pub leds: HashMap<u8, bool>,
    pub failing_pins: Vec<PinId>,
    pub delays_ns: u64,
    now_us: Cell<TimeUs>,
    /// Added to the clock every time it is read.
    pub clock_step_us: TimeUs,
}

impl MockIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_analog(&mut self, pin: PinId, value: SensorValue) {
        self.analog.insert(pin, value);
    }

    /// Wires a virtual mux so reads of `analog_in` return the value of the selected channel.
    pub fn wire_mux(&mut self, analog_in: PinId, select: &[PinId]) {
        self.mux_select.insert(analog_in, select.to_vec());
        self.mux_channels.insert(analog_in, [0; 16]);
    }

    pub fn set_mux_channel(&mut self, analog_in: PinId, channel: usize, value: SensorValue) {
        if let Some(channels) = self.mux_channels.get_mut(&analog_in) {
            channels[channel] = value;
        }
    }

    pub fn set_time_us(&self, now: TimeUs) {
        self.now_us.set(now);
    }

    pub fn advance_us(&self, delta: TimeUs) {
        self.now_us.set(self.now_us.get() + delta);
    }

    pub fn output(&self, pin: PinId) -> Option<PinState> {
        self.outputs.get(&pin).copied()
    }

    pub fn led_state(&self, led: Led) -> bool {
        self.leds.get(&(led as u8)).copied().unwrap_or(false)
    }

    fn selected_channel(&self, select: &[PinId]) -> usize {
        select
            .iter()
            .enumerate()
            .filter(|(_, pin)| self.outputs.get(pin) == Some(&PinState::High))
            .fold(0, |acc, (bit, _)| acc | (1 << bit))
    }
}

impl DelayNs for MockIo {
    fn delay_ns(&mut self, ns: u32) {
        self.delays_ns += ns as u64;
    }
}

impl DrumIo for MockIo {
    fn init_analog_in_pin(&mut self, pin: PinId) -> Result<(), IoError> {
        if self.failing_pins.contains(&pin) {
            return Err(IoError::InvalidPin(pin));
        }
        Ok(())
    }

    fn read_analog_in_pin(&mut self, pin: PinId) -> SensorValue {
        self.reads.push(pin);
        if let Some(select) = self.mux_select.get(&pin) {
            let channel = self.selected_channel(select);
            return self.mux_channels[&pin][channel];
        }
        self.analog.get(&pin).copied().unwrap_or(0)
    }

    fn init_digital_out_pin(&mut self, pin: PinId) -> Result<(), IoError> {
        if self.failing_pins.contains(&pin) {
            return Err(IoError::Unsupported(pin));
        }
        Ok(())
    }

    fn write_digital_out_pin(&mut self, pin: PinId, state: PinState) {
        self.outputs.insert(pin, state);
        self.writes.push((pin, state));
    }

    fn led(&mut self, led: Led, enable: bool) {
        self.leds.insert(led as u8, enable);
    }

    fn micros(&self) -> TimeUs {
        let now = self.now_us.get();
        self.now_us.set(now + self.clock_step_us);
        now
    }
}

/// A mock MIDI transport. Doesn't send anything, remembers everything.
#[derive(Default)]
pub struct MockMidi {
    pub sent: Vec<MidiMessage>,
}

impl MockMidi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note_ons(&self) -> Vec<(u8, u8)> {
        self.sent
            .iter()
            .filter_map(|m| match *m {
                MidiMessage::NoteOn { note, velocity, .. } => Some((note, velocity)),
                _ => None,
            })
            .collect()
    }

    pub fn note_offs(&self) -> Vec<u8> {
        self.sent
            .iter()
            .filter_map(|m| match *m {
                MidiMessage::NoteOff { note, .. } => Some(note),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.sent.clear();
    }
}

impl MidiOut for MockMidi {
    fn send(&mut self, message: MidiMessage) {
        self.sent.push(message);
    }
}
