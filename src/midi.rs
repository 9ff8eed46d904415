//! MIDI messages produced by the kit and the transport they are handed to.

use crate::types::{MidiNote, Velocity};

/// MIDI channel in musician numbering (1..=16).
pub type Channel = u8;

/// Channel voice messages emitted by the drum kit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { note: MidiNote, velocity: Velocity, channel: Channel },
    NoteOff { note: MidiNote, velocity: Velocity, channel: Channel },
    /// Polyphonic key pressure, used to choke cymbals.
    AfterTouch { note: MidiNote, pressure: Velocity, channel: Channel },
    ControlChange { control: u8, value: Velocity, channel: Channel },
}

impl MidiMessage {
    /// Encodes the message as a 3-byte MIDI 1.0 stream message.
    ///
    /// Data bytes are masked to 7 bits and the channel wraps into `1..=16`.
    pub fn to_bytes(&self) -> [u8; 3] {
        let (status, data1, data2, channel) = match *self {
            Self::NoteOn { note, velocity, channel } => (0x90, note, velocity, channel),
            Self::NoteOff { note, velocity, channel } => (0x80, note, velocity, channel),
            Self::AfterTouch { note, pressure, channel } => (0xA0, note, pressure, channel),
            Self::ControlChange { control, value, channel } => (0xB0, control, value, channel),
        };
        [
            status | (channel.wrapping_sub(1) & 0x0F),
            data1 & 0x7F,
            data2 & 0x7F,
        ]
    }
}

/// Downstream MIDI transport (USB, serial, BLE, simulator...).
///
/// Sending must not block for longer than a few microseconds as it is called from inside the
/// scan cycle.
pub trait MidiOut {
    fn send(&mut self, message: MidiMessage);

    fn send_note_on(&mut self, note: MidiNote, velocity: Velocity, channel: Channel) {
        self.send(MidiMessage::NoteOn { note, velocity, channel });
    }

    fn send_note_off(&mut self, note: MidiNote, velocity: Velocity, channel: Channel) {
        self.send(MidiMessage::NoteOff { note, velocity, channel });
    }

    fn send_after_touch(&mut self, note: MidiNote, pressure: Velocity, channel: Channel) {
        self.send(MidiMessage::AfterTouch { note, pressure, channel });
    }

    fn send_control_change(&mut self, control: u8, value: Velocity, channel: Channel) {
        self.send(MidiMessage::ControlChange { control, value, channel });
    }
}
