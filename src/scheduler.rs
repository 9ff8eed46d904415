//! Note-on/note-off scheduling.
//!
//! With a gate time of 0 every note-on is followed by its note-off right away, which is what most
//! drum software expects. Some DAWs only accept a choke while the note is still playing, so a
//! gate time keeps the note on for a while and the note-off is sent by [`NoteScheduler::sweep`].

use crate::midi::{Channel, MidiOut};
use crate::queue::NoteEventQueue;
use crate::types::{MidiNote, TimeMs, Velocity};

pub const MAX_GATE_TIME_MS: TimeMs = 30 * 1000;

#[derive(Debug, Clone, Default)]
pub struct NoteScheduler {
    /// `0..=MAX_GATE_TIME_MS`
    gate_time_ms: TimeMs,
    pending: NoteEventQueue,
}

impl NoteScheduler {
    pub const fn new() -> Self {
        Self { gate_time_ms: 0, pending: NoteEventQueue::new() }
    }

    pub fn gate_time(&self) -> TimeMs {
        self.gate_time_ms
    }

    /// Sets the gate time, clamped to [`MAX_GATE_TIME_MS`].
    pub fn set_gate_time(&mut self, gate_time_ms: TimeMs) {
        if gate_time_ms > MAX_GATE_TIME_MS {
            log::warn!(
                "Gate time reduced to maximum {}ms (was {}ms)",
                MAX_GATE_TIME_MS,
                gate_time_ms
            );
        }
        self.gate_time_ms = gate_time_ms.min(MAX_GATE_TIME_MS);
    }

    pub fn pending(&self) -> &NoteEventQueue {
        &self.pending
    }

    /// Plays `note`, either as an instant on/off pair or with a delayed note-off.
    pub fn note_on<M: MidiOut>(
        &mut self,
        note: MidiNote,
        velocity: Velocity,
        channel: Channel,
        now_ms: TimeMs,
        midi: &mut M,
    ) {
        if self.gate_time_ms == 0 {
            midi.send_note_on(note, velocity, channel);
            midi.send_note_off(note, 0, channel);
            return;
        }

        // stop the note if it is still playing
        if self.pending.remove_note(note) {
            midi.send_note_off(note, 0, channel);
        }

        midi.send_note_on(note, velocity, channel);

        if self.pending.is_full() {
            if let Some(oldest) = self.pending.remove_oldest() {
                midi.send_note_off(oldest.note, 0, channel);
            }
        }

        self.pending.add_note(note, now_ms);
    }

    /// Sends the note-offs that are due, oldest first.
    pub fn sweep<M: MidiOut>(&mut self, now_ms: TimeMs, channel: Channel, midi: &mut M) {
        while let Some(event) = self.pending.peek_oldest() {
            if now_ms.saturating_sub(event.note_on_time_ms) < self.gate_time_ms {
                return;
            }
            midi.send_note_off(event.note, 0, channel);
            self.pending.remove_oldest();
        }
    }

    /// Sends note-offs for everything still pending.
    pub fn release_all<M: MidiOut>(&mut self, channel: Channel, midi: &mut M) {
        while let Some(event) = self.pending.remove_oldest() {
            midi.send_note_off(event.note, 0, channel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::MidiMessage;
    use crate::queue::MAX_PENDING_NOTES;
    use crate::testutil::MockMidi;

    const CH: Channel = 10;

    #[test]
    fn gate_time_is_clamped() {
        let mut scheduler = NoteScheduler::new();
        scheduler.set_gate_time(1000);
        assert_eq!(scheduler.gate_time(), 1000);
        scheduler.set_gate_time(60_000);
        assert_eq!(scheduler.gate_time(), MAX_GATE_TIME_MS);
    }

    #[test]
    fn immediate_mode_sends_on_off_pair() {
        let mut scheduler = NoteScheduler::new();
        let mut midi = MockMidi::new();
        scheduler.note_on(38, 100, CH, 0, &mut midi);
        assert_eq!(
            midi.sent,
            [
                MidiMessage::NoteOn { note: 38, velocity: 100, channel: CH },
                MidiMessage::NoteOff { note: 38, velocity: 0, channel: CH },
            ]
        );
        assert!(scheduler.pending().is_empty());
    }

    #[test]
    fn delayed_off_after_gate_time() {
        let mut scheduler = NoteScheduler::new();
        scheduler.set_gate_time(100);
        let mut midi = MockMidi::new();

        scheduler.note_on(38, 100, CH, 1000, &mut midi);
        scheduler.note_on(42, 90, CH, 1050, &mut midi);
        assert_eq!(midi.note_ons(), [(38, 100), (42, 90)]);
        assert!(midi.note_offs().is_empty());

        scheduler.sweep(1099, CH, &mut midi);
        assert!(midi.note_offs().is_empty());

        scheduler.sweep(1100, CH, &mut midi);
        assert_eq!(midi.note_offs(), [38]);

        scheduler.sweep(1200, CH, &mut midi);
        assert_eq!(midi.note_offs(), [38, 42]);
        assert!(scheduler.pending().is_empty());
    }

    #[test]
    fn retrigger_stops_playing_note_first() {
        let mut scheduler = NoteScheduler::new();
        scheduler.set_gate_time(5000);
        let mut midi = MockMidi::new();

        scheduler.note_on(49, 100, CH, 0, &mut midi);
        scheduler.note_on(51, 100, CH, 10, &mut midi);
        midi.clear();
        scheduler.note_on(49, 80, CH, 20, &mut midi);

        assert_eq!(
            midi.sent,
            [
                MidiMessage::NoteOff { note: 49, velocity: 0, channel: CH },
                MidiMessage::NoteOn { note: 49, velocity: 80, channel: CH },
            ]
        );
        let order: std::vec::Vec<_> = scheduler.pending().iter().map(|e| e.note).collect();
        assert_eq!(order, [51, 49]);
    }

    #[test]
    fn full_queue_evicts_oldest_with_note_off() {
        let mut scheduler = NoteScheduler::new();
        scheduler.set_gate_time(MAX_GATE_TIME_MS);
        let mut midi = MockMidi::new();

        for note in 0..MAX_PENDING_NOTES as MidiNote {
            scheduler.note_on(note, 100, CH, note as TimeMs, &mut midi);
        }
        assert!(scheduler.pending().is_full());
        midi.clear();

        scheduler.note_on(100, 100, CH, 100, &mut midi);
        assert_eq!(midi.note_offs(), [0]);
        assert_eq!(scheduler.pending().len(), MAX_PENDING_NOTES);
        assert_eq!(scheduler.pending().peek_oldest().map(|e| e.note), Some(1));
        assert!(scheduler.pending().contains(100));
    }

    #[test]
    fn release_all_sends_every_pending_off() {
        let mut scheduler = NoteScheduler::new();
        scheduler.set_gate_time(1000);
        let mut midi = MockMidi::new();
        scheduler.note_on(1, 100, CH, 0, &mut midi);
        scheduler.note_on(2, 100, CH, 0, &mut midi);
        scheduler.release_all(CH, &mut midi);
        assert_eq!(midi.note_offs(), [1, 2]);
        assert!(scheduler.pending().is_empty());
    }
}
