//! Pending note-off events.

use heapless::Vec;

use crate::types::{MidiNote, TimeMs};

/// Each note (roughly one zone of a pad) is played at most once at a time, so this is plenty.
pub const MAX_PENDING_NOTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    pub note: MidiNote,
    pub note_on_time_ms: TimeMs,
}

/// Fixed-capacity FIFO of notes waiting for their note-off, oldest first.
///
/// A note number is expected to be in the queue at most once; the scheduler removes a pending
/// note before adding it again.
#[derive(Debug, Clone, Default)]
pub struct NoteEventQueue {
    pending: Vec<NoteEvent, MAX_PENDING_NOTES>,
}

impl NoteEventQueue {
    pub const fn new() -> Self {
        Self { pending: Vec::new() }
    }

    /// Appends a note. Returns `false` and drops the note if the queue is full.
    pub fn add_note(&mut self, note: MidiNote, time_ms: TimeMs) -> bool {
        self.pending.push(NoteEvent { note, note_on_time_ms: time_ms }).is_ok()
    }

    pub fn peek_oldest(&self) -> Option<&NoteEvent> {
        self.pending.first()
    }

    pub fn remove_oldest(&mut self) -> Option<NoteEvent> {
        if self.pending.is_empty() {
            return None;
        }
        Some(self.pending.remove(0))
    }

    /// Removes the first entry for `note`, keeping the order of the others.
    pub fn remove_note(&mut self, note: MidiNote) -> bool {
        match self.pending.iter().position(|event| event.note == note) {
            Some(index) => {
                self.pending.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, note: MidiNote) -> bool {
        self.pending.iter().any(|event| event.note == note)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.pending.is_full()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NoteEvent> {
        self.pending.iter()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
