//! The drum kit: owns every pad, connector and multiplexer and runs the scan cycle.

use heapless::Vec;

use crate::connector::DrumConnector;
use crate::error::ConfigError;
use crate::hihat::HiHatState;
use crate::io::{DrumIo, Led};
use crate::midi::{Channel, MidiOut};
use crate::mux::DrumMux;
use crate::pad::DrumPad;
use crate::pin::{DrumPin, PinSource};
use crate::scheduler::NoteScheduler;
use crate::sensing::PadInput;
use crate::settings::PadType;
use crate::types::{
    ConnectorId, MAX_CONNECTOR_COUNT, MAX_MUX_COUNT, MAX_PAD_COUNT, MAX_ZONES, MidiNote, MuxId,
    PadId, SensorValue, TimeMs, TimeUs, Velocity, ZoneIndex, name,
};

/// Events recorded during a single [`DrumKit::update`].
pub const MAX_KIT_EVENTS: usize = 24;

pub const DEFAULT_MIDI_CHANNEL: Channel = 10;
/// Foot controller.
pub const DEFAULT_PEDAL_CC: u8 = 4;

const HIT_INDICATOR_DELAY_US: TimeUs = 100_000;
const STATISTICS_WINDOW_US: TimeUs = 30 * 1000 * 1000;

/// A gap of 5 ms already caused false triggers. Monitor output takes up to 0.7 ms per cycle and
/// must not cause a flush.
const FLUSH_GAP_US: TimeUs = 2_000;
const FLUSH_DURATION_MS: TimeMs = 100;

/// What happened on a pad during the last cycle, for monitors and UIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KitEvent {
    Hit { pad: PadId, zone: ZoneIndex, velocity: Velocity },
    Choke { pad: PadId },
    Pedal { pad: PadId, position: SensorValue, cc: Velocity, state: HiHatState },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Statistics {
    /// Scan cycles in the last completed 30 s window.
    pub updates_per_30s: u32,
}

pub struct DrumKit {
    muxes: Vec<DrumMux, MAX_MUX_COUNT>,
    connectors: Vec<DrumConnector, MAX_CONNECTOR_COUNT>,
    pads: Vec<DrumPad, MAX_PAD_COUNT>,

    scheduler: NoteScheduler,
    channel: Channel,
    pedal_cc: u8,
    mux_flush: bool,

    last_mux_read_us: Option<TimeUs>,
    last_hit_us: Option<TimeUs>,

    statistics: Statistics,
    statistics_window_start_us: TimeUs,
    update_count: u32,

    events: Vec<KitEvent, MAX_KIT_EVENTS>,
}

impl Default for DrumKit {
    fn default() -> Self {
        Self::new()
    }
}

impl DrumKit {
    pub const fn new() -> Self {
        Self {
            muxes: Vec::new(),
            connectors: Vec::new(),
            pads: Vec::new(),
            scheduler: NoteScheduler::new(),
            channel: DEFAULT_MIDI_CHANNEL,
            pedal_cc: DEFAULT_PEDAL_CC,
            mux_flush: true,
            last_mux_read_us: None,
            last_hit_us: None,
            statistics: Statistics { updates_per_30s: 0 },
            statistics_window_start_us: 0,
            update_count: 0,
            events: Vec::new(),
        }
    }

    /// Runs one scan cycle: due note-offs, multiplexer scan, then every enabled pad.
    pub fn update<IO: DrumIo, M: MidiOut>(&mut self, io: &mut IO, midi: &mut M) {
        let now = io.micros();
        self.events.clear();

        if self.last_hit_us.is_some_and(|last| now.saturating_sub(last) > HIT_INDICATOR_DELAY_US) {
            io.led(Led::HitIndicator, false);
            self.last_hit_us = None;
        }

        if now.saturating_sub(self.statistics_window_start_us) > STATISTICS_WINDOW_US {
            self.statistics.updates_per_30s = self.update_count;
            self.statistics_window_start_us = now;
            self.update_count = 0;
        }
        self.update_count = self.update_count.saturating_add(1);

        self.scheduler.sweep(io.millis(), self.channel, midi);

        self.read_multiplexers(io, now);

        for index in 0..self.pads.len() {
            if self.pads[index].is_enabled() {
                self.evaluate_pad(index, now, io, midi);
            }
        }
    }

    fn read_multiplexers<IO: DrumIo>(&mut self, io: &mut IO, now: TimeUs) {
        if self.muxes.is_empty() {
            return;
        }

        if self.mux_flush {
            self.stabilize_multiplexers(io, now);
        }

        for mux in self.muxes.iter_mut() {
            mux.scan(io);
        }
    }

    /// Flushes the multiplexers if they were never read or not read for a while.
    ///
    /// Without regular reads the line capacitance lets the inputs drop towards 0 V. The bias
    /// voltage has to be re-established before readings are usable again.
    fn stabilize_multiplexers<IO: DrumIo>(&mut self, io: &mut IO, now: TimeUs) {
        let idle_us = self.last_mux_read_us.map(|last| now.saturating_sub(last));
        match idle_us {
            Some(idle_us) if idle_us <= FLUSH_GAP_US => {
                self.last_mux_read_us = Some(now);
                return;
            }
            Some(idle_us) => log::debug!("Flush Mux: {} us", idle_us),
            None => log::debug!("Flush Mux: first scan"),
        }
        self.flush_multiplexers(io);
        self.last_mux_read_us = Some(io.micros());
    }

    fn flush_multiplexers<IO: DrumIo>(&mut self, io: &mut IO) {
        let start = io.millis();
        loop {
            for mux in self.muxes.iter_mut() {
                mux.scan(io);
            }
            if io.millis().saturating_sub(start) >= FLUSH_DURATION_MS {
                break;
            }
        }
    }

    fn sense_pad<IO: DrumIo>(&mut self, index: usize, now: TimeUs, io: &mut IO) {
        let Some(pad) = self.pads.get_mut(index) else {
            return;
        };
        let connector = pad
            .connector()
            .and_then(|id| self.connectors.get_mut(id.0 as usize));
        let mut input = PadInput::new(io, &self.muxes, connector);
        pad.sense(now, &mut input);
    }

    fn evaluate_pad<IO: DrumIo, M: MidiOut>(
        &mut self,
        index: usize,
        now: TimeUs,
        io: &mut IO,
        midi: &mut M,
    ) {
        let (pad_type, pedal) = {
            let pad = &self.pads[index];
            (pad.pad_type(), pad.pedal())
        };

        match (pad_type, pedal) {
            (PadType::Drum, _) => {
                self.sense_pad(index, now, io);
                self.evaluate_drum(index, io, midi);
            }
            (PadType::Cymbal, Some(pedal)) => {
                self.sense_pad(pedal.index(), now, io);
                self.sense_pad(index, now, io);
                self.evaluate_hihat(index, pedal.index(), io, midi);
            }
            (PadType::Cymbal, None) => {
                self.sense_pad(index, now, io);
                let notes = self.pads[index].mappings.cymbal_notes();
                self.evaluate_cymbal(index, notes, io, midi);
            }
            // sensed through its cymbal
            (PadType::Pedal, _) => {}
        }
    }

    fn evaluate_drum<IO: DrumIo, M: MidiOut>(&mut self, index: usize, io: &mut IO, midi: &mut M) {
        let pad = &self.pads[index];
        let Some(zone) = pad.hit_zone() else {
            return;
        };
        let velocity = pad.hit_velocities[zone];
        let (note, label) = match zone {
            0 => (pad.mappings.note_main, "main"),
            1 => (pad.mappings.note_rim, "rim"),
            _ => (pad.mappings.note_cross, "cross stick"),
        };
        log::debug!("{} hit {}: {}", pad.name(), label, velocity);
        self.play_hit(index, zone, note, velocity, io, midi);
    }

    fn evaluate_hihat<IO: DrumIo, M: MidiOut>(
        &mut self,
        index: usize,
        pedal_index: usize,
        io: &mut IO,
        midi: &mut M,
    ) {
        let pedal = &self.pads[pedal_index];
        let hihat = pedal.hihat;
        let closed_notes = hihat.state == HiHatState::Closed && pedal.mappings.closed_notes_enabled;
        let chick = pedal.hits[0].then_some((pedal.mappings.note_main, pedal.hit_velocities[0]));
        let position = pedal.sensor_values[0];

        if hihat.is_moving {
            midi.send_control_change(self.pedal_cc, hihat.pedal_cc, self.channel);
            self.push_event(KitEvent::Pedal {
                pad: pad_id(pedal_index),
                position,
                cc: hihat.pedal_cc,
                state: hihat.state,
            });
        }

        let mappings = &self.pads[index].mappings;
        let notes = if closed_notes { mappings.closed_cymbal_notes() } else { mappings.cymbal_notes() };
        self.evaluate_cymbal(index, notes, io, midi);

        if let Some((note, velocity)) = chick {
            self.play_hit(pedal_index, 0, note, velocity, io, midi);
        }
    }

    fn evaluate_cymbal<IO: DrumIo, M: MidiOut>(
        &mut self,
        index: usize,
        notes: [Option<MidiNote>; MAX_ZONES],
        io: &mut IO,
        midi: &mut M,
    ) {
        let pad = &self.pads[index];
        if let Some(zone) = pad.hit_zone() {
            let velocity = pad.hit_velocities[zone];
            log::debug!("{} hit {}: {}", pad.name(), ["bow", "edge", "cup"][zone], velocity);
            self.play_hit(index, zone, notes[zone], velocity, io, midi);
        } else if pad.cymbal.is_choked {
            log::debug!("{} choked", pad.name());
            let zones = pad.active_zone_count().min(MAX_ZONES);
            let notes = &notes[..zones];
            for note in notes.iter().flatten() {
                midi.send_after_touch(*note, 127, self.channel);
            }
            for note in notes.iter().flatten() {
                midi.send_after_touch(*note, 0, self.channel);
            }
            self.push_event(KitEvent::Choke { pad: pad_id(index) });
        }
    }

    /// Books a hit and plays its note, if the zone has one.
    fn play_hit<IO: DrumIo, M: MidiOut>(
        &mut self,
        index: usize,
        zone: ZoneIndex,
        note: Option<MidiNote>,
        velocity: Velocity,
        io: &mut IO,
        midi: &mut M,
    ) {
        io.led(Led::HitIndicator, true);
        self.last_hit_us = Some(io.micros());
        self.push_event(KitEvent::Hit { pad: pad_id(index), zone, velocity });

        if let Some(note) = note {
            self.scheduler.note_on(note, velocity, self.channel, io.millis(), midi);
        }
    }

    fn push_event(&mut self, event: KitEvent) {
        if self.events.push(event).is_err() {
            log::trace!("Event list full, dropping {:?}", event);
        }
    }

    // Configuration

    /// Removes all pads, connectors and multiplexers. Pending notes are released and the hit
    /// indicator goes dark.
    pub fn clear<IO: DrumIo, M: MidiOut>(&mut self, io: &mut IO, midi: &mut M) {
        self.scheduler.release_all(self.channel, midi);
        self.pads.clear();
        self.connectors.clear();
        self.muxes.clear();
        self.events.clear();
        self.last_mux_read_us = None;
        self.last_hit_us = None;
        io.led(Led::HitIndicator, false);
    }

    /// Adds and initializes a multiplexer.
    ///
    /// A mux whose pins cannot be initialized is still added (so indices stay stable) but never
    /// scanned, its channels read 0.
    pub fn add_mux<IO: DrumIo>(&mut self, mut mux: DrumMux, io: &mut IO) -> Result<MuxId, ConfigError> {
        if self.muxes.is_full() {
            return Err(ConfigError::CapacityExceeded { what: "mux", max: MAX_MUX_COUNT });
        }

        match mux.init(io) {
            Ok(()) => log::info!("{}", mux),
            Err(err) => log::error!("{} disabled: {}", mux, err),
        }

        let id = MuxId(self.muxes.len() as u8);
        self.muxes
            .push(mux)
            .map_err(|_| ConfigError::CapacityExceeded { what: "mux", max: MAX_MUX_COUNT })?;
        Ok(id)
    }

    /// Adds a connector. Pins on multiplexers must reference an existing mux channel, direct
    /// pins are initialized as analog inputs.
    pub fn add_connector<IO: DrumIo>(
        &mut self,
        id: &str,
        pins: &[DrumPin],
        io: &mut IO,
    ) -> Result<ConnectorId, ConfigError> {
        if self.connectors.is_full() {
            return Err(ConfigError::CapacityExceeded {
                what: "connector",
                max: MAX_CONNECTOR_COUNT,
            });
        }
        if self.find_connector(id).is_some() {
            return Err(ConfigError::DuplicateConnector(name(id)));
        }
        if pins.is_empty() {
            return Err(ConfigError::NoPins(name(id)));
        }

        for pin in pins {
            match pin.source {
                PinSource::Mux { mux: mux_id, channel } => {
                    let mux = self
                        .muxes
                        .get(mux_id.0 as usize)
                        .ok_or(ConfigError::UnknownMux(mux_id.0))?;
                    if channel as usize >= mux.channel_count() {
                        return Err(ConfigError::InvalidMuxChannel { mux: mux_id.0, channel });
                    }
                }
                PinSource::Direct(pin) => io.init_analog_in_pin(pin)?,
            }
        }

        let connector_id = ConnectorId(self.connectors.len() as u8);
        self.connectors
            .push(DrumConnector::new(name(id), pins))
            .map_err(|_| ConfigError::CapacityExceeded {
                what: "connector",
                max: MAX_CONNECTOR_COUNT,
            })?;
        Ok(connector_id)
    }

    /// Adds a pad wired to the connector `connector`.
    ///
    /// A pad without a known connector is still added, but disabled.
    pub fn add_pad(&mut self, mut pad: DrumPad, connector: Option<&str>) -> Result<PadId, ConfigError> {
        if self.pads.is_full() {
            return Err(ConfigError::CapacityExceeded { what: "pad", max: MAX_PAD_COUNT });
        }

        match connector {
            None => {
                log::error!("Pad[{}]: property 'connector' missing", pad.name());
                pad.set_enabled(false);
            }
            Some(id) => match self.find_connector(id) {
                Some(connector_id) => {
                    let pin_count = self.connectors[connector_id.0 as usize].pin_count();
                    pad.attach_connector(connector_id, pin_count);
                }
                None => {
                    log::error!("Pad[{}]: {}", pad.name(), ConfigError::UnknownConnector(name(id)));
                    pad.set_enabled(false);
                }
            },
        }

        let id = pad_id(self.pads.len());
        self.pads
            .push(pad)
            .map_err(|_| ConfigError::CapacityExceeded { what: "pad", max: MAX_PAD_COUNT })?;
        Ok(id)
    }

    /// Pairs a cymbal with the pedal pad of role `pedal_role`, making it a hi-hat.
    pub fn link_pedal(&mut self, cymbal: PadId, pedal_role: &str) -> Result<(), ConfigError> {
        if cymbal.index() >= self.pads.len() {
            return Err(ConfigError::UnknownPad(cymbal.0));
        }
        let pedal = self
            .find_pad_by_role(pedal_role)
            .ok_or_else(|| ConfigError::UnknownPedal(name(pedal_role)))?;
        let pedal_pad = &self.pads[pedal.index()];
        if pedal_pad.pad_type() != PadType::Pedal {
            return Err(ConfigError::NotAPedal(name(pedal_pad.name())));
        }

        self.pads[cymbal.index()].set_pedal(Some(pedal));
        Ok(())
    }

    pub fn gate_time(&self) -> TimeMs {
        self.scheduler.gate_time()
    }

    /// Sets the time between note-on and note-off, 0 sends both at once. Clamped to 30 s.
    pub fn set_gate_time(&mut self, gate_time_ms: TimeMs) {
        self.scheduler.set_gate_time(gate_time_ms);
    }

    pub fn midi_channel(&self) -> Channel {
        self.channel
    }

    pub fn set_midi_channel(&mut self, channel: Channel) {
        self.channel = channel.clamp(1, 16);
    }

    pub fn pedal_cc(&self) -> u8 {
        self.pedal_cc
    }

    pub fn set_pedal_cc(&mut self, cc: u8) {
        self.pedal_cc = cc & 0x7F;
    }

    /// Enables the multiplexer flush after long pauses. Simulated boards don't need it.
    pub fn set_mux_flush(&mut self, enabled: bool) {
        self.mux_flush = enabled;
    }

    // Lookup

    pub fn pads(&self) -> &[DrumPad] {
        &self.pads
    }

    pub fn pad(&self, id: PadId) -> Option<&DrumPad> {
        self.pads.get(id.index())
    }

    pub fn pad_mut(&mut self, id: PadId) -> Option<&mut DrumPad> {
        self.pads.get_mut(id.index())
    }

    pub fn find_pad_by_name(&self, pad_name: &str) -> Option<PadId> {
        self.pads.iter().position(|pad| pad.name() == pad_name).map(pad_id)
    }

    pub fn find_pad_by_role(&self, role: &str) -> Option<PadId> {
        self.pads.iter().position(|pad| pad.role() == role).map(pad_id)
    }

    pub fn muxes(&self) -> &[DrumMux] {
        &self.muxes
    }

    pub fn mux(&self, id: MuxId) -> Option<&DrumMux> {
        self.muxes.get(id.0 as usize)
    }

    pub fn connectors(&self) -> &[DrumConnector] {
        &self.connectors
    }

    pub fn find_connector(&self, id: &str) -> Option<ConnectorId> {
        self.connectors
            .iter()
            .position(|connector| connector.id() == id)
            .map(|index| ConnectorId(index as u8))
    }

    /// Events of the last [`DrumKit::update`].
    pub fn events(&self) -> &[KitEvent] {
        &self.events
    }

    pub fn statistics(&self) -> Statistics {
        self.statistics
    }
}

fn pad_id(index: usize) -> PadId {
    PadId(index as u8)
}
