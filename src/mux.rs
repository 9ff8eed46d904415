//! Analog multiplexers (74HC4051 / 74HC4067) in front of a single ADC pin.

use core::fmt;

use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, IoError};
use crate::io::{DrumIo, PinState};
use crate::types::{PinId, SensorValue};

/// Maximum channels of a single multiplexer.
pub const MAX_CHANNEL_COUNT: usize = 16;
const MAX_SELECT_PINS: usize = 4;

/// Switch-on time of the HC40xx at 3.3 V is between 45 and 225 ns.
const SETTLE_DELAY_NS: u32 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MuxType {
    /// 8 channels, 3 select pins.
    HC4051,
    /// 16 channels, 4 select pins.
    HC4067,
}

impl MuxType {
    pub fn select_pin_count(self) -> usize {
        match self {
            Self::HC4051 => 3,
            Self::HC4067 => 4,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::HC4051 => "HC4051",
            Self::HC4067 => "HC4067",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DrumMux {
    kind: MuxType,
    select_pins: Vec<PinId, MAX_SELECT_PINS>,
    analog_in_pin: PinId,
    /// Active low.
    enable_pin: Option<PinId>,
    initialized: bool,
    channels: [SensorValue; MAX_CHANNEL_COUNT],
}

impl DrumMux {
    /// Describes a multiplexer. Nothing is touched on the board until [`DrumMux::init`].
    pub fn new(
        kind: MuxType,
        select_pins: &[PinId],
        analog_in_pin: PinId,
        enable_pin: Option<PinId>,
    ) -> Result<Self, ConfigError> {
        let expected = kind.select_pin_count();
        if select_pins.len() != expected {
            return Err(ConfigError::InvalidSelectPinCount {
                kind: kind.name(),
                expected,
                got: select_pins.len(),
            });
        }

        Ok(Self::with_pins(kind, select_pins, analog_in_pin, enable_pin))
    }

    pub fn hc4051(select_pins: [PinId; 3], analog_in_pin: PinId, enable_pin: Option<PinId>) -> Self {
        Self::with_pins(MuxType::HC4051, &select_pins, analog_in_pin, enable_pin)
    }

    pub fn hc4067(select_pins: [PinId; 4], analog_in_pin: PinId, enable_pin: Option<PinId>) -> Self {
        Self::with_pins(MuxType::HC4067, &select_pins, analog_in_pin, enable_pin)
    }

    fn with_pins(
        kind: MuxType,
        select_pins: &[PinId],
        analog_in_pin: PinId,
        enable_pin: Option<PinId>,
    ) -> Self {
        Self {
            kind,
            select_pins: select_pins.iter().take(MAX_SELECT_PINS).copied().collect(),
            analog_in_pin,
            enable_pin,
            initialized: false,
            channels: [0; MAX_CHANNEL_COUNT],
        }
    }

    /// Configures all pins of the mux. Select and enable pins start high, which leaves the mux
    /// disabled.
    ///
    /// Every pin is attempted even if an earlier one failed. On failure the mux stays
    /// uninitialized and [`DrumMux::scan`] does nothing.
    pub fn init<IO: DrumIo>(&mut self, io: &mut IO) -> Result<(), IoError> {
        let mut result = Ok(());

        if let Err(err) = io.init_analog_in_pin(self.analog_in_pin) {
            log::error!("Mux: cannot initialize analog in pin {}: {}", self.analog_in_pin, err);
            result = Err(err);
        }

        if let Some(pin) = self.enable_pin {
            match io.init_digital_out_pin(pin) {
                Ok(()) => io.write_digital_out_pin(pin, PinState::High),
                Err(err) => {
                    log::error!("Mux: cannot initialize enable pin {}: {}", pin, err);
                    result = result.and(Err(err));
                }
            }
        }

        for &pin in &self.select_pins {
            match io.init_digital_out_pin(pin) {
                Ok(()) => io.write_digital_out_pin(pin, PinState::High),
                Err(err) => {
                    log::error!("Mux: cannot initialize select pin {}: {}", pin, err);
                    result = result.and(Err(err));
                }
            }
        }

        self.initialized = result.is_ok();
        result
    }

    pub fn kind(&self) -> MuxType {
        self.kind
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn channel_count(&self) -> usize {
        1 << self.select_pins.len()
    }

    pub fn analog_in_pin(&self) -> PinId {
        self.analog_in_pin
    }

    pub fn enable_pin(&self) -> Option<PinId> {
        self.enable_pin
    }

    pub fn select_pins(&self) -> &[PinId] {
        &self.select_pins
    }

    /// Value of `channel` sampled during the last [`DrumMux::scan`]. Unknown channels read 0.
    pub fn read_channel(&self, channel: u8) -> SensorValue {
        self.channels.get(channel as usize).copied().unwrap_or(0)
    }

    /// Samples every channel into the channel buffer.
    pub fn scan<IO: DrumIo>(&mut self, io: &mut IO) {
        if !self.initialized {
            return;
        }

        for channel in 0..self.channel_count() {
            // switch while disabled, otherwise the transient of the previous channel is sampled
            self.select_channel(io, channel);
            self.set_enabled(io, true);
            io.delay_ns(SETTLE_DELAY_NS);
            self.channels[channel] = io.read_analog_in_pin(self.analog_in_pin);
            self.set_enabled(io, false);
        }
    }

    fn set_enabled<IO: DrumIo>(&self, io: &mut IO, enable: bool) {
        if let Some(pin) = self.enable_pin {
            io.write_digital_out_pin(pin, if enable { PinState::Low } else { PinState::High });
        }
    }

    fn select_channel<IO: DrumIo>(&self, io: &mut IO, channel: usize) {
        for (bit, &pin) in self.select_pins.iter().enumerate() {
            let state = PinState::from(channel & (1 << bit) != 0);
            io.write_digital_out_pin(pin, state);
        }
    }
}

impl fmt::Display for DrumMux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Mux: {} Select-Pins: {:?} AnalogIn-Pin: {}",
            self.kind.name(),
            self.select_pins.as_slice(),
            self.analog_in_pin
        )?;
        match self.enable_pin {
            Some(pin) => write!(f, " Enable-Pin: {}", pin),
            None => write!(f, " Enable-Pin: -"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockIo;

    #[test]
    fn init_drives_select_and_enable_high() {
        let mut io = MockIo::new();
        let mut mux = DrumMux::hc4051([10, 11, 12], 0, Some(13));
        assert!(mux.init(&mut io).is_ok());
        assert!(mux.is_initialized());
        for pin in [10, 11, 12, 13] {
            assert_eq!(io.output(pin), Some(PinState::High));
        }
        assert_eq!(mux.channel_count(), 8);
    }

    #[test]
    fn scan_reads_every_channel() {
        let mut io = MockIo::new();
        io.wire_mux(1, &[16, 17, 18, 19]);
        for channel in 0..16 {
            io.set_mux_channel(1, channel, 100 + channel as SensorValue);
        }

        let mut mux = DrumMux::hc4067([16, 17, 18, 19], 1, None);
        mux.init(&mut io).unwrap();
        mux.scan(&mut io);

        for channel in 0..16 {
            assert_eq!(mux.read_channel(channel), 100 + channel as SensorValue);
        }
        assert_eq!(mux.read_channel(16), 0);
        assert_eq!(io.delays_ns, 16 * 250);
    }

    #[test]
    fn scan_toggles_enable_around_each_sample() {
        let mut io = MockIo::new();
        io.wire_mux(0, &[20, 21, 22]);
        let mut mux = DrumMux::hc4051([20, 21, 22], 0, Some(23));
        mux.init(&mut io).unwrap();
        io.writes.clear();

        mux.scan(&mut io);

        let enable: std::vec::Vec<PinState> = io
            .writes
            .iter()
            .filter(|(pin, _)| *pin == 23)
            .map(|(_, state)| *state)
            .collect();
        assert_eq!(enable.len(), 16);
        assert!(enable.chunks(2).all(|c| c == [PinState::Low, PinState::High]));
        // channel 5 = 0b101
        let select_for_5 = &io.writes[5 * 5..5 * 5 + 3];
        assert_eq!(
            select_for_5,
            [(20, PinState::High), (21, PinState::Low), (22, PinState::High)]
        );
        assert_eq!(io.output(23), Some(PinState::High));
    }

    #[test]
    fn failed_init_disables_scan() {
        let mut io = MockIo::new();
        io.failing_pins.push(11);
        let mut mux = DrumMux::hc4051([10, 11, 12], 0, None);
        assert_eq!(mux.init(&mut io), Err(IoError::Unsupported(11)));
        assert!(!mux.is_initialized());
        // later pins were still configured
        assert_eq!(io.output(12), Some(PinState::High));

        mux.scan(&mut io);
        assert!(io.reads.is_empty());
    }

    #[test]
    fn select_pin_count_is_checked() {
        let err = DrumMux::new(MuxType::HC4067, &[1, 2, 3], 0, None).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidSelectPinCount { kind: "HC4067", expected: 4, got: 3 }
        );
        assert!(DrumMux::new(MuxType::HC4051, &[1, 2, 3], 0, None).is_ok());
    }
}
