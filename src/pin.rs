//! Sensor pins and per-pin signal conditioning.

use core::fmt;

use crate::io::DrumIo;
use crate::mux::DrumMux;
use crate::types::{MAX_SENSOR_VALUE, MuxId, PinId, SensorValue};

/// Counter value at which the bias estimate moves by one step.
const BALANCE_THRESHOLD: i16 = 512;

/// Where a pin gets its samples from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinSource {
    /// ADC pin of the board.
    Direct(PinId),
    /// Channel of a multiplexer, sampled during the mux scan.
    Mux { mux: MuxId, channel: u8 },
}

/// Electrical shape of the signal on a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalType {
    /// Used as read.
    Normal,
    /// The multiplexer output carries a bias voltage (calibrated to mid range) so that the negative
    /// half-waves of a piezo can be sampled. Values below the bias are negative voltages.
    VoltageOffset,
}

/// How a reading is conditioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadFlags {
    /// Track the bias of the pin and rescale around it instead of using the nominal midpoint.
    pub auto_calibrate: bool,
    /// Ignore the bias voltage, the signal is unipolar (e.g. a potentiometer).
    pub plain: bool,
    /// Flip the conditioned value (`1023 - v`).
    pub invert: bool,
}

impl ReadFlags {
    pub const NONE: Self = Self { auto_calibrate: false, plain: false, invert: false };

    pub fn auto_calibrate(enabled: bool) -> Self {
        Self { auto_calibrate: enabled, ..Self::NONE }
    }

    /// Flags of a continuous controller: unipolar and inverted.
    pub const CONTROLLER: Self = Self { auto_calibrate: false, plain: true, invert: true };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrumPin {
    pub source: PinSource,
    offset: SensorValue,
    offset_balance: i16,
}

impl DrumPin {
    pub fn direct(pin: PinId) -> Self {
        Self::new(PinSource::Direct(pin))
    }

    pub fn mux(mux: MuxId, channel: u8) -> Self {
        Self::new(PinSource::Mux { mux, channel })
    }

    fn new(source: PinSource) -> Self {
        Self { source, offset: MAX_SENSOR_VALUE / 2, offset_balance: 0 }
    }

    /// Muxed lines carry a bias voltage, pins wired straight to the ADC don't.
    pub fn signal_type(&self) -> SignalType {
        match self.source {
            PinSource::Direct(_) => SignalType::Normal,
            PinSource::Mux { .. } => SignalType::VoltageOffset,
        }
    }

    /// Current bias estimate.
    pub fn offset(&self) -> SensorValue {
        self.offset
    }

    /// Feeds `value` into the bias tracker and returns the (possibly moved) estimate.
    ///
    /// Every reading above the estimate counts up, every reading below counts down. Once the
    /// counter reaches ±512 the estimate moves by one and the counter restarts.
    pub fn update_offset(&mut self, value: SensorValue) -> SensorValue {
        if value > self.offset {
            self.offset_balance = self.offset_balance.saturating_add(1);
        } else if value < self.offset {
            self.offset_balance = self.offset_balance.saturating_sub(1);
        }

        if self.offset_balance >= BALANCE_THRESHOLD {
            self.offset = (self.offset + 1).min(MAX_SENSOR_VALUE);
            self.offset_balance = 0;
        } else if self.offset_balance <= -BALANCE_THRESHOLD {
            self.offset = self.offset.saturating_sub(1);
            self.offset_balance = 0;
        }

        self.offset
    }

    /// Samples the pin and conditions the value.
    ///
    /// Muxed pins read the value buffered during the last mux scan, direct pins are sampled now.
    /// A pin on a missing or uninitialized mux is silent: it reads 0 after conditioning.
    pub fn read<IO: DrumIo>(
        &mut self,
        io: &mut IO,
        muxes: &[DrumMux],
        flags: ReadFlags,
    ) -> SensorValue {
        let raw = match self.source {
            PinSource::Direct(pin) => io.read_analog_in_pin(pin),
            PinSource::Mux { mux, channel } => match muxes.get(mux.0 as usize) {
                Some(mux) if mux.is_initialized() => mux.read_channel(channel),
                // a raw 0 would fold into a full scale strike
                _ => return 0,
            },
        };
        self.condition(raw, flags)
    }

    /// Removes the bias of a bipolar signal and folds negative half-waves up.
    ///
    /// With a 1.5 V bias: `0 (-1.5 V) -> 1022`, `511 (0 V) -> 0`, `1023 (+1.5 V) -> 1023`.
    pub fn condition(&mut self, raw: SensorValue, flags: ReadFlags) -> SensorValue {
        let raw = raw.min(MAX_SENSOR_VALUE);
        let mut result = raw;

        if self.signal_type() == SignalType::VoltageOffset && !flags.plain {
            result = if flags.auto_calibrate {
                let offset = self.update_offset(raw);
                rescale_around(raw, offset)
            } else {
                let folded = raw.abs_diff(MAX_SENSOR_VALUE / 2) * 2;
                folded.min(MAX_SENSOR_VALUE)
            };
        }

        if flags.invert {
            result = MAX_SENSOR_VALUE - result;
        }
        result
    }
}

/// Headroom above and below the bias differs, so each side gets its own scale factor.
fn rescale_around(raw: SensorValue, offset: SensorValue) -> SensorValue {
    let max = MAX_SENSOR_VALUE as u32;
    let (distance, headroom) = if raw > offset {
        (raw - offset, MAX_SENSOR_VALUE - offset)
    } else {
        (offset - raw, offset)
    };
    if headroom == 0 {
        return MAX_SENSOR_VALUE;
    }
    (distance as u32 * max / headroom as u32).min(max) as SensorValue
}

impl fmt::Display for DrumPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            PinSource::Direct(pin) => write!(f, "{}", pin),
            PinSource::Mux { mux, channel } => write!(f, "{}@{}", channel, mux.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockIo;

    #[test]
    fn direct_pins_are_not_conditioned() {
        let mut pin = DrumPin::direct(3);
        assert_eq!(pin.signal_type(), SignalType::Normal);
        assert_eq!(pin.condition(0, ReadFlags::NONE), 0);
        assert_eq!(pin.condition(700, ReadFlags::NONE), 700);
        assert_eq!(pin.condition(700, ReadFlags::auto_calibrate(true)), 700);
    }

    #[test]
    fn fixed_bias_folds_around_midpoint() {
        let mut pin = DrumPin::mux(MuxId(0), 2);
        assert_eq!(pin.condition(511, ReadFlags::NONE), 0);
        assert_eq!(pin.condition(0, ReadFlags::NONE), 1022);
        assert_eq!(pin.condition(611, ReadFlags::NONE), 200);
        assert_eq!(pin.condition(411, ReadFlags::NONE), 200);
        // 1023 would fold to 1024
        assert_eq!(pin.condition(1023, ReadFlags::NONE), 1023);
        // fixed mode never touches the estimate
        assert_eq!(pin.offset(), 511);
    }

    #[test]
    fn auto_calibration_scales_each_side() {
        let mut pin = DrumPin::mux(MuxId(0), 0);
        let flags = ReadFlags::auto_calibrate(true);
        assert_eq!(pin.condition(511, flags), 0);
        assert_eq!(pin.condition(1023, flags), 1023);
        assert_eq!(pin.condition(0, flags), 1023);
        assert_eq!(pin.condition(767, flags), 511);
    }

    #[test]
    fn bias_at_either_end_reads_full_scale() {
        let flags = ReadFlags::auto_calibrate(true);

        let mut pin = DrumPin::mux(MuxId(0), 0);
        while pin.offset() > 0 {
            pin.update_offset(0);
        }
        assert_eq!(pin.condition(0, flags), 1023);
        assert_eq!(pin.condition(512, flags), 512);

        let mut pin = DrumPin::mux(MuxId(0), 0);
        while pin.offset() < MAX_SENSOR_VALUE {
            pin.update_offset(MAX_SENSOR_VALUE);
        }
        assert_eq!(pin.condition(MAX_SENSOR_VALUE, flags), 0);
        assert_eq!(pin.condition(0, flags), 1023);
    }

    #[test]
    fn uninitialized_mux_reads_silence() {
        let mut io = MockIo::new();
        io.wire_mux(2, &[16, 17, 18]);
        let muxes = [DrumMux::hc4051([16, 17, 18], 2, None)];
        assert!(!muxes[0].is_initialized());

        let mut pin = DrumPin::mux(MuxId(0), 5);
        assert_eq!(pin.read(&mut io, &muxes, ReadFlags::NONE), 0);
        assert_eq!(pin.read(&mut io, &muxes, ReadFlags::auto_calibrate(true)), 0);
        assert_eq!(pin.read(&mut io, &muxes, ReadFlags::CONTROLLER), 0);

        let mut unknown = DrumPin::mux(MuxId(3), 0);
        assert_eq!(unknown.read(&mut io, &muxes, ReadFlags::NONE), 0);
        assert!(io.reads.is_empty());
    }

    #[test]
    fn offset_drifts_after_balance_threshold() {
        let mut pin = DrumPin::mux(MuxId(0), 0);
        for _ in 0..511 {
            assert_eq!(pin.update_offset(600), 511);
        }
        assert_eq!(pin.update_offset(600), 512);

        // counter restarted, equal readings don't count
        for _ in 0..1000 {
            pin.update_offset(512);
        }
        assert_eq!(pin.offset(), 512);

        for _ in 0..512 {
            pin.update_offset(0);
        }
        assert_eq!(pin.offset(), 511);
    }

    #[test]
    fn controller_reads_are_plain_and_inverted() {
        let mut pin = DrumPin::mux(MuxId(1), 4);
        assert_eq!(pin.condition(0, ReadFlags::CONTROLLER), 1023);
        assert_eq!(pin.condition(1023, ReadFlags::CONTROLLER), 0);
        assert_eq!(pin.condition(300, ReadFlags::CONTROLLER), 723);
    }

    #[test]
    fn display() {
        assert_eq!(DrumPin::direct(7).to_string(), "7");
        assert_eq!(DrumPin::mux(MuxId(1), 12).to_string(), "12@1");
    }
}
