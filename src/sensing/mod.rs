//! Per-pad hit detection.
//!
//! Each pad is driven by one of three strategies, picked from its [`ZonesType`]:
//! - [`piezo`] for pads where every zone is a piezo (drums, piezo-only cymbals);
//! - [`piezo_switch`] for a main piezo plus edge/cup switches (cymbals, choke);
//! - [`controller`] for continuous controllers (hi-hat pedal).
//!
//! Piezo based strategies share the same three state cycle: [`SensingState::PeakDetect`] waits
//! for a threshold crossing, [`SensingState::Scan`] tracks the peak for `scan_time_us` and
//! [`SensingState::Mask`] ignores ringing for `mask_time_ms`.

use crate::connector::DrumConnector;
use crate::io::DrumIo;
use crate::mux::DrumMux;
use crate::pad::DrumPad;
use crate::pin::ReadFlags;
use crate::settings::ZonesType;
use crate::types::{SensorValue, TimeUs};

pub mod controller;
pub mod piezo;
pub mod piezo_switch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensingState {
    #[default]
    PeakDetect,
    Scan,
    Mask,
}

/// Sensing algorithm of a pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Piezo,
    PiezoSwitch,
    Controller,
}

impl From<ZonesType> for Strategy {
    fn from(zones: ZonesType) -> Self {
        match zones {
            ZonesType::Zones1Piezo | ZonesType::Zones2Piezos | ZonesType::Zones3Piezos => {
                Self::Piezo
            }
            ZonesType::Zones2PiezoAndSwitch
            | ZonesType::Zones3PiezoAndSwitches1Trs
            | ZonesType::Zones3PiezoAndSwitches2Trs => Self::PiezoSwitch,
            ZonesType::Zones1Controller => Self::Controller,
        }
    }
}

impl Strategy {
    pub fn sense<IO: DrumIo>(self, pad: &mut DrumPad, now: TimeUs, input: &mut PadInput<'_, IO>) {
        match self {
            Self::Piezo => piezo::sense(pad, now, input),
            Self::PiezoSwitch => piezo_switch::sense(pad, now, input),
            Self::Controller => controller::sense(pad, now, input),
        }
    }
}

/// Everything a strategy needs to sample the pins of one pad.
pub struct PadInput<'a, IO> {
    io: &'a mut IO,
    muxes: &'a [DrumMux],
    connector: Option<&'a mut DrumConnector>,
}

impl<'a, IO: DrumIo> PadInput<'a, IO> {
    pub fn new(
        io: &'a mut IO,
        muxes: &'a [DrumMux],
        connector: Option<&'a mut DrumConnector>,
    ) -> Self {
        Self { io, muxes, connector }
    }

    /// Reads and conditions pin `index` of the connector. Missing pins read 0.
    pub fn read(&mut self, index: usize, flags: ReadFlags) -> SensorValue {
        match self.connector.as_deref_mut().and_then(|c| c.pin_mut(index)) {
            Some(pin) => pin.read(&mut *self.io, self.muxes, flags),
            None => 0,
        }
    }
}

/// Mask window still running at `now`.
pub(crate) fn mask_active(pad: &DrumPad, now: TimeUs) -> bool {
    now.saturating_sub(pad.scan_end_us) < pad.settings.mask_time_ms as TimeUs * 1000
}

/// Scan window still running at `now`.
pub(crate) fn scan_active(pad: &DrumPad, now: TimeUs) -> bool {
    now.saturating_sub(pad.hit_time_us) < pad.settings.scan_time_us as TimeUs
}
