//! Boundary towards the board: raw pin access, status LEDs and the monotonic clock.
//!
//! The sensing pipeline never touches registers directly. Everything it needs from the hardware
//! goes through [`DrumIo`], which lets the same kit run on the trigger board, in a simulator or
//! inside unit tests.

use embedded_hal::delay::DelayNs;
pub use embedded_hal::digital::PinState;

use crate::error::IoError;
use crate::types::{PinId, SensorValue, TimeMs, TimeUs};

/// Status LEDs available on the trigger module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Led {
    /// Lit for a short moment after each detected hit.
    HitIndicator,
}

/// Raw hardware access used by the sensing pipeline.
///
/// The [`DelayNs`] supertrait provides the short settle delays needed when switching
/// multiplexer channels.
pub trait DrumIo: DelayNs {
    /// Configures `pin` as analog input.
    fn init_analog_in_pin(&mut self, pin: PinId) -> Result<(), IoError>;

    /// Reads a 10 bit ADC value (`0..=1023`) from `pin`.
    fn read_analog_in_pin(&mut self, pin: PinId) -> SensorValue;

    /// Configures `pin` as push-pull digital output.
    fn init_digital_out_pin(&mut self, pin: PinId) -> Result<(), IoError>;

    fn write_digital_out_pin(&mut self, pin: PinId, state: PinState);

    /// Switches a status LED. Boards without the LED ignore the request.
    fn led(&mut self, _led: Led, _enable: bool) {}

    /// Monotonic time since boot in microseconds.
    fn micros(&self) -> TimeUs;

    /// Monotonic time since boot in milliseconds.
    fn millis(&self) -> TimeMs {
        self.micros() / 1000
    }
}
