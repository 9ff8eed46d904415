//! The STM32F103 trigger board.
//!
//! # Pin Mapping
//!
//! | `PinId` | Port      | Use                                       |
//! |---------|-----------|-------------------------------------------|
//! | 0..=7   | PA0..PA7  | analog in (ADC1 channel 0..7)             |
//! | 16..=31 | PB0..PB15 | digital out (mux select and enable lines) |
//!
//! PB3 and PB4 belong to the JTAG port and are refused. PB12 drives the hit indicator LED.

use core::cell::Cell;
use core::ops::Range;

use cortex_m::peripheral::{DCB, DWT};
use embedded_hal::delay::DelayNs;
use stm32f1::stm32f103::{ADC1, GPIOA, GPIOB, RCC};

use crate::error::IoError;
use crate::io::{DrumIo, Led, PinState};
use crate::types::{PinId, SensorValue, TimeUs};

/// System clock after the PLL switch in `Init`.
pub const SYSCLK_HZ: u32 = 72_000_000;
const CYCLES_PER_US: u64 = (SYSCLK_HZ / 1_000_000) as u64;

const ANALOG_PINS: Range<PinId> = 0..8;
const DIGITAL_PIN_OFFSET: PinId = 16;
const DIGITAL_PINS: Range<PinId> = DIGITAL_PIN_OFFSET..DIGITAL_PIN_OFFSET + 16;
const JTAG_PINS: [PinId; 2] = [DIGITAL_PIN_OFFSET + 3, DIGITAL_PIN_OFFSET + 4];
const HIT_LED_PIN: PinId = DIGITAL_PIN_OFFSET + 12;

/// 13.5 ADC cycles for channels 0..7.
const SAMPLE_TIME_BITS: u32 = 0o2222_2222;

/// Microseconds since boot from the DWT cycle counter.
///
/// The 32 bit counter wraps every 59.6 s at 72 MHz. Wraps are only noticed when the clock is
/// read, which the scan loop does thousands of times per second.
struct CycleClock {
    last: Cell<u32>,
    wraps: Cell<u64>,
}

impl CycleClock {
    fn new(dcb: &mut DCB, dwt: &mut DWT) -> Self {
        dcb.enable_trace();
        dwt.enable_cycle_counter();
        Self { last: Cell::new(DWT::cycle_count()), wraps: Cell::new(0) }
    }

    fn micros(&self) -> TimeUs {
        let now = DWT::cycle_count();
        if now < self.last.get() {
            self.wraps.set(self.wraps.get() + 1);
        }
        self.last.set(now);
        ((self.wraps.get() << 32) + now as u64) / CYCLES_PER_US
    }
}

/// Trigger board peripherals used by the sensing pipeline.
pub struct TriggerBoard {
    adc: ADC1,
    gpioa: GPIOA,
    gpiob: GPIOB,
    clock: CycleClock,
}

impl TriggerBoard {
    /// Enables ADC1 and the GPIO ports and calibrates the ADC.
    pub fn new(
        adc: ADC1,
        gpioa: GPIOA,
        gpiob: GPIOB,
        rcc: &mut RCC,
        dcb: &mut DCB,
        dwt: &mut DWT,
    ) -> Self {
        log::debug!("Configuring trigger board.");
        rcc.cfgr.modify(|_, w| w.adcpre().div6()); // 12 MHz, ADC maximum is 14 MHz
        rcc.apb2enr.modify(|_, w| {
            w.iopaen().set_bit()
                .iopben().set_bit()
                .adc1en().set_bit()
        });

        adc.cr2.modify(|_, w| w.adon().set_bit());
        // t_STAB
        cortex_m::asm::delay(72);

        adc.cr2.modify(|_, w| w.cal().set_bit());
        while adc.cr2.read().cal().bit_is_set() {}

        adc.smpr2.write(|w| unsafe { w.bits(SAMPLE_TIME_BITS) });
        adc.cr2.modify(|_, w| {
            w.extsel().swstart() /* Regular conversions are started by software. */
                .exttrig().set_bit()
        });

        let mut board = Self { adc, gpioa, gpiob, clock: CycleClock::new(dcb, dwt) };
        if let Err(err) = board.init_digital_out_pin(HIT_LED_PIN) {
            log::error!("Hit indicator LED: {}", err);
        }

        log::info!("ADC1 ready on PA0..PA7, digital outputs on PB0..PB15.");
        board
    }
}

impl DelayNs for TriggerBoard {
    fn delay_ns(&mut self, ns: u32) {
        let cycles = (ns as u64 * CYCLES_PER_US).div_ceil(1000);
        cortex_m::asm::delay(cycles as u32);
    }
}

impl DrumIo for TriggerBoard {
    fn init_analog_in_pin(&mut self, pin: PinId) -> Result<(), IoError> {
        if !ANALOG_PINS.contains(&pin) {
            return Err(IoError::InvalidPin(pin));
        }

        // MODE = 00 (input), CNF = 00 (analog)
        let shift = pin as u32 * 4;
        self.gpioa.crl.modify(|r, w| unsafe { w.bits(r.bits() & !(0xF << shift)) });
        Ok(())
    }

    fn read_analog_in_pin(&mut self, pin: PinId) -> SensorValue {
        if !ANALOG_PINS.contains(&pin) {
            return 0;
        }

        self.adc.sqr3.write(|w| unsafe { w.sq1().bits(pin) });
        self.adc.cr2.modify(|_, w| w.swstart().set_bit());
        while self.adc.sr.read().eoc().bit_is_clear() {}

        // 12 to 10 bit
        self.adc.dr.read().data().bits() >> 2
    }

    fn init_digital_out_pin(&mut self, pin: PinId) -> Result<(), IoError> {
        if !DIGITAL_PINS.contains(&pin) {
            return Err(IoError::InvalidPin(pin));
        }
        if JTAG_PINS.contains(&pin) {
            return Err(IoError::Unsupported(pin));
        }

        // MODE = 11 (output, 50 MHz), CNF = 00 (push-pull)
        let index = (pin - DIGITAL_PIN_OFFSET) as u32;
        let shift = (index % 8) * 4;
        let config = |bits: u32| (bits & !(0xF << shift)) | (0b0011 << shift);
        if index < 8 {
            self.gpiob.crl.modify(|r, w| unsafe { w.bits(config(r.bits())) });
        } else {
            self.gpiob.crh.modify(|r, w| unsafe { w.bits(config(r.bits())) });
        }
        Ok(())
    }

    fn write_digital_out_pin(&mut self, pin: PinId, state: PinState) {
        if !DIGITAL_PINS.contains(&pin) {
            return;
        }

        let index = (pin - DIGITAL_PIN_OFFSET) as u32;
        let bit = match state {
            PinState::High => 1 << index,
            PinState::Low => 1 << (index + 16),
        };
        self.gpiob.bsrr.write(|w| unsafe { w.bits(bit) });
    }

    fn led(&mut self, led: Led, enable: bool) {
        match led {
            Led::HitIndicator => self.write_digital_out_pin(HIT_LED_PIN, PinState::from(enable)),
        }
    }

    fn micros(&self) -> TimeUs {
        self.clock.micros()
    }
}
