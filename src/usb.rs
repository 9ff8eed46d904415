//! USB CDC serial port carrying the MIDI byte stream to the host.
//!
//! The host side runs a serial-to-MIDI bridge (hairless-midiserial, ttymidi and friends), so the
//! port carries plain 3-byte MIDI messages without any framing.

use rtic_sync::channel::{Receiver, Sender, TrySendError};
use stm32f1::stm32f103::{GPIOA, RCC, USB};
use usb_device::LangID;
use usb_device::UsbError;
use usb_device::bus::UsbBusAllocator;
use usb_device::device::{
    BuilderError, StringDescriptors, UsbDevice, UsbDeviceBuilder, UsbDeviceState, UsbVidPid,
};
use usbd_serial::{SerialPort, USB_CLASS_CDC};

use crate::midi::{MidiMessage, MidiOut};

/* Constant USB definitions. See: https://github.com/obdev/v-usb/blob/master/usbdrv/USB-IDs-for-free.txt */
const USB_VID: u16 = 0x16c0;
const USB_PID: u16 = 0x05e1;
const USB_MANUFACTURER: &str = "edrum-trigger";
const USB_PRODUCT: &str = "E-Drum Trigger Module";
const USB_SERIAL_NUMBER: &str = concat!("ET-", env!("CARGO_PKG_VERSION"));

/// Usb VID-PID Pair
const TRIGGER_VIDPID: UsbVidPid = UsbVidPid(USB_VID, USB_PID);

/// Messages buffered between the scan loop and the USB sender task.
pub const MIDI_QUEUE_CAPACITY: usize = 32;

pub type UsbBus = stm32_usbd::UsbBus<UsbControllerSTM32F103>;
pub type UsbAllocator = UsbBusAllocator<UsbBus>;

pub type MidiReceiver = Receiver<'static, MidiMessage, MIDI_QUEUE_CAPACITY>;

/// USB device of the trigger module: a single CDC-ACM serial port.
pub struct UsbMidiSerial<'a> {
    /// Physical USB device wrapper.
    pub dev: UsbDevice<'a, UsbBus>,
    pub serial: SerialPort<'a, UsbBus>,
}

impl<'a> UsbMidiSerial<'a> {
    /// Configures the USB clock and builds the device on `alloc`.
    pub fn new(
        alloc: &'a UsbAllocator,
        gpioa: &mut GPIOA,
        rcc: &mut RCC,
    ) -> Result<Self, BuilderError> {
        /* Configuring USB lines. */
        rcc.apb2enr.modify(|_, w| w.iopaen().set_bit());
        rcc.cfgr.modify(|_, w| {
            w.ppre1().div4() // Clock prescaler for low-freq area (18 MHz).
                .usbpre().clear_bit() // Divides SYSCLK by 1.5 to obtain 48 MHz.
            /* USB peripheral requires PCLK1 frequency to be greater than 8MHz. */
        });

        Self::reset(gpioa);

        let serial = SerialPort::new(alloc);

        let dev = UsbDeviceBuilder::new(alloc, TRIGGER_VIDPID)
            .strings(&[StringDescriptors::new(LangID::EN)
                .manufacturer(USB_MANUFACTURER)
                .product(USB_PRODUCT)
                .serial_number(USB_SERIAL_NUMBER)])?
            .supports_remote_wakeup(false)
            .device_release(crate::version::FIRMWARE_VERSION_BCD)
            .device_class(USB_CLASS_CDC)
            .build();

        log::info!("USB serial MIDI port prepared ({:04x}:{:04x})", USB_VID, USB_PID);
        Ok(Self { dev, serial })
    }

    /// Simulates a USB disconnection by pulling down the D+ line.
    pub fn reset(gpioa: &mut GPIOA) {
        /* Setting USB reset condition on D+ line. */
        gpioa.crh.modify(|_, w| {
            w /* Pulling the line LOW, which simulates disconnection */
                .mode12().output()
                .cnf12().push_pull()
        });
        gpioa.odr.modify(|_, w| w.odr12().clear_bit());
        cortex_m::asm::delay(720_000);

        gpioa.crh.modify(|_, w| {
            w /* Sets to floating input. */
                .mode11().input()
                .mode12().input()
                .cnf11().open_drain()
                .cnf12().open_drain()
        });
    }

    /// Polling function wrapper.
    pub fn poll(&mut self) -> bool {
        self.dev.poll(&mut [&mut self.serial])
    }

    pub fn is_configured(&self) -> bool {
        self.dev.state() == UsbDeviceState::Configured
    }

    /// Writes one MIDI message. Dropped while the host has not opened the port.
    pub fn write_message(&mut self, message: &MidiMessage) {
        if !self.is_configured() {
            return;
        }

        let bytes = message.to_bytes();
        match self.serial.write(&bytes) {
            Ok(count) if count == bytes.len() => {}
            // a torn message would shift the receiver's running status
            Ok(count) => log::warn!("USB buffer full, {} of 3 bytes of {:?} sent", count, message),
            Err(UsbError::WouldBlock) => log::trace!("USB buffer full, dropping {:?}", message),
            Err(err) => log::warn!("USB write failed: {:?}", err),
        }
    }
}

/// [`MidiOut`] used by the scan loop. Messages are queued for the USB sender task.
pub struct MidiSender {
    sender: Sender<'static, MidiMessage, MIDI_QUEUE_CAPACITY>,
}

impl MidiSender {
    pub fn new(sender: Sender<'static, MidiMessage, MIDI_QUEUE_CAPACITY>) -> Self {
        Self { sender }
    }
}

impl MidiOut for MidiSender {
    fn send(&mut self, message: MidiMessage) {
        if let Err(err) = self.sender.try_send(message) {
            match err {
                TrySendError::NoReceiver(_) => {
                    log::warn!("Tried to send without a receiver. Loosing data.");
                }
                /* The USB sender task is starving, the host is probably not reading. */
                TrySendError::Full(message) => {
                    log::warn!("MIDI queue is full. Dropping {:?}", message);
                }
            }
        }
    }
}

/// Marker microcontroller-dependent structure.
pub struct UsbControllerSTM32F103;

unsafe impl Sync for UsbControllerSTM32F103 {}

unsafe impl stm32_usbd::UsbPeripheral for UsbControllerSTM32F103 {
    const REGISTERS: *const () = USB::ptr() as *const ();
    const DP_PULL_UP_FEATURE: bool = false;
    const EP_MEMORY: *const () = 0x4000_6000 as _;
    const EP_MEMORY_ACCESS_2X16: bool = false;
    const EP_MEMORY_SIZE: usize = 512;

    fn enable() {
        let rcc = unsafe { &*RCC::ptr() };

        cortex_m::interrupt::free(|_| {
            // Enables USB peripheral
            rcc.apb1enr.modify(|_, w| w.usben().set_bit());

            // Resets USB peripheral
            rcc.apb1rstr.modify(|_, w| w.usbrst().set_bit());
            rcc.apb1rstr.modify(|_, w| w.usbrst().clear_bit());
        });
    }

    fn startup_delay() {
        // There is a chip specific startup delay. For STM32F103xx it's 1µs and this should wait for
        // at least that long.
        cortex_m::asm::delay(72);
    }
}
