//! Main application entry point.

#![no_main]
#![no_std]

use edrum::error::ConfigError;
use edrum::io::DrumIo;
use edrum::kit::DrumKit;
use edrum::mux::DrumMux;
use edrum::pad::DrumPad;
use edrum::pin::DrumPin;
use edrum::settings::{ChokeType, DrumMappings, DrumSettings, PadType, ZonesType};

// Panic handler.
//
// Only logs the panic over RTT, the watchdog heartbeat stops blinking.
panic_custom::define_panic!(|info| {
    log::error!("System panic occured: {}", info);
});

#[rtic::app(
    device = stm32f1::stm32f103,
    dispatchers = [SDIO, RTC],
    peripherals = true,
)]
mod app {
    use rtic_monotonics::systick::prelude::*;
    use rtic_sync::make_channel;
    use stm32f1::stm32f103::GPIOC;

    use edrum::board::{SYSCLK_HZ, TriggerBoard};
    use edrum::kit::DrumKit;
    use edrum::midi::MidiMessage;
    use edrum::usb::{
        MIDI_QUEUE_CAPACITY, MidiReceiver, MidiSender, UsbAllocator, UsbBus,
        UsbControllerSTM32F103, UsbMidiSerial,
    };

    /* Firmware clocks. */
    systick_monotonic!(Systick);

    #[shared]
    struct Shared {
        /// USB device wrapper is used across interrupt handlers and tasks to communicate with host.
        usb_dev: UsbMidiSerial<'static>,
    }

    #[local]
    struct Local {
        kit: DrumKit,
        board: TriggerBoard,
        midi: MidiSender,
        /// PC13, the on-board LED of the blue pill (active low).
        gpioc: GPIOC,
    }

    /// Initialization function for the trigger module.
    ///
    /// # Init
    ///
    /// During the initialization phase, application does the following:
    /// - Initializes the logger for debug and release builds;
    /// - Switches the system clock to 72 MHz and starts the monotonic timer;
    /// - Builds the USB serial port used as MIDI output;
    /// - Prepares the board (ADC1, GPIO, cycle counter) and the drum kit;
    /// - Prepares the MIDI channel between the scan loop and [`app::UsbMidiSender`].
    #[init(
        local = [usb_alloc: Option<UsbAllocator> = None]
    )]
    fn Init(ctx: Init::Context) -> (Shared, Local) {
        let (mut core, mut dev, alloc) = (ctx.core, ctx.device, ctx.local.usb_alloc);
        let (s, r) = make_channel!(MidiMessage, MIDI_QUEUE_CAPACITY);

        /* Logging initialization. */
        if let Err(log_set_err) = edrum::logger::init() {
            panic!("Logger already set: {}", log_set_err);
        }
        log::info!(
            "Booting e-drum trigger firmware version: [{}]",
            edrum::version::FIRMWARE_VERSION
        );

        /* Setting SYSCLK source to PLL (72 MHz on this line.) */
        let (rcc, flash) = (&mut dev.RCC, &mut dev.FLASH);

        // Enabling external high speed clock
        rcc.cr.modify(|_, w| w.hseon().set_bit());
        while rcc.cr.read().hserdy().bit_is_clear() {}

        rcc.cfgr.modify(|_, w| {
            w /* Multiplying HSE to reach a maximal value of 72 MHz */
                .pllsrc().set_bit()
                .pllxtpre().clear_bit()
                .pllmul().mul9()
        });

        // Enabling PLL.
        rcc.cr.modify(|_, w| w.pllon().set_bit());
        while rcc.cr.read().pllrdy().bit_is_clear() {}

        flash.acr.modify(|_, w| w.latency().ws2());

        // Sys clock switch.
        rcc.cfgr.modify(|_, w| w.sw().pll());
        while !rcc.cfgr.read().sws().is_pll() {}

        /* Monotonics. */
        log::debug!("Enabling Systick monotonic...");
        Systick::start(core.SYST, SYSCLK_HZ);
        log::info!("Internal clocks enabled");

        // Architecture specific USB bus allocator.
        let alloc: &'static UsbAllocator = alloc.insert(UsbBus::new(UsbControllerSTM32F103));
        let usb_dev = match UsbMidiSerial::new(alloc, &mut dev.GPIOA, &mut dev.RCC) {
            Ok(usb_dev) => usb_dev,
            Err(err) => panic!("USB device descriptor rejected: {:?}", err),
        };

        /* PC13 heartbeat LED. */
        dev.RCC.apb2enr.modify(|_, w| w.iopcen().set_bit());
        dev.GPIOC.crh.modify(|_, w| w.mode13().output2().cnf13().push_pull());

        let mut board = TriggerBoard::new(
            dev.ADC1,
            dev.GPIOA,
            dev.GPIOB,
            &mut dev.RCC,
            &mut core.DCB,
            &mut core.DWT,
        );
        let kit = super::setup_kit(&mut board);

        /* Tasks */
        Heartbeat::spawn().ok();
        UsbMidiSender::spawn(r).ok();

        (
            Shared { usb_dev },
            Local { kit, board, midi: MidiSender::new(s), gpioc: dev.GPIOC },
        )
    }

    /// Scan loop.
    ///
    /// Runs one kit cycle after the other at the lowest priority. Everything else (USB, heartbeat)
    /// preempts it.
    #[idle(local = [kit, board, midi])]
    fn Scan(ctx: Scan::Context) -> ! {
        let Scan::LocalResources { kit, board, midi, .. } = ctx.local;
        log::info!("Scan loop started with {} pads.", kit.pads().len());

        loop {
            kit.update(board, midi);
        }
    }

    /// Forwards queued MIDI messages to the USB serial port.
    #[task(priority = 1, shared = [usb_dev])]
    async fn UsbMidiSender(mut ctx: UsbMidiSender::Context, mut r: MidiReceiver) {
        log::info!("MIDI sender task spawned. Waiting for messages.");

        while let Ok(message) = r.recv().await {
            ctx.shared.usb_dev.lock(|dev| {
                dev.poll();
                dev.write_message(&message);
            });
        }
    }

    /// Blinks the on-board LED while the firmware is alive.
    #[task(priority = 1, local = [gpioc])]
    async fn Heartbeat(ctx: Heartbeat::Context) {
        let gpioc = ctx.local.gpioc;
        loop {
            gpioc.odr.modify(|r, w| w.odr13().bit(!r.odr13().bit()));
            Systick::delay(500.millis()).await;
        }
    }

    /// USB TX Polling.
    #[task(binds = USB_HP_CAN_TX, priority = 2, shared = [usb_dev])]
    fn UsbPollTx(mut ctx: UsbPollTx::Context) {
        ctx.shared.usb_dev.lock(|dev| {
            dev.poll();
        });
    }

    /// USB RX Polling.
    #[task(binds = USB_LP_CAN_RX0, priority = 2, shared = [usb_dev])]
    fn UsbPollRx(mut ctx: UsbPollRx::Context) {
        ctx.shared.usb_dev.lock(|dev| {
            if dev.poll() && dev.is_configured() {
                log::trace!("USB_EVENT_Rx");
            }
        });
    }
}

/// Builds the kit wired on the reference board.
///
/// Direct inputs: kick on PA0, snare head and rim on PA1/PA2, tom on PA3. A 74HC4051 on PA7
/// (select PB5..PB7, enable PB8) carries the hi-hat, its pedal and the crash.
fn setup_kit<IO: DrumIo>(io: &mut IO) -> DrumKit {
    let mut kit = DrumKit::new();
    if let Err(err) = add_pads(&mut kit, io) {
        log::error!("Kit setup incomplete: {}", err);
    }
    kit
}

fn add_pads<IO: DrumIo>(kit: &mut DrumKit, io: &mut IO) -> Result<(), ConfigError> {
    let mux = kit.add_mux(DrumMux::hc4051([21, 22, 23], 7, Some(24)), io)?;

    kit.add_connector("kick", &[DrumPin::direct(0)], io)?;
    kit.add_connector("snare", &[DrumPin::direct(1), DrumPin::direct(2)], io)?;
    kit.add_connector("tom1", &[DrumPin::direct(3)], io)?;
    kit.add_connector("hihat", &[DrumPin::mux(mux, 0), DrumPin::mux(mux, 1)], io)?;
    kit.add_connector("hihatPedal", &[DrumPin::mux(mux, 2)], io)?;
    kit.add_connector("crash", &[DrumPin::mux(mux, 3), DrumPin::mux(mux, 4)], io)?;

    let drum = |zones_type| DrumSettings { zones_type, ..DrumSettings::default() };
    let cymbal = |choke_type| DrumSettings {
        pad_type: PadType::Cymbal,
        zones_type: ZonesType::Zones2PiezoAndSwitch,
        choke_type,
        zone_thresholds_min: [100, 500, 500],
        scan_time_us: 10,
        ..DrumSettings::default()
    };
    let notes = |main, rim| DrumMappings { note_main: Some(main), note_rim: rim, ..DrumMappings::default() };

    kit.add_pad(
        DrumPad::new("Kick", drum(ZonesType::Zones1Piezo)).with_role("kick").with_mappings(notes(36, None)),
        Some("kick"),
    )?;
    kit.add_pad(
        DrumPad::new("Snare", drum(ZonesType::Zones2Piezos))
            .with_role("snare")
            .with_mappings(notes(38, Some(40))),
        Some("snare"),
    )?;
    kit.add_pad(
        DrumPad::new("Tom 1", drum(ZonesType::Zones1Piezo)).with_role("tom1").with_mappings(notes(48, None)),
        Some("tom1"),
    )?;

    let hihat = kit.add_pad(
        DrumPad::new("Hi-Hat", cymbal(ChokeType::None))
            .with_role("hihat")
            .with_auto_calibrate(true)
            .with_mappings(DrumMappings {
                note_close_main: Some(42),
                note_close_rim: Some(22),
                ..notes(46, Some(26))
            }),
        Some("hihat"),
    )?;
    let pedal = DrumSettings {
        pad_type: PadType::Pedal,
        zones_type: ZonesType::Zones1Controller,
        zone_thresholds_min: [100, 0, 0],
        zone_thresholds_max: [900, 0, 0],
        ..DrumSettings::default()
    };
    kit.add_pad(
        DrumPad::new("Hi-Hat Pedal", pedal)
            .with_role("hihatPedal")
            .with_mappings(DrumMappings { closed_notes_enabled: true, ..notes(44, None) }),
        Some("hihatPedal"),
    )?;
    kit.link_pedal(hihat, "hihatPedal")?;

    kit.add_pad(
        DrumPad::new("Crash", cymbal(ChokeType::SwitchEdge))
            .with_role("crash")
            .with_auto_calibrate(true)
            .with_mappings(notes(49, Some(55))),
        Some("crash"),
    )?;

    Ok(())
}
