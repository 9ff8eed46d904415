//! RTT logger for the trigger board.

use log::{Level, Log, SetLoggerError};
use rtt_target::rprintln;

/// Prints log records over the RTT up channel of the attached debugger.
struct TriggerLogger;

static APP_LOGGER: TriggerLogger = TriggerLogger;

#[cfg(debug_assertions)]
const MAX_LEVEL: Level = Level::Trace;
#[cfg(not(debug_assertions))]
const MAX_LEVEL: Level = Level::Info;

impl TriggerLogger {
    fn init() -> Result<(), SetLoggerError> {
        log::set_logger(&APP_LOGGER).map(|()| {
            #[cfg(debug_assertions)]
            {
                rtt_target::debug_rtt_init_print!();
            }
            #[cfg(not(debug_assertions))]
            {
                rtt_target::rtt_init_print!();
            }
            log::set_max_level(MAX_LEVEL.to_level_filter());
        })
    }
}

impl Log for TriggerLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= MAX_LEVEL
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            rprintln!("{{{}}}, [{}], {}", record.target(), record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Installs the RTT logger.
///
/// # Debug
///
/// Debug builds log everything down to `Trace`, so every detected hit and pedal move shows up.
/// Release builds stop at `Info`.
pub fn init() -> Result<(), SetLoggerError> {
    TriggerLogger::init()
}
