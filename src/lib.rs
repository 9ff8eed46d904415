//! Library space for the e-drum trigger firmware.
//!
//! The sensing pipeline turns raw piezo, switch and pedal readings into MIDI: pads are sampled
//! through [`io::DrumIo`], evaluated by one of the [`sensing`] strategies and played through
//! [`midi::MidiOut`] by the [`kit::DrumKit`]. Nothing below [`kit`] allocates, all containers are
//! fixed-capacity.
#![cfg_attr(not(test), no_std)]

/// Scalar types, limits and arena ids.
pub mod types;
/// Configuration and pin errors.
pub mod error;
/// Hardware boundary.
pub mod io;
/// MIDI messages and transport.
pub mod midi;
/// Velocity scaling and curves.
pub mod scale;
/// Pad settings and note mappings.
pub mod settings;
/// Sensor pins and signal conditioning.
pub mod pin;
/// Pin groups feeding a pad.
pub mod connector;
/// Analog multiplexers.
pub mod mux;
/// Hi-hat pedal state.
pub mod hihat;
/// Per-pad hit detection strategies.
pub mod sensing;
/// Drum pads.
pub mod pad;
/// Pending note-offs.
pub mod queue;
/// Gate time handling.
pub mod scheduler;
/// The kit orchestrating a scan cycle.
pub mod kit;
/// Serializable kit configuration.
pub mod config;

#[cfg(test)]
mod testutil;

/// Contains configured logger for application.
#[cfg(feature = "firmware")]
pub mod logger;
/// Trigger board peripherals behind [`io::DrumIo`].
#[cfg(feature = "firmware")]
pub mod board;
/// USB device handling.
#[cfg(feature = "firmware")]
pub mod usb;

/// Module containing all information about current firmware version.
pub mod version {
    /// Current firmware version triple is aligned with crate version.
    pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");
    /// Current `major.minor` in BCD format for the USB device descriptor.
    pub const FIRMWARE_VERSION_BCD: u16 = __version_to_bcd(FIRMWARE_VERSION);

    /// Converts a version number to BCD at compile time. Only major and minor are kept.
    const fn __version_to_bcd(version: &str) -> u16 {
        let mut major = 0;
        let mut minor = 0;
        let mut idx = 0;

        // Major
        while idx < version.len() {
            let byte = version.as_bytes()[idx];
            if byte == b'.' || byte == b'\0' {
                break;
            }
            major = (major << 4) | (byte - b'0') as u16;
            idx += 1;
        }

        idx += 1;

        // Minor
        while idx < version.len() {
            let byte = version.as_bytes()[idx];
            if byte == b'.' || byte == b'\0' {
                break;
            }
            minor = (minor << 4) | (byte - b'0') as u16;
            idx += 1;
        }

        ((major & 0xFF) << 8) | (minor & 0xFF)
    }

}
