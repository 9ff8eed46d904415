//! Error types of the configuration and hardware boundary.
//!
//! The sensing core itself never fails: anything that goes wrong at runtime degrades to "no hit
//! this cycle". Errors only exist where a kit is being assembled from configuration.

use crate::types::{Name, PinId};

/// Failure of a hardware pin operation reported by a [`crate::io::DrumIo`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IoError {
    #[error("pin {0} does not exist on this board")]
    InvalidPin(PinId),
    #[error("pin {0} does not support the requested mode")]
    Unsupported(PinId),
}

/// Reason a configuration entity could not be added to the kit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("maximum {what} count reached: {max}")]
    CapacityExceeded { what: &'static str, max: usize },
    #[error("connector with id '{0}' already present")]
    DuplicateConnector(Name),
    #[error("connector '{0}' is unknown")]
    UnknownConnector(Name),
    #[error("connector '{0}' must have at least one pin definition")]
    NoPins(Name),
    #[error("mux with index {0} does not exist")]
    UnknownMux(u8),
    #[error("mux {mux} does not have channel {channel}")]
    InvalidMuxChannel { mux: u8, channel: u8 },
    #[error("{kind} requires {expected} select pins, got {got}")]
    InvalidSelectPinCount {
        kind: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("pad with index {0} does not exist")]
    UnknownPad(u8),
    #[error("pedal with role '{0}' not found")]
    UnknownPedal(Name),
    #[error("pad '{0}' does not have type 'Pedal'")]
    NotAPedal(Name),
    #[error("pin initialization failed: {0}")]
    Io(#[from] IoError),
}
