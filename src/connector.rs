//! Connectors group the pins of one jack (or jack pair) feeding a pad.

use heapless::Vec;

use crate::pin::DrumPin;
use crate::types::{MAX_SENSOR_PINS, Name};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DrumConnector {
    id: Name,
    /// Ordered: tip of the first jack is zone 0.
    pins: Vec<DrumPin, MAX_SENSOR_PINS>,
}

impl DrumConnector {
    /// Creates a connector. Pins beyond [`MAX_SENSOR_PINS`] are dropped with a warning.
    pub fn new(id: Name, pins: &[DrumPin]) -> Self {
        if pins.len() > MAX_SENSOR_PINS {
            log::warn!("Connector[{}] has more than {} pins", id, MAX_SENSOR_PINS);
        }
        let pins = pins.iter().take(MAX_SENSOR_PINS).copied().collect();
        Self { id, pins }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pin_count(&self) -> usize {
        self.pins.len()
    }

    pub fn pins(&self) -> &[DrumPin] {
        &self.pins
    }

    pub fn pin_mut(&mut self, index: usize) -> Option<&mut DrumPin> {
        self.pins.get_mut(index)
    }
}
