//! Hi-hat pedal: open/closed bands, chick detection and noise filtering.

use serde::{Deserialize, Serialize};

use crate::settings::DrumSettings;
use crate::types::{MAX_SENSOR_VALUE, MAX_VELOCITY, SensorValue, TimeMs, Velocity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HiHatState {
    #[default]
    Open,
    AlmostClosed,
    Closed,
}

/// Pedal state kept on the pedal pad between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HiHatData {
    /// Last controller value sent for the pedal position.
    pub pedal_cc: Velocity,
    pub state: HiHatState,
    /// Set on cycles where `pedal_cc` changed.
    pub is_moving: bool,
    pub almost_closed_time_ms: TimeMs,
}

impl HiHatData {
    /// Advances the open/closed state machine with the current pedal position.
    ///
    /// Returns the chick velocity on the cycle the pedal reaches the closed band after passing
    /// through the almost-closed band. A close slower than the chick timeout yields `Some(0)`.
    pub fn update_position(
        &mut self,
        now_ms: TimeMs,
        percent: f32,
        settings: &DrumSettings,
    ) -> Option<Velocity> {
        // closedThreshold > almostClosedThreshold > [open] >= 0
        let is_closed = percent >= settings.closed_threshold;
        let is_almost_closed = !is_closed && percent >= settings.almost_closed_threshold;
        let is_open = !is_closed && !is_almost_closed;

        let mut chick = None;

        if !is_open && self.state == HiHatState::Open {
            self.almost_closed_time_ms = now_ms;
            self.state = HiHatState::AlmostClosed;
        }

        if is_closed && self.state == HiHatState::AlmostClosed {
            let closing_ms = now_ms.saturating_sub(self.almost_closed_time_ms);
            let velocity = chick_velocity(closing_ms, settings.chick_detect_timeout_ms as TimeMs);
            log::debug!("[Close] {:.0}% chick: {}/127 ({} ms)", percent, velocity, closing_ms);
            self.state = HiHatState::Closed;
            chick = Some(velocity);
        }

        if (!is_closed && self.state == HiHatState::Closed)
            || (is_open && self.state == HiHatState::AlmostClosed)
        {
            log::debug!("[Open] {:.0}%", percent);
            self.state = HiHatState::Open;
        }

        chick
    }

    /// Stores a new controller value and flags whether it moved.
    pub fn update_cc(&mut self, cc: Velocity) {
        self.is_moving = cc != self.pedal_cc;
        if self.is_moving {
            log::trace!("[Move] pedal CC {} -> {}", self.pedal_cc, cc);
            self.pedal_cc = cc;
        }
    }
}

/// Position of `value` within `min..max` in percent, not clamped.
///
/// An empty or inverted range degrades to a switch: 100 % at or above `min`, else 0 %.
pub fn pedal_percent(value: SensorValue, min: SensorValue, max: SensorValue) -> f32 {
    if max <= min {
        return if value >= min { 100.0 } else { 0.0 };
    }
    (value as i32 - min as i32) as f32 * 100.0 / (max - min) as f32
}

/// Maps the closing time onto a velocity: instant closes give 127, a close taking exactly the
/// timeout gives 1, slower closes give 0.
pub fn chick_velocity(closing_ms: TimeMs, timeout_ms: TimeMs) -> Velocity {
    if closing_ms > timeout_ms {
        return 0;
    }
    if timeout_ms == 0 {
        return MAX_VELOCITY;
    }
    let range = (MAX_VELOCITY - 1) as TimeMs;
    ((timeout_ms - closing_ms) * range / timeout_ms + 1) as Velocity
}

/// Accepts `new` only if it moved at least `tolerance` away from `old`, or hit either end of the
/// range.
pub fn reduce_noise(new: SensorValue, old: SensorValue, tolerance: SensorValue) -> SensorValue {
    let moved = new.abs_diff(old) >= tolerance || new == 0 || new >= MAX_SENSOR_VALUE;
    if new != old && moved {
        return new.min(MAX_SENSOR_VALUE);
    }
    old
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> DrumSettings {
        DrumSettings { chick_detect_timeout_ms: 20, ..DrumSettings::default() }
    }

    /// Closes the pedal: almost closed at `t0`, closed `closing_ms` later.
    fn close(hihat: &mut HiHatData, t0: TimeMs, closing_ms: TimeMs) -> Option<Velocity> {
        let settings = settings();
        assert_eq!(hihat.update_position(t0, 95.0, &settings), None);
        assert_eq!(hihat.state, HiHatState::AlmostClosed);
        hihat.update_position(t0 + closing_ms, 100.0, &settings)
    }

    #[test]
    fn stays_open_below_almost_closed() {
        let mut hihat = HiHatData::default();
        for (t, percent) in [0.0, 30.0, 89.9, 50.0, -10.0].into_iter().enumerate() {
            assert_eq!(hihat.update_position(t as TimeMs, percent, &settings()), None);
            assert_eq!(hihat.state, HiHatState::Open);
        }
    }

    #[test]
    fn fast_close_has_chick() {
        let mut hihat = HiHatData::default();
        let velocity = close(&mut hihat, 1000, 5).unwrap();
        assert!(velocity > 0);
        assert_eq!(velocity, 95);
        assert_eq!(hihat.state, HiHatState::Closed);
    }

    #[test]
    fn close_at_timeout_has_velocity_one() {
        let mut hihat = HiHatData::default();
        assert_eq!(close(&mut hihat, 1000, 20), Some(1));
    }

    #[test]
    fn slow_close_has_no_chick() {
        let mut hihat = HiHatData::default();
        assert_eq!(close(&mut hihat, 1000, 21), Some(0));
        assert_eq!(hihat.state, HiHatState::Closed);
    }

    #[test]
    fn jump_straight_to_closed_counts_as_instant() {
        let mut hihat = HiHatData::default();
        assert_eq!(hihat.update_position(500, 100.0, &settings()), Some(127));
        assert_eq!(hihat.state, HiHatState::Closed);
    }

    #[test]
    fn opening_resets_state() {
        let settings = settings();
        let mut hihat = HiHatData::default();
        close(&mut hihat, 0, 1);
        // back into the almost closed band opens it again
        hihat.update_position(10, 95.0, &settings);
        assert_eq!(hihat.state, HiHatState::Open);

        hihat.update_position(20, 95.0, &settings);
        assert_eq!(hihat.state, HiHatState::AlmostClosed);
        hihat.update_position(30, 10.0, &settings);
        assert_eq!(hihat.state, HiHatState::Open);
    }

    #[test]
    fn chick_velocity_edges() {
        assert_eq!(chick_velocity(0, 20), 127);
        assert_eq!(chick_velocity(10, 20), 64);
        assert_eq!(chick_velocity(20, 20), 1);
        assert_eq!(chick_velocity(21, 20), 0);
        assert_eq!(chick_velocity(0, 0), 127);
        assert_eq!(chick_velocity(1, 0), 0);
    }

    #[test]
    fn percent_of_range() {
        assert_eq!(pedal_percent(100, 100, 300), 0.0);
        assert_eq!(pedal_percent(200, 100, 300), 50.0);
        assert_eq!(pedal_percent(300, 100, 300), 100.0);
        assert_eq!(pedal_percent(50, 100, 300), -25.0);
        assert_eq!(pedal_percent(400, 500, 500), 0.0);
        assert_eq!(pedal_percent(500, 500, 500), 100.0);
    }

    #[test]
    fn noise_below_tolerance_is_ignored() {
        assert_eq!(reduce_noise(520, 500, 50), 500);
        assert_eq!(reduce_noise(550, 500, 50), 550);
        assert_eq!(reduce_noise(450, 500, 50), 450);
        // extremes always pass
        assert_eq!(reduce_noise(0, 10, 50), 0);
        assert_eq!(reduce_noise(1023, 1000, 50), 1023);
    }

    #[test]
    fn moving_flag_follows_cc_changes() {
        let mut hihat = HiHatData::default();
        hihat.update_cc(0);
        assert!(!hihat.is_moving);
        hihat.update_cc(64);
        assert!(hihat.is_moving);
        assert_eq!(hihat.pedal_cc, 64);
        hihat.update_cc(64);
        assert!(!hihat.is_moving);
    }
}
