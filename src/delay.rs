//! Conversion between per-frame delay ticks and playback durations.
//!
//! GIF stores delays as integer hundredths of a second. Frames and sequences
//! keep seconds as `f64`, and the conversion happens only here.
use std::num::NonZeroUsize;

use crate::common::FrameProperties;

/// Ticks in one second.
pub const TICKS_PER_SECOND: f64 = 100.0;

/// Raw delays at or below this many ticks are played back as [`MIN_PLAYBACK_TICKS`].
const CLAMP_THRESHOLD: u16 = 1;

/// Delay players substitute for near-zero delays.
pub const MIN_PLAYBACK_TICKS: u16 = 10;

/// How the encoder assigns delays to frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DelayMode {
    /// Every frame gets `total_duration / frame_count`.
    ///
    /// Authored per-frame delays of the source sequence are not kept.
    #[default]
    Uniform,
    /// Every frame keeps its own delay. Frames without one get the uniform delay.
    PerFrame,
}

/// Converts ticks to seconds.
#[inline]
pub fn ticks_to_seconds(ticks: u16) -> f64 {
    f64::from(ticks) / TICKS_PER_SECOND
}

/// Converts seconds to the nearest tick, saturating at the bounds of `u16`.
pub fn seconds_to_ticks(seconds: f64) -> u16 {
    let ticks = (seconds * TICKS_PER_SECOND).round();
    if ticks.is_nan() || ticks <= 0.0 {
        0
    } else if ticks >= f64::from(u16::MAX) {
        u16::MAX
    } else {
        ticks as u16
    }
}

/// The delay a player applies to a raw delay.
pub fn clamp_ticks(raw: u16) -> u16 {
    if raw <= CLAMP_THRESHOLD {
        MIN_PLAYBACK_TICKS
    } else {
        raw
    }
}

/// Picks the delay of one frame: the unclamped delay, else the clamped delay, else zero.
pub fn resolve_ticks(properties: &FrameProperties) -> u16 {
    properties
        .unclamped_delay
        .or(properties.delay)
        .unwrap_or(0)
}

/// The playback time served to consumers: `duration_override` if positive, else `calculated`.
pub fn total_duration(calculated: f64, duration_override: f64) -> f64 {
    if duration_override > 0.0 {
        duration_override
    } else {
        calculated.max(0.0)
    }
}

/// The same tick value for each of `frames` frames sharing `total` seconds.
pub fn uniform_ticks(total: f64, frames: NonZeroUsize) -> u16 {
    seconds_to_ticks(total / frames.get() as f64)
}

/// Running sum of the delays read from a container.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResolvedDelays {
    calculated: f64,
}

impl ResolvedDelays {
    /// Resolves the next frame's delay to seconds and adds it to the sum.
    pub fn push(&mut self, properties: &FrameProperties) -> f64 {
        let seconds = ticks_to_seconds(resolve_ticks(properties));
        self.calculated += seconds;
        seconds
    }

    /// Sum of all delays, in seconds.
    pub fn calculated_duration(&self) -> f64 {
        self.calculated
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn unclamped_takes_precedence() {
        let both = FrameProperties {
            delay: Some(10),
            unclamped_delay: Some(1),
            ..FrameProperties::default()
        };
        assert_eq!(resolve_ticks(&both), 1);
        assert_eq!(resolve_ticks(&FrameProperties::with_delay(7)), 7);
        assert_eq!(resolve_ticks(&FrameProperties::default()), 0);
    }

    #[test]
    fn rounds_to_nearest_tick() {
        assert_eq!(seconds_to_ticks(0.5), 50);
        assert_eq!(seconds_to_ticks(0.014), 1);
        assert_eq!(seconds_to_ticks(-3.0), 0);
        assert_eq!(seconds_to_ticks(f64::NAN), 0);
        assert_eq!(seconds_to_ticks(1e9), u16::MAX);
    }

    #[test]
    fn tick_round_trip_does_not_drift() {
        for ticks in (0..=u16::MAX).step_by(97).chain([1, 2, 3, 33, 67, u16::MAX]) {
            let once = seconds_to_ticks(ticks_to_seconds(ticks));
            assert_eq!(once, ticks);
            assert_eq!(seconds_to_ticks(ticks_to_seconds(once)), once);
        }
        for seconds in [0.0, 0.013, 0.333, 1.0 / 3.0, 2.718, 12.345] {
            let ticks = seconds_to_ticks(seconds);
            assert_eq!(seconds_to_ticks(ticks_to_seconds(ticks)), ticks);
        }
    }

    #[test]
    fn uniform_split() {
        assert_eq!(uniform_ticks(1.5, nz(3)), 50);
        assert_eq!(uniform_ticks(1.0, nz(3)), 33);
        assert_eq!(uniform_ticks(0.0, nz(5)), 0);
    }

    #[test]
    fn override_only_when_positive() {
        assert_eq!(total_duration(2.0, 0.0), 2.0);
        assert_eq!(total_duration(2.0, -1.0), 2.0);
        assert_eq!(total_duration(2.0, 0.5), 0.5);
    }

    #[test]
    fn clamps_near_zero_delays() {
        assert_eq!(clamp_ticks(0), MIN_PLAYBACK_TICKS);
        assert_eq!(clamp_ticks(1), MIN_PLAYBACK_TICKS);
        assert_eq!(clamp_ticks(2), 2);
    }

    #[test]
    fn accumulates() {
        let mut delays = ResolvedDelays::default();
        assert_eq!(delays.push(&FrameProperties::with_delay(20)), 0.2);
        assert_eq!(delays.push(&FrameProperties::default()), 0.0);
        assert_eq!(delays.push(&FrameProperties::with_delay(5)), 0.05);
        assert!((delays.calculated_duration() - 0.25).abs() < 1e-12);
    }
}
