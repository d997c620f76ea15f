// SPDX-License-Identifier: CEPL-1.0
use std::time::{Duration, Instant};

/// Measures the time between consecutive frames.
///
/// The first `tick` after construction reports the time since `new`, so the
/// very first frame does not see a huge delta from process start.
#[derive(Debug)]
pub struct FrameClock {
    last: Instant,
    frames: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
            frames: 0,
        }
    }

    /// Elapsed time since the previous tick.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        self.tick_at(now)
    }

    /// Same as `tick` with an explicit timestamp. A timestamp older than the
    /// previous one yields a zero delta.
    pub fn tick_at(&mut self, now: Instant) -> Duration {
        let dt = now.saturating_duration_since(self.last);
        self.last = now;
        self.frames += 1;
        dt
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts a frame delta into the millisecond unit the camera controls use.
pub fn as_millis_f32(dt: Duration) -> f32 {
    dt.as_micros() as f32 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_reports_delta_between_calls() {
        let start = Instant::now();
        let mut clock = FrameClock::new();
        clock.tick_at(start + Duration::from_millis(5));
        let dt = clock.tick_at(start + Duration::from_millis(21));
        assert_eq!(dt, Duration::from_millis(16));
        assert_eq!(clock.frames(), 2);
    }

    #[test]
    fn going_back_in_time_is_zero() {
        let start = Instant::now() + Duration::from_secs(1);
        let mut clock = FrameClock::new();
        clock.tick_at(start);
        assert_eq!(clock.tick_at(start - Duration::from_millis(3)), Duration::ZERO);
    }

    #[test]
    fn millis_conversion() {
        assert_eq!(as_millis_f32(Duration::from_millis(16)), 16.0);
    }
}
