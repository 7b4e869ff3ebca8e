pub use std::time::{Duration, Instant};

/// Timing of one displayed frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTime {
    /// Seconds since the clock started.
    pub elapsed: f32,
    /// Seconds since the previous tick.
    pub delta: f32,
    /// Index of this frame, starting at 0.
    pub frame: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    start: Instant,
    last: Instant,
    frame: u64,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start: Instant) -> Self {
        Self {
            start,
            last: start,
            frame: 0,
        }
    }

    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> FrameTime {
        let time = FrameTime {
            elapsed: now.saturating_duration_since(self.start).as_secs_f32(),
            delta: now.saturating_duration_since(self.last).as_secs_f32(),
            frame: self.frame,
        };
        self.last = now;
        self.frame += 1;
        time
    }

    pub fn frames(&self) -> u64 {
        self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_count_frames_and_measure_from_start() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start);

        let first = clock.tick_at(start + Duration::from_millis(500));
        let second = clock.tick_at(start + Duration::from_millis(750));

        assert_eq!(first.frame, 0);
        assert_eq!(second.frame, 1);
        assert!((second.elapsed - 0.75).abs() < 1e-4);
        assert!((second.delta - 0.25).abs() < 1e-4);
        assert_eq!(clock.frames(), 2);
    }
}
