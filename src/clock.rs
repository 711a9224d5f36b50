// src/clock.rs
//
// Stream-relative time source for the cadence controller and the summary
// records. Injectable so replays and tests advance deterministically.

use chrono::{Local, NaiveDateTime, TimeDelta};
use std::time::Instant;

pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub trait StreamClock {
    /// Marks the stream start. Elapsed time is measured from here.
    fn start(&mut self);

    /// Milliseconds since `start`.
    fn elapsed_ms(&mut self) -> f64;

    /// Local wall-clock time, used for the human-readable `date` field.
    fn wall_clock(&self) -> NaiveDateTime;
}

/// Real elapsed time.
#[derive(Debug, Clone)]
pub struct SystemStreamClock {
    started_at: Instant,
}

impl SystemStreamClock {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
        }
    }
}

impl Default for SystemStreamClock {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamClock for SystemStreamClock {
    fn start(&mut self) {
        self.started_at = Instant::now();
    }

    fn elapsed_ms(&mut self) -> f64 {
        self.started_at.elapsed().as_secs_f64() * 1000.0
    }

    fn wall_clock(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Advances by a fixed step every time `elapsed_ms` is read.
///
/// The first read returns 0. With one read per frame this behaves like a
/// stream played at `1000 / step_ms` frames per second.
#[derive(Debug, Clone)]
pub struct SteppedClock {
    step_ms: f64,
    next_ms: f64,
    current_ms: f64,
    base: NaiveDateTime,
}

impl SteppedClock {
    pub fn new(step_ms: f64, base: NaiveDateTime) -> Self {
        Self {
            step_ms,
            next_ms: 0.0,
            current_ms: 0.0,
            base,
        }
    }
}

impl StreamClock for SteppedClock {
    fn start(&mut self) {
        self.next_ms = 0.0;
        self.current_ms = 0.0;
    }

    fn elapsed_ms(&mut self) -> f64 {
        self.current_ms = self.next_ms;
        self.next_ms += self.step_ms;
        self.current_ms
    }

    fn wall_clock(&self) -> NaiveDateTime {
        self.base + TimeDelta::milliseconds(self.current_ms as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2026-10-18 08:59:59", DATE_FORMAT).unwrap()
    }

    #[test]
    fn test_stepped_clock_advances_per_read() {
        let mut clock = SteppedClock::new(40.0, base());
        assert_eq!(clock.elapsed_ms(), 0.0);
        assert_eq!(clock.elapsed_ms(), 40.0);
        assert_eq!(clock.elapsed_ms(), 80.0);

        clock.start();
        assert_eq!(clock.elapsed_ms(), 0.0);
    }

    #[test]
    fn test_stepped_wall_clock_follows_elapsed() {
        let mut clock = SteppedClock::new(500.0, base());
        clock.elapsed_ms();
        clock.elapsed_ms();
        clock.elapsed_ms(); // 1000 ms
        assert_eq!(
            clock.wall_clock().format(DATE_FORMAT).to_string(),
            "2026-10-18 09:00:00"
        );
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let mut clock = SystemStreamClock::new();
        let a = clock.elapsed_ms();
        let b = clock.elapsed_ms();
        assert!(b >= a);
        assert!(a >= 0.0);
    }
}
