// src/analysis/speed_estimator.rs
//
// Pixel-space speed from a track's position window. Uses the oldest and the
// newest sample of the window, not the last two, so the baseline grows as
// the window fills.

use super::position_history::PositionHistory;

pub const DEFAULT_KMH_FACTOR: f64 = 3.6;

#[derive(Debug, Clone, Copy)]
pub struct SpeedEstimator {
    kmh_factor: f64,
}

impl SpeedEstimator {
    pub fn new(kmh_factor: f64) -> Self {
        Self { kmh_factor }
    }

    /// `None` with fewer than two samples or a non-positive elapsed time.
    pub fn estimate(&self, history: &PositionHistory) -> Option<f64> {
        if history.len() < 2 {
            return None;
        }
        let first = history.oldest()?;
        let last = history.newest()?;

        let dx = (last.x - first.x) as f64;
        let dy = (last.y - first.y) as f64;
        let distance_px = (dx * dx + dy * dy).sqrt();
        let elapsed_s = (last.timestamp_ms - first.timestamp_ms) / 1000.0;

        if elapsed_s > 0.0 {
            Some(distance_px / elapsed_s * self.kmh_factor)
        } else {
            None
        }
    }
}

impl Default for SpeedEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_KMH_FACTOR)
    }
}
