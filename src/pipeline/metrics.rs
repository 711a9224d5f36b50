// src/pipeline/metrics.rs
//
// Run observability. Counts and timings for one video, logged at the end
// of the run and printed by the CLI.

use serde::Serialize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub total_frames: u64,
    pub cycles: u64,
    pub detections_kept: u64,
    pub detections_dropped: u64,
    pub confirmed_tracks: u64,
    pub detector_time_us: u64,
    pub tracker_time_us: u64,
    pub started_at: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: 0,
            cycles: 0,
            detections_kept: 0,
            detections_dropped: 0,
            confirmed_tracks: 0,
            detector_time_us: 0,
            tracker_time_us: 0,
            started_at: Instant::now(),
        }
    }

    pub fn record_detector(&mut self, elapsed: Duration, raw: usize, kept: usize) {
        self.detector_time_us += elapsed.as_micros() as u64;
        self.detections_kept += kept as u64;
        self.detections_dropped += raw.saturating_sub(kept) as u64;
    }

    pub fn record_tracker(&mut self, elapsed: Duration, confirmed: usize) {
        self.tracker_time_us += elapsed.as_micros() as u64;
        self.confirmed_tracks += confirmed as u64;
    }

    pub fn fps(&self) -> f64 {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            self.total_frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let per_cycle = |total: u64| {
            if self.cycles > 0 {
                total / self.cycles
            } else {
                0
            }
        };
        MetricsSummary {
            total_frames: self.total_frames,
            cycles: self.cycles,
            fps: self.fps(),
            detections_kept: self.detections_kept,
            detections_dropped: self.detections_dropped,
            confirmed_tracks: self.confirmed_tracks,
            avg_detector_us: per_cycle(self.detector_time_us),
            avg_tracker_us: per_cycle(self.tracker_time_us),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub cycles: u64,
    pub fps: f64,
    pub detections_kept: u64,
    pub detections_dropped: u64,
    /// Sum over cycles of confirmed tracks handed to the aggregator
    pub confirmed_tracks: u64,
    pub avg_detector_us: u64,
    pub avg_tracker_us: u64,
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_cycle_averages() {
        let mut metrics = PipelineMetrics::new();
        metrics.cycles = 2;
        metrics.record_detector(Duration::from_micros(300), 5, 3);
        metrics.record_detector(Duration::from_micros(100), 2, 2);
        metrics.record_tracker(Duration::from_micros(40), 1);

        let summary = metrics.summary();
        assert_eq!(summary.avg_detector_us, 200);
        assert_eq!(summary.avg_tracker_us, 20);
        assert_eq!(summary.detections_kept, 5);
        assert_eq!(summary.detections_dropped, 2);
        assert_eq!(summary.confirmed_tracks, 1);
    }

    #[test]
    fn test_empty_run() {
        let summary = PipelineMetrics::default().summary();
        assert_eq!(summary.cycles, 0);
        assert_eq!(summary.avg_detector_us, 0);
    }
}
