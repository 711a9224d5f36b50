// src/analysis/cadence.rs
//
// Time-based scheduler for the detection cycle.
// A cycle runs when at least `interval_ms` of stream time has passed since
// the previous one; frames in between reuse the last annotated output.

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CadenceDecision {
    /// Run detector, tracker and aggregation on this frame
    RunCycle,
    /// Display the previous cycle's annotated frame
    ReuseLast,
}

pub struct CadenceController {
    interval_ms: f64,
    last_detection_ms: f64,
    total_frames: u64,
    cycles: u64,
}

impl CadenceController {
    pub fn new(interval_ms: f64) -> Self {
        Self {
            interval_ms,
            last_detection_ms: 0.0,
            total_frames: 0,
            cycles: 0,
        }
    }

    /// Decide for a frame seen at `elapsed_ms` of stream time.
    pub fn on_frame(&mut self, elapsed_ms: f64) -> CadenceDecision {
        self.total_frames += 1;

        if elapsed_ms - self.last_detection_ms >= self.interval_ms {
            self.last_detection_ms = elapsed_ms;
            self.cycles += 1;
            debug!(
                "Cycle {} scheduled at {:.0} ms (frame {})",
                self.cycles, elapsed_ms, self.total_frames
            );
            CadenceDecision::RunCycle
        } else {
            CadenceDecision::ReuseLast
        }
    }

    pub fn get_stats(&self) -> CadenceStats {
        CadenceStats {
            total_frames: self.total_frames,
            cycles: self.cycles,
            cycle_frequency: if self.total_frames > 0 {
                self.cycles as f32 / self.total_frames as f32
            } else {
                0.0
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct CadenceStats {
    pub total_frames: u64,
    pub cycles: u64,
    pub cycle_frequency: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_cycle_before_first_interval() {
        let mut cadence = CadenceController::new(700.0);
        assert_eq!(cadence.on_frame(0.0), CadenceDecision::ReuseLast);
        assert_eq!(cadence.on_frame(699.9), CadenceDecision::ReuseLast);
        assert_eq!(cadence.on_frame(700.0), CadenceDecision::RunCycle);
        assert_eq!(cadence.on_frame(1399.0), CadenceDecision::ReuseLast);
    }

    #[test]
    fn test_interval_measured_from_last_cycle() {
        let mut cadence = CadenceController::new(700.0);
        assert_eq!(cadence.on_frame(720.0), CadenceDecision::RunCycle);
        assert_eq!(cadence.on_frame(1400.0), CadenceDecision::ReuseLast);
        assert_eq!(cadence.on_frame(1420.0), CadenceDecision::RunCycle);
    }

    #[test]
    fn test_cycles_spaced_by_interval_at_25fps() {
        let mut cadence = CadenceController::new(700.0);
        let mut cycle_times = Vec::new();
        for frame in 0..250 {
            let t = frame as f64 * 40.0;
            if cadence.on_frame(t) == CadenceDecision::RunCycle {
                cycle_times.push(t);
            }
        }
        assert!(!cycle_times.is_empty());
        for pair in cycle_times.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= 700.0);
            assert!(gap < 700.0 + 40.0, "within one frame of slack");
        }

        let stats = cadence.get_stats();
        assert_eq!(stats.total_frames, 250);
        assert_eq!(stats.cycles as usize, cycle_times.len());
    }

    #[test]
    fn test_slow_frames_trigger_every_frame() {
        let mut cadence = CadenceController::new(700.0);
        for i in 1..=5 {
            assert_eq!(cadence.on_frame(i as f64 * 1000.0), CadenceDecision::RunCycle);
        }
    }

    #[test]
    fn test_cycle_frequency() {
        let mut cadence = CadenceController::new(700.0);
        assert_eq!(cadence.get_stats().cycle_frequency, 0.0);
        for t in [0.0, 350.0, 700.0, 1050.0] {
            cadence.on_frame(t);
        }
        let stats = cadence.get_stats();
        assert_eq!(stats.cycles, 1);
        assert_eq!(stats.cycle_frequency, 0.25);
    }
}
