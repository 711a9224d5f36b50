// src/pipeline/orchestrator.rs
//
// Per-video processing loop.
//
//   frame → cadence ─(RunCycle)→ detector → boundary filter → tracker
//                                → cycle aggregator → SummaryLog
//                                → render overlay → last annotated frame
//         → display (annotated frame if any, else raw) → quit check
//
// Lanes are calibrated before the loop starts and stay frozen.

use super::metrics::PipelineMetrics;
use crate::analysis::cadence::{CadenceController, CadenceDecision};
use crate::analysis::cycle_aggregator::CycleAggregator;
use crate::clock::StreamClock;
use crate::detection_filter::filter_detections;
use crate::interface::{DisplayControl, DisplaySink, FrameSource, MultiObjectTracker, ObjectDetector};
use crate::lane_inference::LaneLayout;
use crate::summary_log::SummaryLog;
use crate::types::{Config, FrameOverlay, VehicleClass};
use anyhow::{Context, Result};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The source reached end of stream
    Completed,
    /// The display reported a quit request
    Interrupted,
}

pub struct PipelineOrchestrator<C: StreamClock> {
    cadence: CadenceController,
    aggregator: CycleAggregator,
    clock: C,
    metrics: PipelineMetrics,
    log: SummaryLog,
    confidence_threshold: f32,
    allowed_classes: Vec<VehicleClass>,
}

impl<C: StreamClock> PipelineOrchestrator<C> {
    pub fn new(lanes: LaneLayout, config: &Config, clock: C) -> Self {
        Self {
            cadence: CadenceController::new(config.detection.interval_ms),
            aggregator: CycleAggregator::new(lanes, &config.speed),
            clock,
            metrics: PipelineMetrics::new(),
            log: SummaryLog::new(),
            confidence_threshold: config.detection.confidence_threshold,
            allowed_classes: config.detection.allowed_classes.clone(),
        }
    }

    /// Drives the loop until end of stream, a quit request, or the first
    /// collaborator error. Records captured before an error stay in the
    /// summary log.
    pub fn run<S, D, T, V>(
        &mut self,
        source: &mut S,
        detector: &mut D,
        tracker: &mut T,
        display: &mut V,
    ) -> Result<RunOutcome>
    where
        S: FrameSource,
        D: ObjectDetector<S::Frame>,
        T: MultiObjectTracker<S::Frame>,
        V: DisplaySink<S::Frame>,
    {
        self.clock.start();
        self.metrics = PipelineMetrics::new();
        let mut last_annotated: Option<S::Frame> = None;

        while let Some(frame) = source
            .read_frame()
            .with_context(|| format!("Failed to read frame {}", self.metrics.total_frames + 1))?
        {
            self.metrics.total_frames += 1;
            let elapsed_ms = self.clock.elapsed_ms();

            if self.cadence.on_frame(elapsed_ms) == CadenceDecision::RunCycle {
                let annotated = self.run_cycle(&frame, elapsed_ms, detector, tracker, display)?;
                last_annotated = Some(annotated);
            }

            let shown = last_annotated.as_ref().unwrap_or(&frame);
            if display.show(shown)? == DisplayControl::Quit {
                info!(
                    "⏹️  Stopped by user after {} frame(s), {} cycle(s)",
                    self.metrics.total_frames, self.metrics.cycles
                );
                return Ok(RunOutcome::Interrupted);
            }
        }

        info!(
            "✓ End of stream: {} frame(s), {} cycle(s)",
            self.metrics.total_frames, self.metrics.cycles
        );
        Ok(RunOutcome::Completed)
    }

    /// `run`, then writes the summary log to `output_path` whatever the loop
    /// ended with: end of stream, quit, or a collaborator error. A failed
    /// write is logged and never replaces the loop's own result.
    pub fn run_and_persist<S, D, T, V>(
        &mut self,
        source: &mut S,
        detector: &mut D,
        tracker: &mut T,
        display: &mut V,
        output_path: &Path,
    ) -> Result<RunOutcome>
    where
        S: FrameSource,
        D: ObjectDetector<S::Frame>,
        T: MultiObjectTracker<S::Frame>,
        V: DisplaySink<S::Frame>,
    {
        let outcome = self.run(source, detector, tracker, display);

        if let Err(e) = self.log.write_json(output_path) {
            error!("Failed to write {}: {:#}", output_path.display(), e);
        }
        outcome
    }

    fn run_cycle<F, D, T, V>(
        &mut self,
        frame: &F,
        elapsed_ms: f64,
        detector: &mut D,
        tracker: &mut T,
        display: &mut V,
    ) -> Result<F>
    where
        D: ObjectDetector<F>,
        T: MultiObjectTracker<F>,
        V: DisplaySink<F>,
    {
        let started = Instant::now();
        let raw = detector
            .detect(frame)
            .with_context(|| format!("Detector failed at {:.0} ms", elapsed_ms))?;
        let detections = filter_detections(&raw, self.confidence_threshold, &self.allowed_classes);
        self.metrics
            .record_detector(started.elapsed(), raw.len(), detections.len());

        let started = Instant::now();
        let tracks = tracker
            .update(&detections, frame)
            .with_context(|| format!("Tracker failed at {:.0} ms", elapsed_ms))?;
        let confirmed = tracks.iter().filter(|t| t.confirmed).count();
        self.metrics.record_tracker(started.elapsed(), confirmed);

        let result = self
            .aggregator
            .process_cycle(&tracks, elapsed_ms, self.clock.wall_clock());
        self.metrics.cycles += 1;

        debug!(
            "Cycle at {:.0} ms: {} detection(s), {} track(s), {} confirmed",
            elapsed_ms,
            detections.len(),
            tracks.len(),
            confirmed
        );
        self.log.push(result.record);

        let overlay = FrameOverlay {
            lanes: self.aggregator.lanes().lanes().to_vec(),
            tracks: result.annotations,
        };
        display.render(frame, &overlay)
    }

    pub fn summary_log(&self) -> &SummaryLog {
        &self.log
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn aggregator(&self) -> &CycleAggregator {
        &self.aggregator
    }

    pub fn cadence(&self) -> &CadenceController {
        &self.cadence
    }
}
