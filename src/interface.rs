// src/interface.rs
//
// Seams between the analytics core and the acquisition/presentation
// collaborators. The OpenCV/ONNX implementations live in `vision`;
// tests plug in-memory fakes into the same traits.

use crate::lane_inference::LineSegment;
use crate::types::{Detection, FrameOverlay, RawDetection, Track};
use anyhow::Result;

/// Successive raster frames from a video at a known frame rate.
pub trait FrameSource {
    type Frame;

    /// (width, height) in pixels
    fn frame_size(&self) -> (i32, i32);

    fn fps(&self) -> f64;

    /// Width of a decoded frame, which may differ from the container's
    /// reported width.
    fn frame_width(&self, frame: &Self::Frame) -> i32;

    /// `Ok(None)` at end of stream.
    fn read_frame(&mut self) -> Result<Option<Self::Frame>>;

    /// Seek back to the first frame.
    fn rewind(&mut self) -> Result<()>;
}

/// Extracts line segments from a calibration frame.
pub trait LineSegmentDetector<F> {
    fn detect_segments(&mut self, frame: &F) -> Result<Vec<LineSegment>>;
}

/// Unfiltered detector candidates. Threshold and class filtering happen
/// at the boundary, see `detection_filter`.
pub trait ObjectDetector<F> {
    fn detect(&mut self, frame: &F) -> Result<Vec<RawDetection>>;
}

/// Owns identity continuity. Returns the tracks observed this step,
/// confirmed or not.
pub trait MultiObjectTracker<F> {
    fn update(&mut self, detections: &[Detection], frame: &F) -> Result<Vec<Track>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayControl {
    Continue,
    Quit,
}

pub trait DisplaySink<F> {
    /// Produce the annotated copy of a cycle frame.
    fn render(&mut self, frame: &F, overlay: &FrameOverlay) -> Result<F>;

    /// Show a frame and report whether the user asked to stop.
    fn show(&mut self, frame: &F) -> Result<DisplayControl>;
}
