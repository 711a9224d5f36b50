// src/vision/line_segments.rs
//
// Calibration-frame line extraction: grayscale → Gaussian blur → Canny →
// probabilistic Hough transform.

use crate::interface::LineSegmentDetector;
use crate::lane_inference::LineSegment;
use crate::types::LaneConfig;
use anyhow::Result;
use opencv::{
    core::{Mat, Size, Vec4i, Vector},
    imgproc,
    prelude::*,
};
use std::f64::consts::PI;
use tracing::debug;

pub struct HoughSegmentDetector {
    config: LaneConfig,
}

impl HoughSegmentDetector {
    pub fn new(config: LaneConfig) -> Self {
        Self { config }
    }
}

impl LineSegmentDetector<Mat> for HoughSegmentDetector {
    fn detect_segments(&mut self, frame: &Mat) -> Result<Vec<LineSegment>> {
        let mut gray = Mat::default();
        imgproc::cvt_color_def(frame, &mut gray, imgproc::COLOR_BGR2GRAY)?;

        let k = self.config.blur_kernel;
        let mut blur = Mat::default();
        imgproc::gaussian_blur_def(&gray, &mut blur, Size::new(k, k), 0.0)?;

        let mut edges = Mat::default();
        imgproc::canny_def(
            &blur,
            &mut edges,
            self.config.canny_low,
            self.config.canny_high,
        )?;

        let mut lines = Vector::<Vec4i>::new();
        imgproc::hough_lines_p(
            &edges,
            &mut lines,
            1.0,
            PI / 180.0,
            self.config.hough_threshold,
            self.config.min_line_length,
            self.config.max_line_gap,
        )?;

        debug!(
            "Hough: {} segment(s) on {}x{} frame",
            lines.len(),
            frame.cols(),
            frame.rows()
        );

        Ok(lines
            .iter()
            .map(|l| LineSegment::new(l[0], l[1], l[2], l[3]))
            .collect())
    }
}
