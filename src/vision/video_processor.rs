// src/vision/video_processor.rs

use crate::interface::FrameSource;
use anyhow::{bail, Result};
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture},
};
use std::path::Path;
use tracing::{info, warn};

const FALLBACK_FPS: f64 = 30.0;

pub struct VideoReader {
    cap: VideoCapture,
    fps: f64,
    total_frames: i32,
    current_frame: i32,
    width: i32,
    height: i32,
}

impl VideoReader {
    pub fn open(path: &Path) -> Result<Self> {
        info!("Opening video: {}", path.display());

        let cap = VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY)?;
        if !cap.is_opened()? {
            bail!("Failed to open video file {}", path.display());
        }

        let mut fps = cap.get(videoio::CAP_PROP_FPS)?;
        let total_frames = cap.get(videoio::CAP_PROP_FRAME_COUNT)? as i32;
        let width = cap.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32;
        let height = cap.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32;

        if fps.is_nan() || fps <= 0.0 {
            warn!("Video reports no frame rate, assuming {} FPS", FALLBACK_FPS);
            fps = FALLBACK_FPS;
        }

        info!(
            "Video properties: {}x{} @ {:.1} FPS, {} frames",
            width, height, fps, total_frames
        );

        Ok(Self {
            cap,
            fps,
            total_frames,
            current_frame: 0,
            width,
            height,
        })
    }

    /// Percentage of the container's frame count read so far.
    pub fn progress(&self) -> f32 {
        if self.total_frames <= 0 {
            return 0.0;
        }
        (self.current_frame as f32 / self.total_frames as f32) * 100.0
    }
}

impl FrameSource for VideoReader {
    type Frame = Mat;

    fn frame_size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_width(&self, frame: &Mat) -> i32 {
        frame.cols()
    }

    fn read_frame(&mut self) -> Result<Option<Mat>> {
        let mut mat = Mat::default();
        if !self.cap.read(&mut mat)? || mat.empty() {
            return Ok(None);
        }
        self.current_frame += 1;
        Ok(Some(mat))
    }

    fn rewind(&mut self) -> Result<()> {
        if !self.cap.set(videoio::CAP_PROP_POS_FRAMES, 0.0)? {
            bail!("Video backend refused to seek back to the first frame");
        }
        self.current_frame = 0;
        Ok(())
    }
}
