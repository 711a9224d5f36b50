// src/vision/display.rs
//
// Annotation drawing and the HighGUI window. Headless mode skips the
// window and paces frames with a sleep instead of `wait_key`.

use crate::interface::{DisplayControl, DisplaySink};
use crate::types::FrameOverlay;
use anyhow::Result;
use opencv::{
    core::{Mat, Point, Rect, Scalar, Size},
    highgui, imgproc,
    prelude::*,
};
use std::time::Duration;
use tracing::{info, warn};

const KEY_Q: i32 = b'q' as i32;
const KEY_ESC: i32 = 27;

pub struct HighGuiDisplay {
    window: String,
    display_size: Size,
    frame_delay_ms: i32,
    headless: bool,
}

impl HighGuiDisplay {
    /// `display_width` is the window width; height keeps the source aspect.
    pub fn new(
        window: &str,
        frame_size: (i32, i32),
        display_width: i32,
        fps: f64,
        headless: bool,
    ) -> Result<Self> {
        let (w, h) = frame_size;
        let display_height = if w > 0 {
            (display_width as f64 * h as f64 / w as f64) as i32
        } else {
            display_width
        };
        let frame_delay_ms = ((1000.0 / fps) as i32).max(1);

        let mut headless = headless;
        if !headless {
            if let Err(err) = highgui::named_window(window, highgui::WINDOW_NORMAL)
                .and_then(|_| highgui::resize_window(window, display_width, display_height))
            {
                warn!("Failed to open display window: {}. Running headless.", err);
                headless = true;
            }
        }
        info!(
            "✓ Display ready ({}x{}, {} ms/frame{})",
            display_width,
            display_height,
            frame_delay_ms,
            if headless { ", headless" } else { "" }
        );

        Ok(Self {
            window: window.to_string(),
            display_size: Size::new(display_width, display_height.max(1)),
            frame_delay_ms,
            headless,
        })
    }
}

impl DisplaySink<Mat> for HighGuiDisplay {
    fn render(&mut self, frame: &Mat, overlay: &FrameOverlay) -> Result<Mat> {
        let mut output = frame.try_clone()?;
        let green = Scalar::new(0.0, 255.0, 0.0, 0.0);
        let blue = Scalar::new(255.0, 0.0, 0.0, 0.0);

        for track in &overlay.tracks {
            let [x1, y1, x2, y2] = track.bbox;
            imgproc::rectangle(
                &mut output,
                Rect::new(x1, y1, x2 - x1, y2 - y1),
                green,
                2,
                imgproc::LINE_8,
                0,
            )?;
            imgproc::put_text(
                &mut output,
                &track.label(),
                Point::new(x1, y1 - 10),
                imgproc::FONT_HERSHEY_SIMPLEX,
                0.5,
                green,
                2,
                imgproc::LINE_8,
                false,
            )?;
        }

        let height = output.rows();
        for lane in &overlay.lanes {
            imgproc::line(
                &mut output,
                Point::new(lane.xmin, 0),
                Point::new(lane.xmin, height),
                blue,
                4,
                imgproc::LINE_8,
                0,
            )?;
        }

        Ok(output)
    }

    fn show(&mut self, frame: &Mat) -> Result<DisplayControl> {
        if self.headless {
            std::thread::sleep(Duration::from_millis(self.frame_delay_ms as u64));
            return Ok(DisplayControl::Continue);
        }

        let mut resized = Mat::default();
        imgproc::resize(
            frame,
            &mut resized,
            self.display_size,
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;
        highgui::imshow(&self.window, &resized)?;

        let key = highgui::wait_key(self.frame_delay_ms)? & 0xFF;
        if key == KEY_Q || key == KEY_ESC {
            return Ok(DisplayControl::Quit);
        }
        Ok(DisplayControl::Continue)
    }
}

impl Drop for HighGuiDisplay {
    fn drop(&mut self) {
        if !self.headless {
            let _ = highgui::destroy_window(&self.window);
        }
    }
}
