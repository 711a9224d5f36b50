// src/vision/vehicle_detection.rs
//
// YOLOv8 ONNX detector. Produces unfiltered `[x, y, w, h]` candidates in
// frame coordinates; confidence and class filtering happen downstream.

use crate::interface::ObjectDetector;
use crate::types::{DetectionConfig, RawDetection};
use anyhow::{bail, Result};
use opencv::{
    core::{self, Mat, Scalar, Size},
    imgproc,
    prelude::*,
};
use ort::{
    execution_providers::CUDAExecutionProvider,
    session::{builder::GraphOptimizationLevel, Session},
};
use tracing::{debug, info};

const YOLO_INPUT_SIZE: i32 = 640;
const YOLO_CLASSES: usize = 80;
const YOLO_PREDICTIONS: usize = 8400;

/// Candidates below this never leave the detector.
const CANDIDATE_FLOOR: f32 = 0.25;
const NMS_IOU: f32 = 0.45;

// COCO class IDs for road vehicles
const VEHICLE_CLASSES: [usize; 4] = [2, 3, 5, 7]; // car, motorcycle, bus, truck

#[derive(Debug, Clone)]
struct Candidate {
    bbox: [f32; 4], // [x1, y1, x2, y2] in frame coordinates
    confidence: f32,
    class_id: usize,
}

/// Letterbox geometry needed to map model coordinates back to the frame.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

pub struct YoloDetector {
    session: Session,
}

impl YoloDetector {
    pub fn new(config: &DetectionConfig) -> Result<Self> {
        info!("Loading YOLO model: {}", config.model_path);

        let mut builder = Session::builder()?;
        if config.use_cuda {
            builder = builder
                .with_execution_providers([CUDAExecutionProvider::default().with_device_id(0).build()])?;
        }
        let session = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(config.num_threads)?
            .commit_from_file(&config.model_path)?;

        info!("✓ YOLO detector initialized");
        Ok(Self { session })
    }

    fn preprocess(&self, frame: &Mat) -> Result<(Vec<f32>, Letterbox)> {
        let (src_w, src_h) = (frame.cols(), frame.rows());
        if src_w <= 0 || src_h <= 0 {
            bail!("Cannot run detection on an empty frame");
        }

        let target = YOLO_INPUT_SIZE as f32;
        let scale = (target / src_w as f32).min(target / src_h as f32);
        let scaled_w = ((src_w as f32 * scale) as i32).clamp(1, YOLO_INPUT_SIZE);
        let scaled_h = ((src_h as f32 * scale) as i32).clamp(1, YOLO_INPUT_SIZE);

        let mut resized = Mat::default();
        imgproc::resize(
            frame,
            &mut resized,
            Size::new(scaled_w, scaled_h),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;

        // Gray (114) border centers the image on a square canvas.
        let left = (YOLO_INPUT_SIZE - scaled_w) / 2;
        let top = (YOLO_INPUT_SIZE - scaled_h) / 2;
        let mut padded = Mat::default();
        core::copy_make_border(
            &resized,
            &mut padded,
            top,
            YOLO_INPUT_SIZE - scaled_h - top,
            left,
            YOLO_INPUT_SIZE - scaled_w - left,
            core::BORDER_CONSTANT,
            Scalar::all(114.0),
        )?;

        let mut rgb = Mat::default();
        imgproc::cvt_color_def(&padded, &mut rgb, imgproc::COLOR_BGR2RGB)?;
        let hwc = rgb.data_bytes()?;

        // [0, 255] -> [0, 1], HWC -> CHW
        let side = YOLO_INPUT_SIZE as usize;
        let plane = side * side;
        let mut input = vec![0.0f32; 3 * plane];
        for (pixel, rgb) in hwc.chunks_exact(3).enumerate() {
            for c in 0..3 {
                input[c * plane + pixel] = rgb[c] as f32 / 255.0;
            }
        }

        Ok((
            input,
            Letterbox {
                scale,
                pad_x: left as f32,
                pad_y: top as f32,
            },
        ))
    }

    fn infer(&mut self, input: Vec<f32>) -> Result<Vec<f32>> {
        let side = YOLO_INPUT_SIZE as usize;
        let shape = [1, 3, side, side];
        let input_value =
            ort::value::Value::from_array((shape.as_slice(), input.into_boxed_slice()))?;

        let outputs = self.session.run(ort::inputs!["images" => input_value])?;
        let (_, data) = outputs[0].try_extract_tensor::<f32>()?;

        Ok(data.to_vec())
    }
}

/// Decodes the `[1, 84, 8400]` output: per prediction a center box and
/// 80 class scores.
fn decode(output: &[f32], letterbox: Letterbox) -> Vec<Candidate> {
    if output.len() < (4 + YOLO_CLASSES) * YOLO_PREDICTIONS {
        return Vec::new();
    }

    let n = YOLO_PREDICTIONS;
    let mut candidates = Vec::new();

    for i in 0..n {
        let (best_class, max_conf) = (0..YOLO_CLASSES)
            .map(|c| (c, output[n * (4 + c) + i]))
            .fold((0, 0.0f32), |best, cur| if cur.1 > best.1 { cur } else { best });

        if max_conf < CANDIDATE_FLOOR || !VEHICLE_CLASSES.contains(&best_class) {
            continue;
        }

        let cx = output[i];
        let cy = output[n + i];
        let w = output[n * 2 + i];
        let h = output[n * 3 + i];

        let unbox_x = |x: f32| (x - letterbox.pad_x) / letterbox.scale;
        let unbox_y = |y: f32| (y - letterbox.pad_y) / letterbox.scale;

        candidates.push(Candidate {
            bbox: [
                unbox_x(cx - w / 2.0),
                unbox_y(cy - h / 2.0),
                unbox_x(cx + w / 2.0),
                unbox_y(cy + h / 2.0),
            ],
            confidence: max_conf,
            class_id: best_class,
        });
    }

    candidates
}

fn class_id_to_name(class_id: usize) -> &'static str {
    match class_id {
        2 => "car",
        3 => "motorcycle",
        5 => "bus",
        7 => "truck",
        _ => "unknown",
    }
}

fn nms(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if keep
            .iter()
            .all(|kept| calculate_iou(&kept.bbox, &candidate.bbox) < iou_threshold)
        {
            keep.push(candidate);
        }
    }
    keep
}

fn calculate_iou(box1: &[f32; 4], box2: &[f32; 4]) -> f32 {
    let x1 = box1[0].max(box2[0]);
    let y1 = box1[1].max(box2[1]);
    let x2 = box1[2].min(box2[2]);
    let y2 = box1[3].min(box2[3]);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area1 = (box1[2] - box1[0]) * (box1[3] - box1[1]);
    let area2 = (box2[2] - box2[0]) * (box2[3] - box2[1]);
    let union = area1 + area2 - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

fn to_raw(candidate: &Candidate) -> RawDetection {
    let [x1, y1, x2, y2] = candidate.bbox;
    RawDetection {
        bbox: [x1, y1, x2 - x1, y2 - y1],
        confidence: candidate.confidence,
        label: class_id_to_name(candidate.class_id).to_string(),
    }
}

impl ObjectDetector<Mat> for YoloDetector {
    fn detect(&mut self, frame: &Mat) -> Result<Vec<RawDetection>> {
        let (input, letterbox) = self.preprocess(frame)?;
        let output = self.infer(input)?;
        let candidates = nms(decode(&output, letterbox), NMS_IOU);

        debug!("Detected {} vehicle candidate(s)", candidates.len());
        Ok(candidates.iter().map(to_raw).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(bbox: [f32; 4], confidence: f32) -> Candidate {
        Candidate {
            bbox,
            confidence,
            class_id: 2,
        }
    }

    #[test]
    fn test_nms_keeps_best_of_overlapping() {
        let kept = nms(
            vec![
                candidate([0.0, 0.0, 100.0, 100.0], 0.6),
                candidate([5.0, 5.0, 105.0, 105.0], 0.9),
                candidate([300.0, 300.0, 350.0, 350.0], 0.4),
            ],
            NMS_IOU,
        );
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn test_decode_maps_back_through_letterbox() {
        let n = YOLO_PREDICTIONS;
        let mut output = vec![0.0f32; (4 + YOLO_CLASSES) * n];
        // One truck centered at (320, 320), 100x50, in model space.
        output[0] = 320.0;
        output[n] = 320.0;
        output[n * 2] = 100.0;
        output[n * 3] = 50.0;
        output[n * (4 + 7)] = 0.8;

        let letterbox = Letterbox {
            scale: 0.5,
            pad_x: 0.0,
            pad_y: 140.0,
        };
        let candidates = decode(&output, letterbox);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].bbox, [540.0, 310.0, 740.0, 410.0]);

        let raw = to_raw(&candidates[0]);
        assert_eq!(raw.label, "truck");
        assert_eq!(raw.bbox, [540.0, 310.0, 200.0, 100.0]);
    }

    #[test]
    fn test_decode_skips_non_vehicle_classes() {
        let n = YOLO_PREDICTIONS;
        let mut output = vec![0.0f32; (4 + YOLO_CLASSES) * n];
        output[n * 4] = 0.9; // class 0, person
        assert!(decode(&output, Letterbox { scale: 1.0, pad_x: 0.0, pad_y: 0.0 }).is_empty());
    }
}
