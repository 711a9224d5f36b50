// src/detection_filter.rs

use crate::types::{Detection, RawDetection, VehicleClass};
use tracing::debug;

/// Boundary filter between detector and tracker.
///
/// Drops candidates below `confidence_threshold` or whose label is not one
/// of `allowed`, and converts `[x, y, w, h]` boxes to `[x1, y1, x2, y2]`.
pub fn filter_detections(
    raw: &[RawDetection],
    confidence_threshold: f32,
    allowed: &[VehicleClass],
) -> Vec<Detection> {
    let kept: Vec<Detection> = raw
        .iter()
        .filter(|d| d.confidence >= confidence_threshold)
        .filter_map(|d| {
            let class = VehicleClass::from_label(&d.label)?;
            if !allowed.contains(&class) {
                return None;
            }
            let [x, y, w, h] = d.bbox;
            Some(Detection {
                bbox: [x, y, x + w, y + h],
                confidence: d.confidence,
                class,
            })
        })
        .collect();

    if kept.len() < raw.len() {
        debug!(
            "Boundary filter kept {} of {} detector candidates",
            kept.len(),
            raw.len()
        );
    }

    kept
}
