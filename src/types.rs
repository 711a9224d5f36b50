// src/types.rs

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::analysis::vehicle_tracker::TrackerConfig;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub video: VideoConfig,
    pub detection: DetectionConfig,
    pub lanes: LaneConfig,
    pub tracker: TrackerConfig,
    pub speed: SpeedConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// A video file, or a directory that is searched for video files
    pub input: String,
    pub output_dir: String,
    pub display_width: i32,
    pub headless: bool,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            input: "data/video1.mp4".to_string(),
            output_dir: "output".to_string(),
            display_width: 700,
            headless: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub model_path: String,
    pub confidence_threshold: f32,
    pub allowed_classes: Vec<VehicleClass>,
    /// Minimum stream time between two detection cycles
    pub interval_ms: f64,
    pub use_cuda: bool,
    pub num_threads: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            model_path: "models/yolov8n.onnx".to_string(),
            confidence_threshold: 0.5,
            allowed_classes: VehicleClass::ALL.to_vec(),
            interval_ms: 700.0,
            use_cuda: true,
            num_threads: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneConfig {
    pub blur_kernel: i32,
    pub canny_low: f64,
    pub canny_high: f64,
    pub hough_threshold: i32,
    pub min_line_length: f64,
    pub max_line_gap: f64,
    /// Segments must span more than this many pixels horizontally
    pub min_horizontal_span: i32,
    pub cluster_eps: f64,
    pub cluster_min_samples: usize,
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            blur_kernel: 5,
            canny_low: 50.0,
            canny_high: 150.0,
            hough_threshold: 100,
            min_line_length: 100.0,
            max_line_gap: 50.0,
            min_horizontal_span: 50,
            cluster_eps: 50.0,
            cluster_min_samples: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedConfig {
    pub history_capacity: usize,
    /// Pixel/s to "km/h" multiplier. Not a real-world calibration.
    pub kmh_factor: f64,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            history_capacity: 5,
            kmh_factor: 3.6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ============================================================================
// VEHICLES AND TRACKS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Car,
    Bus,
    Truck,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 3] = [Self::Car, Self::Bus, Self::Truck];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Car => "car",
            Self::Bus => "bus",
            Self::Truck => "truck",
        }
    }

    /// Maps a detector label; anything that is not a counted vehicle is `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "car" => Some(Self::Car),
            "bus" => Some(Self::Bus),
            "truck" => Some(Self::Truck),
            _ => None,
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque tracker identity. Stable across frames for one physical object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(String);

impl From<u32> for TrackId {
    fn from(id: u32) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Detector candidate as it crosses the detector boundary.
#[derive(Debug, Clone)]
pub struct RawDetection {
    pub bbox: [f32; 4], // [x, y, w, h]
    pub confidence: f32,
    pub label: String,
}

/// Filtered detection handed to the tracker.
#[derive(Debug, Clone)]
pub struct Detection {
    pub bbox: [f32; 4], // [x1, y1, x2, y2]
    pub confidence: f32,
    pub class: VehicleClass,
}

impl Detection {
    pub fn center(&self) -> (f32, f32) {
        (
            (self.bbox[0] + self.bbox[2]) * 0.5,
            (self.bbox[1] + self.bbox[3]) * 0.5,
        )
    }
}

/// Tracker output. Read-only for the analytics core.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    pub class: VehicleClass,
    pub bbox: [f32; 4], // [x1, y1, x2, y2]
    pub confirmed: bool,
}

impl Track {
    /// Integer pixel box, truncated toward zero.
    pub fn pixel_box(&self) -> [i32; 4] {
        [
            self.bbox[0] as i32,
            self.bbox[1] as i32,
            self.bbox[2] as i32,
            self.bbox[3] as i32,
        ]
    }

    pub fn pixel_center(&self) -> (i32, i32) {
        let [x1, y1, x2, y2] = self.pixel_box();
        ((x1 + x2) / 2, (y1 + y2) / 2)
    }
}

// ============================================================================
// LANES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LaneId(pub u32);

impl fmt::Display for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lane_{}", self.0)
    }
}

impl FromStr for LaneId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("lane_")
            .and_then(|n| n.parse::<u32>().ok())
            .map(LaneId)
            .ok_or_else(|| format!("invalid lane id '{}'", s))
    }
}

impl Serialize for LaneId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LaneId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Half-open horizontal interval `[xmin, xmax)` of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lane {
    pub index: u32,
    pub xmin: i32,
    pub xmax: i32,
}

impl Lane {
    pub fn id(&self) -> LaneId {
        LaneId(self.index)
    }

    pub fn contains(&self, x: i32) -> bool {
        self.xmin <= x && x < self.xmax
    }

    pub fn width(&self) -> i32 {
        self.xmax - self.xmin
    }
}

// ============================================================================
// CYCLE OUTPUT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSample {
    pub x: i32,
    pub y: i32,
    pub timestamp_ms: f64,
}

/// One line of the output log. Field names on the wire are fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub timestamp_ms: i64,
    #[serde(rename = "date")]
    pub wall_clock: String,
    #[serde(rename = "objects_total")]
    pub counts_total: BTreeMap<VehicleClass, u32>,
    #[serde(rename = "objects_by_lane")]
    pub counts_by_lane: BTreeMap<LaneId, BTreeMap<VehicleClass, u32>>,
    pub avg_speed_by_lane: BTreeMap<LaneId, f64>,
}

/// What the display sink needs to draw one track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackAnnotation {
    pub id: TrackId,
    pub class: VehicleClass,
    pub bbox: [i32; 4],
    pub lane: Option<LaneId>,
}

impl TrackAnnotation {
    pub fn label(&self) -> String {
        format!("{} ID:{}", self.class, self.id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FrameOverlay {
    pub lanes: Vec<Lane>,
    pub tracks: Vec<TrackAnnotation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lane_id_round_trips_through_string() {
        assert_eq!(LaneId(3).to_string(), "lane_3");
        assert_eq!("lane_12".parse::<LaneId>(), Ok(LaneId(12)));
        assert!("lane_x".parse::<LaneId>().is_err());
        assert!("3".parse::<LaneId>().is_err());
    }

    #[test]
    fn test_lane_is_half_open() {
        let lane = Lane {
            index: 2,
            xmin: 100,
            xmax: 300,
        };
        assert!(lane.contains(100));
        assert!(lane.contains(299));
        assert!(!lane.contains(300));
        assert!(!lane.contains(99));
        assert_eq!(lane.width(), 200);
    }

    #[test]
    fn test_vehicle_class_from_label() {
        assert_eq!(VehicleClass::from_label("car"), Some(VehicleClass::Car));
        assert_eq!(VehicleClass::from_label(" Truck "), Some(VehicleClass::Truck));
        assert_eq!(VehicleClass::from_label("motorcycle"), None);
        assert_eq!(VehicleClass::from_label("person"), None);
    }

    #[test]
    fn test_track_pixel_center_truncates() {
        let track = Track {
            id: TrackId::from(1),
            class: VehicleClass::Car,
            bbox: [10.9, 20.2, 31.7, 41.0],
            confirmed: true,
        };
        assert_eq!(track.pixel_box(), [10, 20, 31, 41]);
        assert_eq!(track.pixel_center(), (20, 30));
    }

    #[test]
    fn test_summary_record_wire_names() {
        let mut counts = BTreeMap::new();
        counts.insert(VehicleClass::Car, 2);
        let mut by_lane = BTreeMap::new();
        by_lane.insert(LaneId(1), counts.clone());
        let mut speeds = BTreeMap::new();
        speeds.insert(LaneId(1), 54.0);

        let record = SummaryRecord {
            timestamp_ms: 1400,
            wall_clock: "2026-10-18 08:00:00".to_string(),
            counts_total: counts,
            counts_by_lane: by_lane,
            avg_speed_by_lane: speeds,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["timestamp_ms"], 1400);
        assert_eq!(json["date"], "2026-10-18 08:00:00");
        assert_eq!(json["objects_total"]["car"], 2);
        assert_eq!(json["objects_by_lane"]["lane_1"]["car"], 2);
        assert_eq!(json["avg_speed_by_lane"]["lane_1"], 54.0);

        let back: SummaryRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
