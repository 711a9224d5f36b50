// src/analysis/vehicle_tracker.rs
//
// IoU-based multi-object tracker, the default identity provider.
//
// Design:
//   - Greedy IoU matching (sufficient for <50 vehicles per cycle)
//   - Centroid-distance fallback for matches whose boxes stopped overlapping
//     between two detection cycles
//   - Tracks coast through missed cycles before deletion
//   - Class is locked once a track is confirmed
//
// The tracker is stepped once per detection cycle, not once per video
// frame, so every "frame" count below is a count of cycles.

use crate::interface::MultiObjectTracker;
use crate::types::{Detection, Track, TrackId, VehicleClass};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Minimum IoU to match a detection to an existing track
    pub min_iou: f32,
    /// Cycles a track survives without a detection before deletion
    pub max_coast_frames: u32,
    /// Consecutive hits required to promote Tentative → Confirmed
    pub min_hits_to_confirm: u32,
    /// Maximum centroid distance (as fraction of frame width) for confirmed/lost tracks
    pub max_centroid_distance_ratio: f32,
    /// Maximum centroid distance (as fraction of frame width) for tentative tracks
    pub max_centroid_distance_ratio_tentative: f32,
    /// Maximum cycles since last hit for centroid fallback to apply (confirmed/lost)
    pub centroid_fallback_max_coast: u32,
    /// Maximum cycles since last hit for centroid fallback to apply (tentative)
    pub centroid_fallback_max_coast_tentative: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            min_iou: 0.2,
            max_coast_frames: 50,
            min_hits_to_confirm: 3,
            max_centroid_distance_ratio: 0.10,
            max_centroid_distance_ratio_tentative: 0.05,
            centroid_fallback_max_coast: 5,
            centroid_fallback_max_coast_tentative: 2,
        }
    }
}

// ============================================================================
// TRACK STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Tentative,
    Confirmed,
    Lost,
}

/// Cycles without a hit before a confirmed track is considered lost.
const LOST_AFTER_MISSES: u32 = 5;

/// IoU multiplier when a detection's class differs from a confirmed track's.
const CROSS_CLASS_IOU_PENALTY: f32 = 0.5;

#[derive(Debug, Clone)]
struct TrackedVehicle {
    id: u32,
    bbox: [f32; 4],
    state: TrackState,
    class: VehicleClass,
    consecutive_hits: u32,
    age: u32,
    frames_since_hit: u32,
    locked_class: Option<VehicleClass>,
}

impl TrackedVehicle {
    fn new(id: u32, det: &Detection) -> Self {
        Self {
            id,
            bbox: det.bbox,
            state: TrackState::Tentative,
            class: det.class,
            consecutive_hits: 1,
            age: 1,
            frames_since_hit: 0,
            locked_class: None,
        }
    }

    fn center(&self) -> (f32, f32) {
        (
            (self.bbox[0] + self.bbox[2]) * 0.5,
            (self.bbox[1] + self.bbox[3]) * 0.5,
        )
    }

    fn update_with_detection(&mut self, det: &Detection, min_hits: u32) {
        self.bbox = det.bbox;
        self.consecutive_hits += 1;
        self.frames_since_hit = 0;
        self.age += 1;

        if self.locked_class.is_none() {
            self.class = det.class;
        }

        if self.state == TrackState::Tentative && self.consecutive_hits >= min_hits {
            self.state = TrackState::Confirmed;
            self.locked_class = Some(self.class);
            debug!("✅ Track {} confirmed as {}", self.id, self.class);
        }
        if self.state == TrackState::Lost {
            self.state = TrackState::Confirmed;
            self.consecutive_hits = 1;
        }
    }

    fn mark_missed(&mut self) {
        self.frames_since_hit += 1;
        self.consecutive_hits = 0;
        self.age += 1;
        if self.state == TrackState::Confirmed && self.frames_since_hit > LOST_AFTER_MISSES {
            self.state = TrackState::Lost;
        }
    }

    fn to_track(&self) -> Track {
        Track {
            id: TrackId::from(self.id),
            class: self.class,
            bbox: self.bbox,
            confirmed: self.state == TrackState::Confirmed,
        }
    }
}

// ============================================================================
// IoU COMPUTATION
// ============================================================================

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter <= 0.0 {
        return 0.0;
    }

    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

// ============================================================================
// MAIN TRACKER
// ============================================================================

pub struct VehicleTracker {
    pub config: TrackerConfig,
    tracks: Vec<TrackedVehicle>,
    next_id: u32,
    frame_w: f32,
}

impl VehicleTracker {
    pub fn new(config: TrackerConfig, frame_w: f32) -> Self {
        Self {
            config,
            tracks: Vec::with_capacity(32),
            next_id: 1,
            frame_w,
        }
    }

    /// Step the tracker with one cycle of detections. Returns every live
    /// track that was matched this cycle; `confirmed` marks the ones that
    /// passed the hit threshold.
    pub fn update(&mut self, detections: &[Detection]) -> Vec<Track> {
        let min_hits = self.config.min_hits_to_confirm;
        let mut matched_tracks = vec![false; self.tracks.len()];
        let mut matched_dets = vec![false; detections.len()];

        // Phase 1: IoU matching, best pairs first.
        let mut iou_pairs: Vec<(usize, usize, f32)> = Vec::new();
        for (ti, track) in self.tracks.iter().enumerate() {
            for (di, det) in detections.iter().enumerate() {
                let raw_iou = iou(&track.bbox, &det.bbox);
                if raw_iou < self.config.min_iou {
                    continue;
                }
                let effective_iou = match track.locked_class {
                    Some(locked) if locked != det.class => raw_iou * CROSS_CLASS_IOU_PENALTY,
                    _ => raw_iou,
                };
                if effective_iou >= self.config.min_iou {
                    iou_pairs.push((ti, di, effective_iou));
                }
            }
        }
        iou_pairs.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

        for &(ti, di, _) in &iou_pairs {
            if matched_tracks[ti] || matched_dets[di] {
                continue;
            }
            matched_tracks[ti] = true;
            matched_dets[di] = true;
            self.tracks[ti].update_with_detection(&detections[di], min_hits);
        }

        // Phase 2: centroid fallback. Same class only, nearest first.
        let max_dist_confirmed = self.frame_w * self.config.max_centroid_distance_ratio;
        let max_dist_tentative = self.frame_w * self.config.max_centroid_distance_ratio_tentative;

        let mut centroid_pairs: Vec<(usize, usize, f32)> = Vec::new();
        for (ti, track) in self.tracks.iter().enumerate() {
            if matched_tracks[ti] {
                continue;
            }
            let (max_dist, max_coast) = match track.state {
                TrackState::Confirmed | TrackState::Lost => {
                    (max_dist_confirmed, self.config.centroid_fallback_max_coast)
                }
                TrackState::Tentative => (
                    max_dist_tentative,
                    self.config.centroid_fallback_max_coast_tentative,
                ),
            };
            if track.frames_since_hit > max_coast {
                continue;
            }

            let (tcx, tcy) = track.center();
            let required_class = track.locked_class.unwrap_or(track.class);
            for (di, det) in detections.iter().enumerate() {
                if matched_dets[di] || det.class != required_class {
                    continue;
                }
                let (dcx, dcy) = det.center();
                let dist_sq = (tcx - dcx).powi(2) + (tcy - dcy).powi(2);
                if dist_sq < max_dist * max_dist {
                    centroid_pairs.push((ti, di, dist_sq));
                }
            }
        }
        centroid_pairs.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));

        for &(ti, di, dist_sq) in &centroid_pairs {
            if matched_tracks[ti] || matched_dets[di] {
                continue;
            }
            matched_tracks[ti] = true;
            matched_dets[di] = true;
            debug!(
                "🔗 Centroid rescue: Track {} ({:?}) ↔ det (dist={:.0}px, class={})",
                self.tracks[ti].id,
                self.tracks[ti].state,
                dist_sq.sqrt(),
                detections[di].class
            );
            self.tracks[ti].update_with_detection(&detections[di], min_hits);
        }

        for (ti, matched) in matched_tracks.iter().enumerate() {
            if !matched {
                self.tracks[ti].mark_missed();
            }
        }

        for (di, matched) in matched_dets.iter().enumerate() {
            if !matched {
                let track = TrackedVehicle::new(self.next_id, &detections[di]);
                debug!(
                    "🆕 New track T{}: class={}, bbox=[{:.0},{:.0},{:.0},{:.0}]",
                    track.id, track.class, track.bbox[0], track.bbox[1], track.bbox[2], track.bbox[3]
                );
                self.next_id += 1;
                self.tracks.push(track);
            }
        }

        let max_coast = self.config.max_coast_frames;
        self.tracks.retain(|t| {
            if t.frames_since_hit > max_coast {
                info!(
                    "🗑️  Track {} pruned (coasted {} cycles)",
                    t.id, t.frames_since_hit
                );
                return false;
            }
            if t.state == TrackState::Tentative && t.age > min_hits * 3 {
                debug!("🗑️  Track {} pruned (tentative too long: age={})", t.id, t.age);
                return false;
            }
            true
        });

        self.tracks
            .iter()
            .filter(|t| t.frames_since_hit == 0)
            .map(TrackedVehicle::to_track)
            .collect()
    }

    pub fn confirmed_count(&self) -> usize {
        self.tracks
            .iter()
            .filter(|t| t.state == TrackState::Confirmed)
            .count()
    }

    pub fn live_count(&self) -> usize {
        self.tracks.len()
    }
}

impl<F> MultiObjectTracker<F> for VehicleTracker {
    fn update(&mut self, detections: &[Detection], _frame: &F) -> Result<Vec<Track>> {
        Ok(VehicleTracker::update(self, detections))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        det_with_class(x1, y1, x2, y2, VehicleClass::Truck)
    }

    fn det_with_class(x1: f32, y1: f32, x2: f32, y2: f32, class: VehicleClass) -> Detection {
        Detection {
            bbox: [x1, y1, x2, y2],
            confidence: 0.8,
            class,
        }
    }

    fn confirmed_tracker(detection: Detection) -> (VehicleTracker, TrackId) {
        let mut tracker = VehicleTracker::new(TrackerConfig::default(), 1280.0);
        let mut out = Vec::new();
        for _ in 0..3 {
            out = tracker.update(&[detection.clone()]);
        }
        assert_eq!(out.len(), 1);
        assert!(out[0].confirmed);
        (tracker, out[0].id.clone())
    }

    #[test]
    fn test_iou_overlap() {
        let a = [0.0, 0.0, 100.0, 100.0];
        let b = [50.0, 50.0, 150.0, 150.0];
        let score = iou(&a, &b);
        assert!((score - 2500.0 / 17500.0).abs() < 0.01);
    }

    #[test]
    fn test_iou_no_overlap() {
        let a = [0.0, 0.0, 50.0, 50.0];
        let b = [100.0, 100.0, 200.0, 200.0];
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn test_track_creation_and_confirmation() {
        let mut tracker = VehicleTracker::new(TrackerConfig::default(), 1280.0);
        let dets = vec![det(500.0, 200.0, 600.0, 300.0)];

        let out = tracker.update(&dets);
        assert_eq!(out.len(), 1);
        assert!(!out[0].confirmed);

        tracker.update(&dets);
        let out = tracker.update(&dets);
        assert!(out[0].confirmed);
        assert_eq!(out[0].id, TrackId::from(1));
        assert_eq!(tracker.confirmed_count(), 1);
    }

    #[test]
    fn test_id_stable_across_small_motion() {
        let (mut tracker, id) = confirmed_tracker(det(500.0, 200.0, 600.0, 300.0));
        let out = tracker.update(&[det(510.0, 205.0, 610.0, 305.0)]);
        assert_eq!(out[0].id, id);
    }

    #[test]
    fn test_confirmed_class_locked() {
        let (mut tracker, id) = confirmed_tracker(det(500.0, 200.0, 600.0, 300.0));
        let out = tracker.update(&[det_with_class(
            500.0,
            200.0,
            600.0,
            300.0,
            VehicleClass::Car,
        )]);
        assert_eq!(out[0].id, id);
        assert_eq!(out[0].class, VehicleClass::Truck);
    }

    #[test]
    fn test_centroid_fallback_rescues_track() {
        let (mut tracker, id) = confirmed_tracker(det(500.0, 200.0, 600.0, 300.0));
        // No overlap, centroid moved 105 px (< 128 px at 10% of 1280).
        let out = tracker.update(&[det(605.0, 200.0, 705.0, 300.0)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, id);
        assert_eq!(tracker.live_count(), 1);
    }

    #[test]
    fn test_centroid_rejects_cross_class() {
        let (mut tracker, id) = confirmed_tracker(det(500.0, 200.0, 600.0, 300.0));
        let out = tracker.update(&[det_with_class(
            605.0,
            200.0,
            705.0,
            300.0,
            VehicleClass::Bus,
        )]);
        assert_eq!(out.len(), 1);
        assert_ne!(out[0].id, id);
        assert!(!out[0].confirmed);
    }

    #[test]
    fn test_missed_tracks_are_not_reported() {
        let (mut tracker, _) = confirmed_tracker(det(500.0, 200.0, 600.0, 300.0));
        assert!(tracker.update(&[]).is_empty());
        assert_eq!(tracker.live_count(), 1);
    }

    #[test]
    fn test_coasted_track_is_pruned() {
        let cfg = TrackerConfig {
            max_coast_frames: 2,
            ..TrackerConfig::default()
        };
        let mut tracker = VehicleTracker::new(cfg, 1280.0);
        for _ in 0..3 {
            tracker.update(&[det(500.0, 200.0, 600.0, 300.0)]);
        }
        for _ in 0..3 {
            tracker.update(&[]);
        }
        assert_eq!(tracker.live_count(), 0);
    }

    #[test]
    fn test_two_vehicles_get_distinct_ids() {
        let mut tracker = VehicleTracker::new(TrackerConfig::default(), 1280.0);
        let dets = vec![
            det_with_class(100.0, 100.0, 200.0, 200.0, VehicleClass::Car),
            det_with_class(800.0, 100.0, 900.0, 200.0, VehicleClass::Bus),
        ];
        let mut out = Vec::new();
        for _ in 0..3 {
            out = tracker.update(&dets);
        }
        assert_eq!(out.len(), 2);
        assert_ne!(out[0].id, out[1].id);
        assert!(out.iter().all(|t| t.confirmed));
    }
}
