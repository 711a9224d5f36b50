// src/lane_inference.rs
//
// One-shot lane calibration: line segments from the first frame are reduced
// to horizontal centers, clustered in 1-D, and the cluster means become the
// dividers of a gap-free partition of [0, frame_width).

use crate::interface::{FrameSource, LineSegmentDetector};
use crate::types::{Lane, LaneConfig};
use anyhow::{Context, Result};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSegment {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl LineSegment {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn horizontal_span(&self) -> i32 {
        (self.x2 - self.x1).abs()
    }

    pub fn center_x(&self) -> i32 {
        (self.x1 + self.x2) / 2
    }
}

/// Horizontal centers of the segments whose horizontal span exceeds `min_span`.
pub fn line_observations(segments: &[LineSegment], min_span: i32) -> Vec<i32> {
    segments
        .iter()
        .filter(|s| s.horizontal_span() > min_span)
        .map(|s| s.center_x())
        .collect()
}

/// Density-based clustering of scalar observations.
///
/// Returns one label per point; `None` marks noise. A point's neighborhood
/// includes itself, so with `min_samples == 1` nothing is noise.
fn dbscan_1d(points: &[i32], eps: f64, min_samples: usize) -> Vec<Option<usize>> {
    let n = points.len();
    let neighbors = |i: usize| -> Vec<usize> {
        (0..n)
            .filter(|&j| ((points[j] - points[i]) as f64).abs() <= eps)
            .collect()
    };

    let mut labels: Vec<Option<usize>> = vec![None; n];
    let mut visited = vec![false; n];
    let mut next_cluster = 0;

    for i in 0..n {
        if visited[i] {
            continue;
        }
        visited[i] = true;

        let seed = neighbors(i);
        if seed.len() < min_samples {
            continue;
        }

        let cluster = next_cluster;
        next_cluster += 1;
        labels[i] = Some(cluster);

        let mut frontier = seed;
        while let Some(j) = frontier.pop() {
            if labels[j].is_none() {
                labels[j] = Some(cluster);
            }
            if visited[j] {
                continue;
            }
            visited[j] = true;

            let expansion = neighbors(j);
            if expansion.len() >= min_samples {
                frontier.extend(expansion);
            }
        }
    }

    labels
}

/// Cluster means (truncated to whole pixels), sorted ascending.
pub fn cluster_dividers(observations: &[i32], eps: f64, min_samples: usize) -> Vec<i32> {
    let labels = dbscan_1d(observations, eps, min_samples);
    let clusters = labels.iter().flatten().max().map_or(0, |max| max + 1);

    let mut dividers: Vec<i32> = (0..clusters)
        .filter_map(|cluster| {
            let members: Vec<i32> = observations
                .iter()
                .zip(&labels)
                .filter(|(_, label)| **label == Some(cluster))
                .map(|(x, _)| *x)
                .collect();
            if members.is_empty() {
                return None;
            }
            let sum: i64 = members.iter().map(|&x| x as i64).sum();
            Some((sum as f64 / members.len() as f64) as i32)
        })
        .collect();

    dividers.sort_unstable();
    dividers
}

/// Builds `(0, d0), (d0, d1), ..., (dn, frame_width)`.
///
/// Dividers on or outside the frame edges and duplicates are dropped so no
/// lane is empty. No dividers left means no lanes.
pub fn lanes_from_dividers(dividers: &[i32], frame_width: i32) -> Vec<Lane> {
    let mut inner: Vec<i32> = dividers
        .iter()
        .copied()
        .filter(|&d| d > 0 && d < frame_width)
        .collect();
    inner.sort_unstable();
    inner.dedup();

    if inner.is_empty() {
        return Vec::new();
    }

    let mut bounds = Vec::with_capacity(inner.len() + 2);
    bounds.push(0);
    bounds.extend(inner);
    bounds.push(frame_width);

    bounds
        .windows(2)
        .enumerate()
        .map(|(i, pair)| Lane {
            index: i as u32 + 1,
            xmin: pair[0],
            xmax: pair[1],
        })
        .collect()
}

/// Segment set → lanes. Empty when fewer than two observations survive.
pub fn infer_lanes(segments: &[LineSegment], frame_width: i32, config: &LaneConfig) -> Vec<Lane> {
    let observations = line_observations(segments, config.min_horizontal_span);
    debug!(
        "Lane inference: {} segments, {} observations",
        segments.len(),
        observations.len()
    );

    if observations.len() < 2 {
        return Vec::new();
    }

    let dividers = cluster_dividers(&observations, config.cluster_eps, config.cluster_min_samples);
    info!("Lane dividers: {:?}", dividers);

    lanes_from_dividers(&dividers, frame_width)
}

/// Frozen lane partition used for the whole run.
#[derive(Debug, Clone)]
pub struct LaneLayout {
    lanes: Vec<Lane>,
    frame_width: i32,
}

impl LaneLayout {
    /// Single lane covering the whole frame.
    pub fn full_width(frame_width: i32) -> Self {
        Self {
            lanes: vec![Lane {
                index: 1,
                xmin: 0,
                xmax: frame_width,
            }],
            frame_width,
        }
    }

    /// Uses the inferred lanes, or the full-width fallback when there are none.
    pub fn from_inferred(lanes: Vec<Lane>, frame_width: i32) -> Self {
        if lanes.is_empty() {
            info!("No lanes detected. Using a single full-width lane.");
            return Self::full_width(frame_width);
        }
        Self { lanes, frame_width }
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    pub fn frame_width(&self) -> i32 {
        self.frame_width
    }

    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// First lane in index order whose `[xmin, xmax)` contains `x`.
    pub fn lane_at(&self, x: i32) -> Option<&Lane> {
        self.lanes.iter().find(|lane| lane.contains(x))
    }
}

/// Reads the first frame, infers lanes from it and rewinds the source.
pub fn calibrate<S, L>(source: &mut S, detector: &mut L, config: &LaneConfig) -> Result<LaneLayout>
where
    S: FrameSource,
    L: LineSegmentDetector<S::Frame>,
{
    let frame = source
        .read_frame()
        .context("Failed to read the calibration frame")?
        .context("Video has no frames to calibrate lanes from")?;

    let frame_width = source.frame_width(&frame);
    let (reported_width, _) = source.frame_size();
    if frame_width != reported_width {
        warn!(
            "Decoded width {} differs from reported width {}, using decoded",
            frame_width, reported_width
        );
    }

    let segments = detector.detect_segments(&frame)?;
    let layout = LaneLayout::from_inferred(infer_lanes(&segments, frame_width, config), frame_width);
    info!("✓ Lanes detected: {}", layout.len());

    source.rewind().context("Failed to rewind after lane calibration")?;
    Ok(layout)
}
