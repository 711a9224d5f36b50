// src/analysis/cycle_aggregator.rs
//
// One detection cycle: confirmed tracks → lane assignment → first-sighting
// counting → position update → speed sampling → one SummaryRecord.
//
// Counts and speed samples are cycle-local. Only the counting registry and
// the position histories persist between cycles.

use super::counting_registry::CountingRegistry;
use super::position_history::PositionHistoryStore;
use super::speed_estimator::SpeedEstimator;
use crate::clock::DATE_FORMAT;
use crate::lane_inference::LaneLayout;
use crate::types::{
    LaneId, PositionSample, SpeedConfig, SummaryRecord, Track, TrackAnnotation, VehicleClass,
};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CycleResult {
    pub record: SummaryRecord,
    /// One entry per confirmed track, in tracker order
    pub annotations: Vec<TrackAnnotation>,
}

pub struct CycleAggregator {
    lanes: LaneLayout,
    registry: CountingRegistry,
    histories: PositionHistoryStore,
    speed: SpeedEstimator,
    cycles: u64,
}

impl CycleAggregator {
    pub fn new(lanes: LaneLayout, config: &SpeedConfig) -> Self {
        Self {
            lanes,
            registry: CountingRegistry::new(),
            histories: PositionHistoryStore::new(config.history_capacity),
            speed: SpeedEstimator::new(config.kmh_factor),
            cycles: 0,
        }
    }

    pub fn process_cycle(
        &mut self,
        tracks: &[Track],
        cycle_time_ms: f64,
        wall_clock: NaiveDateTime,
    ) -> CycleResult {
        self.cycles += 1;

        let mut counts_total: BTreeMap<VehicleClass, u32> = BTreeMap::new();
        let mut counts_by_lane: BTreeMap<LaneId, BTreeMap<VehicleClass, u32>> = BTreeMap::new();
        let mut speeds_by_lane: BTreeMap<LaneId, Vec<f64>> = BTreeMap::new();
        let mut annotations = Vec::new();

        for track in tracks.iter().filter(|t| t.confirmed) {
            let (x_center, y_center) = track.pixel_center();
            let lane_id = self.lanes.lane_at(x_center).map(|lane| lane.id());

            let outcome = self
                .registry
                .register_first_sighting(&track.id, track.class, lane_id);
            if outcome.counted_globally {
                *counts_total.entry(track.class).or_insert(0) += 1;
                if let (true, Some(lane)) = (outcome.counted_in_lane, lane_id) {
                    *counts_by_lane
                        .entry(lane)
                        .or_default()
                        .entry(track.class)
                        .or_insert(0) += 1;
                }
                debug!(
                    "First sighting: track {} ({}) in {}",
                    track.id,
                    track.class,
                    lane_id.map_or_else(|| "no lane".to_string(), |l| l.to_string())
                );
            }

            let history = self.histories.record(
                &track.id,
                PositionSample {
                    x: x_center,
                    y: y_center,
                    timestamp_ms: cycle_time_ms,
                },
            );

            // Keyed by the current lane, which may differ from the counted one.
            if let (Some(speed), Some(lane)) = (self.speed.estimate(history), lane_id) {
                speeds_by_lane.entry(lane).or_default().push(speed);
            }

            annotations.push(TrackAnnotation {
                id: track.id.clone(),
                class: track.class,
                bbox: track.pixel_box(),
                lane: lane_id,
            });
        }

        let avg_speed_by_lane: BTreeMap<LaneId, f64> = speeds_by_lane
            .into_iter()
            .filter(|(_, speeds)| !speeds.is_empty())
            .map(|(lane, speeds)| (lane, speeds.iter().sum::<f64>() / speeds.len() as f64))
            .collect();

        let record = SummaryRecord {
            timestamp_ms: cycle_time_ms as i64,
            wall_clock: wall_clock.format(DATE_FORMAT).to_string(),
            counts_total,
            counts_by_lane,
            avg_speed_by_lane,
        };

        debug!(
            "Cycle {}: {} confirmed track(s), new={:?}, speeds={:?}",
            self.cycles,
            annotations.len(),
            record.counts_total,
            record.avg_speed_by_lane
        );

        CycleResult {
            record,
            annotations,
        }
    }

    pub fn lanes(&self) -> &LaneLayout {
        &self.lanes
    }

    pub fn registry(&self) -> &CountingRegistry {
        &self.registry
    }

    pub fn histories(&self) -> &PositionHistoryStore {
        &self.histories
    }
}
