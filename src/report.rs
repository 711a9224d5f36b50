// src/report.rs
//
// Offline analytics over one or more summary logs: volumes, hourly pattern,
// lane speeds, bottlenecks, class dominance and time series.

use crate::clock::DATE_FORMAT;
use crate::summary_log::SummaryLog;
use crate::types::{LaneId, SummaryRecord, VehicleClass};
use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Lanes slower than this (km/h-equivalent) are reported as bottlenecks.
pub const BOTTLENECK_SPEED: f64 = 15.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bottleneck {
    pub lane: LaneId,
    pub avg_speed: f64,
    pub total_vehicles: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrafficEvolution {
    pub timestamps: Vec<String>,
    pub car: Vec<u32>,
    pub bus: Vec<u32>,
    pub truck: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpeedEvolution {
    pub timestamps: Vec<String>,
    /// One series per lane; 0.0 where the record has no sample for the lane
    pub lanes: BTreeMap<LaneId, Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total_records: usize,
    pub total_vehicles: u32,
    pub data_quality: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficReport {
    pub total_volume: BTreeMap<VehicleClass, u32>,
    pub volume_by_lane: BTreeMap<LaneId, BTreeMap<VehicleClass, u32>>,
    pub hourly_pattern: BTreeMap<String, u32>,
    pub avg_speed_by_lane: BTreeMap<LaneId, f64>,
    pub bottlenecks: Vec<Bottleneck>,
    pub vehicle_type_dominance: BTreeMap<VehicleClass, f64>,
    pub traffic_evolution: TrafficEvolution,
    pub speed_evolution: SpeedEvolution,
    pub summary: ReportSummary,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// "HH:00" bucket for a record date, `None` if the date does not parse.
fn hour_bucket(date: &str) -> Option<String> {
    NaiveDateTime::parse_from_str(date, DATE_FORMAT)
        .ok()
        .map(|dt| format!("{:02}:00", dt.hour()))
}

impl TrafficReport {
    pub fn from_logs(logs: &[SummaryLog]) -> Self {
        let mut records: Vec<&SummaryRecord> =
            logs.iter().flat_map(|log| log.records().iter()).collect();
        records.sort_by_key(|r| r.timestamp_ms);
        info!("📊 Building report over {} record(s)", records.len());

        let mut total_volume: BTreeMap<VehicleClass, u32> = BTreeMap::new();
        let mut volume_by_lane: BTreeMap<LaneId, BTreeMap<VehicleClass, u32>> = BTreeMap::new();
        let mut hourly_pattern: BTreeMap<String, u32> = BTreeMap::new();
        let mut speeds_by_lane: BTreeMap<LaneId, Vec<f64>> = BTreeMap::new();

        for record in &records {
            for (&class, &count) in record.counts_total.iter().filter(|&(_, &c)| c > 0) {
                *total_volume.entry(class).or_insert(0) += count;
            }

            for (&lane, counts) in &record.counts_by_lane {
                let lane_entry = volume_by_lane.entry(lane).or_default();
                for (&class, &count) in counts.iter().filter(|&(_, &c)| c > 0) {
                    *lane_entry.entry(class).or_insert(0) += count;
                }
            }

            let record_total: u32 = record.counts_total.values().sum();
            if record_total > 0 {
                match hour_bucket(&record.wall_clock) {
                    Some(hour) => *hourly_pattern.entry(hour).or_insert(0) += record_total,
                    None => debug!("Skipping unparseable date '{}'", record.wall_clock),
                }
            }

            for (&lane, &speed) in record.avg_speed_by_lane.iter().filter(|&(_, &s)| s > 0.0) {
                speeds_by_lane.entry(lane).or_default().push(speed);
            }
        }

        let avg_speed_by_lane: BTreeMap<LaneId, f64> = speeds_by_lane
            .into_iter()
            .map(|(lane, speeds)| (lane, round2(speeds.iter().sum::<f64>() / speeds.len() as f64)))
            .collect();

        let bottlenecks: Vec<Bottleneck> = avg_speed_by_lane
            .iter()
            .filter(|&(_, &speed)| speed < BOTTLENECK_SPEED)
            .map(|(&lane, &avg_speed)| Bottleneck {
                lane,
                avg_speed,
                total_vehicles: volume_by_lane
                    .get(&lane)
                    .map_or(0, |counts| counts.values().sum()),
            })
            .collect();

        let total_vehicles: u32 = total_volume.values().sum();
        let vehicle_type_dominance: BTreeMap<VehicleClass, f64> = if total_vehicles > 0 {
            total_volume
                .iter()
                .map(|(&class, &count)| {
                    (class, round2(count as f64 / total_vehicles as f64 * 100.0))
                })
                .collect()
        } else {
            BTreeMap::new()
        };

        let mut traffic_evolution = TrafficEvolution::default();
        for record in &records {
            let count = |class: VehicleClass| record.counts_total.get(&class).copied().unwrap_or(0);
            traffic_evolution.timestamps.push(record.wall_clock.clone());
            traffic_evolution.car.push(count(VehicleClass::Car));
            traffic_evolution.bus.push(count(VehicleClass::Bus));
            traffic_evolution.truck.push(count(VehicleClass::Truck));
        }

        let all_lanes: BTreeSet<LaneId> = records
            .iter()
            .flat_map(|r| r.avg_speed_by_lane.keys().copied())
            .collect();
        let mut speed_evolution = SpeedEvolution {
            timestamps: traffic_evolution.timestamps.clone(),
            lanes: all_lanes.iter().map(|&lane| (lane, Vec::new())).collect(),
        };
        for record in &records {
            for (lane, series) in speed_evolution.lanes.iter_mut() {
                series.push(record.avg_speed_by_lane.get(lane).copied().unwrap_or(0.0));
            }
        }

        let summary = ReportSummary {
            total_records: records.len(),
            total_vehicles,
            data_quality: if records.is_empty() { "No Data" } else { "Good" },
        };

        Self {
            total_volume,
            volume_by_lane,
            hourly_pattern,
            avg_speed_by_lane,
            bottlenecks,
            vehicle_type_dominance,
            traffic_evolution,
            speed_evolution,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn record(
        ts: i64,
        date: &str,
        totals: &[(VehicleClass, u32)],
        lanes: &[(u32, VehicleClass, u32)],
        speeds: &[(u32, f64)],
    ) -> SummaryRecord {
        let mut counts_by_lane: BTreeMap<LaneId, BTreeMap<VehicleClass, u32>> = BTreeMap::new();
        for &(lane, class, n) in lanes {
            counts_by_lane.entry(LaneId(lane)).or_default().insert(class, n);
        }
        SummaryRecord {
            timestamp_ms: ts,
            wall_clock: date.to_string(),
            counts_total: totals.iter().copied().collect(),
            counts_by_lane,
            avg_speed_by_lane: speeds.iter().map(|&(l, s)| (LaneId(l), s)).collect(),
        }
    }

    fn sample_log() -> SummaryLog {
        let mut log = SummaryLog::new();
        log.push(record(
            1400,
            "2026-10-18 09:59:58",
            &[(VehicleClass::Car, 2), (VehicleClass::Truck, 1)],
            &[(1, VehicleClass::Car, 2), (2, VehicleClass::Truck, 1)],
            &[(1, 30.0)],
        ));
        log.push(record(
            700,
            "2026-10-18 09:59:57",
            &[(VehicleClass::Bus, 1)],
            &[(2, VehicleClass::Bus, 1)],
            &[],
        ));
        log.push(record(
            2100,
            "2026-10-18 10:00:00",
            &[(VehicleClass::Car, 1)],
            &[(1, VehicleClass::Car, 1)],
            &[(1, 20.0), (2, 10.004)],
        ));
        log
    }

    #[test]
    fn test_volumes() {
        let report = TrafficReport::from_logs(&[sample_log()]);
        assert_eq!(report.total_volume[&VehicleClass::Car], 3);
        assert_eq!(report.total_volume[&VehicleClass::Bus], 1);
        assert_eq!(report.total_volume[&VehicleClass::Truck], 1);
        assert_eq!(report.volume_by_lane[&LaneId(1)][&VehicleClass::Car], 3);
        assert_eq!(report.volume_by_lane[&LaneId(2)][&VehicleClass::Bus], 1);
        assert_eq!(report.summary.total_vehicles, 5);
    }

    #[test]
    fn test_hourly_pattern() {
        let report = TrafficReport::from_logs(&[sample_log()]);
        assert_eq!(report.hourly_pattern["09:00"], 4);
        assert_eq!(report.hourly_pattern["10:00"], 1);
    }

    #[test]
    fn test_avg_speed_and_bottlenecks() {
        let report = TrafficReport::from_logs(&[sample_log()]);
        assert_relative_eq!(report.avg_speed_by_lane[&LaneId(1)], 25.0);
        assert_relative_eq!(report.avg_speed_by_lane[&LaneId(2)], 10.0);

        assert_eq!(report.bottlenecks.len(), 1);
        assert_eq!(report.bottlenecks[0].lane, LaneId(2));
        assert_eq!(report.bottlenecks[0].total_vehicles, 2);
    }

    #[test]
    fn test_dominance_percentages() {
        let report = TrafficReport::from_logs(&[sample_log()]);
        assert_relative_eq!(report.vehicle_type_dominance[&VehicleClass::Car], 60.0);
        assert_relative_eq!(report.vehicle_type_dominance[&VehicleClass::Bus], 20.0);
    }

    #[test]
    fn test_evolution_sorted_by_timestamp() {
        let report = TrafficReport::from_logs(&[sample_log()]);
        let evo = &report.traffic_evolution;
        assert_eq!(evo.timestamps[0], "2026-10-18 09:59:57");
        assert_eq!(evo.bus, vec![1, 0, 0]);
        assert_eq!(evo.car, vec![0, 2, 1]);
        assert_eq!(report.speed_evolution.lanes[&LaneId(2)], vec![0.0, 0.0, 10.004]);
    }

    #[test]
    fn test_empty_logs() {
        let report = TrafficReport::from_logs(&[]);
        assert_eq!(report.summary.total_records, 0);
        assert_eq!(report.summary.data_quality, "No Data");
        assert!(report.vehicle_type_dominance.is_empty());
        assert!(report.bottlenecks.is_empty());
    }

    #[test]
    fn test_serializes_with_lane_keys() {
        let report = TrafficReport::from_logs(&[sample_log()]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["volume_by_lane"]["lane_1"]["car"], 3);
        assert_eq!(json["bottlenecks"][0]["lane"], "lane_2");
        assert_eq!(json["summary"]["data_quality"], "Good");
    }
}
