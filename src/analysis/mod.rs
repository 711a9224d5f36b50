// src/analysis/mod.rs
//
// Per-cycle traffic analytics.
//
// Signal flow:
//   Frame → cadence ─(RunCycle)→ detector → boundary filter → vehicle_tracker
//         → cycle_aggregator ─┬→ counting_registry   (at-most-once counts)
//                             ├→ position_history    (bounded per-id window)
//                             └→ speed_estimator     (pixel speed per lane)
//         → SummaryRecord
//
// Orchestrated by pipeline::orchestrator::PipelineOrchestrator.

pub mod cadence;
pub mod counting_registry;
pub mod cycle_aggregator;
pub mod position_history;
pub mod speed_estimator;
pub mod vehicle_tracker;

pub use cadence::{CadenceController, CadenceDecision, CadenceStats};
pub use counting_registry::{CountingRegistry, SightingOutcome};
pub use cycle_aggregator::{CycleAggregator, CycleResult};
pub use position_history::{PositionHistory, PositionHistoryStore};
pub use speed_estimator::SpeedEstimator;
pub use vehicle_tracker::{TrackState, TrackerConfig, VehicleTracker};
