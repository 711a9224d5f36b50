// src/lib.rs
//
// Traffic analytics over a fixed-camera road video: one-shot lane
// calibration, cadence-gated detection cycles, at-most-once vehicle
// counting per class and lane, and pixel-space speed summaries.

pub mod analysis;
pub mod clock;
pub mod config;
pub mod detection_filter;
pub mod inputs;
pub mod interface;
pub mod lane_inference;
pub mod pipeline;
pub mod report;
pub mod summary_log;
pub mod types;

#[cfg(feature = "vision")]
pub mod vision;

pub use types::Config;
