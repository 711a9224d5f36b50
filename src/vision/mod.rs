// src/vision/mod.rs
//
// OpenCV / ONNX Runtime implementations of the acquisition and
// presentation seams in `interface`.

pub mod display;
pub mod line_segments;
pub mod vehicle_detection;
pub mod video_processor;

pub use display::HighGuiDisplay;
pub use line_segments::HoughSegmentDetector;
pub use vehicle_detection::YoloDetector;
pub use video_processor::VideoReader;
