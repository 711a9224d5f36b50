// src/main.rs

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use traffic_analytics::inputs;
use traffic_analytics::pipeline::{MetricsSummary, RunOutcome};
use traffic_analytics::report::TrafficReport;
use traffic_analytics::summary_log::SummaryLog;
use traffic_analytics::types::{Config, VehicleClass};

const DEFAULT_CONFIG: &str = "config.yaml";

#[derive(Parser, Debug)]
#[command(name = "traffic-analytics")]
#[command(author, version, long_about = None)]
#[command(about = "Lane inference, vehicle counting and pixel-space speed summaries from traffic video")]
struct Cli {
    /// Defaults to `run` with no overrides
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process a video (or a directory of videos) and write summary logs
    Run(RunArgs),

    /// Aggregate summary logs into a traffic report
    Report(ReportArgs),
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Config file (config.yaml in the working directory if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Video file or directory, overrides video.input
    #[arg(short, long)]
    input: Option<String>,

    /// Overrides video.output_dir
    #[arg(short, long)]
    output_dir: Option<String>,

    /// No window; frames are paced by sleeping
    #[arg(long)]
    headless: bool,
}

#[derive(Args, Debug)]
struct ReportArgs {
    /// One or more summary logs
    #[arg(required = true)]
    logs: Vec<PathBuf>,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[cfg_attr(not(feature = "vision"), allow(dead_code))]
struct VideoStats {
    outcome: RunOutcome,
    lanes: usize,
    records: usize,
    unique_vehicles: usize,
    /// (class, total, per-lane counts in lane order)
    class_counts: Vec<(VehicleClass, usize, Vec<usize>)>,
    histories: usize,
    live_tracks: usize,
    confirmed_tracks: usize,
    cycle_frequency: f32,
    progress: f32,
    metrics: MetricsSummary,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Run(args) => {
            let loaded = load_config(&args);
            let level = loaded
                .as_ref()
                .map(|(config, _)| config.logging.level.clone())
                .unwrap_or_else(|_| "info".to_string());
            init_logging(&level);

            let (config, source) = match loaded {
                Ok(loaded) => loaded,
                Err(e) => {
                    error!("{:#}", e);
                    return Err(e);
                }
            };
            match source {
                Some(path) => info!("✓ Configuration loaded from {}", path.display()),
                None => info!("No {} found, using built-in defaults", DEFAULT_CONFIG),
            }
            run(&config)
        }
        Command::Report(args) => {
            init_logging("info");
            report(&args)
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("traffic_analytics={},ort=warn", level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Config file plus CLI overrides. An explicit `--config` must exist; the
/// default file is optional.
fn load_config(args: &RunArgs) -> Result<(Config, Option<PathBuf>)> {
    let (mut config, source) = match &args.config {
        Some(path) => (Config::load(path)?, Some(path.clone())),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            (Config::load(DEFAULT_CONFIG)?, Some(PathBuf::from(DEFAULT_CONFIG)))
        }
        None => (Config::default(), None),
    };

    if let Some(input) = &args.input {
        config.video.input = input.clone();
    }
    if let Some(output_dir) = &args.output_dir {
        config.video.output_dir = output_dir.clone();
    }
    config.video.headless |= args.headless;

    config.validate()?;
    Ok((config, source))
}

fn run(config: &Config) -> Result<()> {
    info!("🚦 Traffic Analytics Starting");
    info!(
        "Detection: interval={}ms, confidence>={:.2}, classes={:?}",
        config.detection.interval_ms,
        config.detection.confidence_threshold,
        config.detection.allowed_classes
    );

    let videos = inputs::resolve_inputs(&config.video.input)?;
    if videos.is_empty() {
        error!("No video files found in {}", config.video.input);
        bail!("No video files found in {}", config.video.input);
    }
    let batch = Path::new(&config.video.input).is_dir();
    info!("Found {} video file(s) to process", videos.len());

    let mut failures = 0usize;
    for (idx, video_path) in videos.iter().enumerate() {
        info!("========================================");
        info!(
            "Processing video {}/{}: {}",
            idx + 1,
            videos.len(),
            video_path.display()
        );
        info!("========================================");

        let output_path = inputs::output_path_for(video_path, &config.video.output_dir, batch);

        match process_video(video_path, &output_path, config) {
            Ok(stats) => {
                info!("✓ Video processed");
                info!("  Lanes: {}", stats.lanes);
                info!(
                    "  Frames: {} | Cycles: {}",
                    stats.metrics.total_frames, stats.metrics.cycles
                );
                info!("  🚙 Unique vehicles counted: {}", stats.unique_vehicles);
                for (class, total, per_lane) in &stats.class_counts {
                    info!("    {}: {} (by lane: {:?})", class, total, per_lane);
                }
                info!(
                    "  Tracks: {} with history, {} live at end ({} confirmed)",
                    stats.histories, stats.live_tracks, stats.confirmed_tracks
                );
                info!("  📝 Summary records: {}", stats.records);
                info!(
                    "  Detections kept/dropped: {}/{}",
                    stats.metrics.detections_kept, stats.metrics.detections_dropped
                );
                info!(
                    "  Avg detector: {} µs | Avg tracker: {} µs",
                    stats.metrics.avg_detector_us, stats.metrics.avg_tracker_us
                );
                info!(
                    "  Cycle frequency: {:.1}% of frames | Video read: {:.1}%",
                    stats.cycle_frequency * 100.0,
                    stats.progress
                );
                info!("  Processing Speed: {:.1} FPS", stats.metrics.fps);

                if stats.outcome == RunOutcome::Interrupted {
                    if idx + 1 < videos.len() {
                        warn!("Skipping {} remaining video(s)", videos.len() - idx - 1);
                    }
                    break;
                }
            }
            Err(e) => {
                error!("Failed to process video: {:#}", e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} video(s) failed", failures, videos.len());
    }
    Ok(())
}

#[cfg(feature = "vision")]
fn process_video(video_path: &Path, output_path: &Path, config: &Config) -> Result<VideoStats> {
    use traffic_analytics::analysis::VehicleTracker;
    use traffic_analytics::clock::SystemStreamClock;
    use traffic_analytics::interface::FrameSource;
    use traffic_analytics::lane_inference::calibrate;
    use traffic_analytics::pipeline::PipelineOrchestrator;
    use traffic_analytics::vision::{
        HighGuiDisplay, HoughSegmentDetector, VideoReader, YoloDetector,
    };

    let mut reader = VideoReader::open(video_path)?;

    let mut segments = HoughSegmentDetector::new(config.lanes.clone());
    let lanes = calibrate(&mut reader, &mut segments, &config.lanes)?;

    let mut detector = YoloDetector::new(&config.detection)?;
    info!("✓ YOLO vehicle detector ready");

    let mut tracker = VehicleTracker::new(config.tracker.clone(), lanes.frame_width() as f32);
    info!("✓ Vehicle tracker ready");

    let mut display = HighGuiDisplay::new(
        "Traffic Analytics",
        reader.frame_size(),
        config.video.display_width,
        reader.fps(),
        config.video.headless,
    )?;

    let mut orchestrator = PipelineOrchestrator::new(lanes, config, SystemStreamClock::new());
    let outcome = orchestrator.run_and_persist(
        &mut reader,
        &mut detector,
        &mut tracker,
        &mut display,
        output_path,
    )?;

    let aggregator = orchestrator.aggregator();
    let layout = aggregator.lanes();
    let registry = aggregator.registry();
    let class_counts = config
        .detection
        .allowed_classes
        .iter()
        .map(|&class| {
            let per_lane = layout
                .lanes()
                .iter()
                .map(|lane| registry.lane_count(lane.id(), class))
                .collect();
            (class, registry.class_count(class), per_lane)
        })
        .collect();

    Ok(VideoStats {
        outcome,
        lanes: layout.len(),
        records: orchestrator.summary_log().len(),
        unique_vehicles: registry.unique_vehicles(),
        class_counts,
        histories: aggregator.histories().tracked_count(),
        live_tracks: tracker.live_count(),
        confirmed_tracks: tracker.confirmed_count(),
        cycle_frequency: orchestrator.cadence().get_stats().cycle_frequency,
        progress: reader.progress(),
        metrics: orchestrator.metrics().summary(),
    })
}

#[cfg(not(feature = "vision"))]
fn process_video(video_path: &Path, _output_path: &Path, _config: &Config) -> Result<VideoStats> {
    bail!(
        "Cannot process {}: built without the `vision` feature (rebuild with --features vision)",
        video_path.display()
    )
}

fn report(args: &ReportArgs) -> Result<()> {
    let logs = args
        .logs
        .iter()
        .map(SummaryLog::load)
        .collect::<Result<Vec<_>>>()?;

    let report = TrafficReport::from_logs(&logs);
    let json = serde_json::to_string_pretty(&report)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!("💾 Report written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
