// src/inputs.rs
//
// Resolves `video.input` to the list of videos to process and names the
// summary log each one produces.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "avi", "mov", "mkv"];

pub const DEFAULT_LOG_NAME: &str = "detections.json";

fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// A single file is returned as-is; a directory is walked for video files
/// in sorted path order.
pub fn resolve_inputs(input: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let input = input.as_ref();

    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        bail!("Input {} does not exist", input.display());
    }

    let mut videos: Vec<PathBuf> = WalkDir::new(input)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_video(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    videos.sort();

    info!("Found {} video file(s) in {}", videos.len(), input.display());
    Ok(videos)
}

/// `<output_dir>/detections.json` for a single video, otherwise
/// `<output_dir>/<stem>_detections.json` so batch runs don't overwrite
/// each other.
pub fn output_path_for(video: &Path, output_dir: impl AsRef<Path>, batch: bool) -> PathBuf {
    let output_dir = output_dir.as_ref();
    if !batch {
        return output_dir.join(DEFAULT_LOG_NAME);
    }
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    output_dir.join(format!("{}_{}", stem, DEFAULT_LOG_NAME))
}
