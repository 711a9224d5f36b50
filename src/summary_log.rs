// src/summary_log.rs
//
// Append-only in-memory log of per-cycle records, persisted once at the end
// of a run as `{"detections": [...]}` with 4-space indentation.

use crate::types::SummaryRecord;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryLog {
    pub detections: Vec<SummaryRecord>,
}

impl SummaryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: SummaryRecord) {
        self.detections.push(record);
    }

    pub fn records(&self) -> &[SummaryRecord] {
        &self.detections
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Writes the whole log, replacing any existing file.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let file =
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut writer, formatter);
        self.serialize(&mut ser)
            .with_context(|| format!("Failed to serialize summary log to {}", path.display()))?;
        writer.flush()?;

        info!(
            "💾 Wrote {} record(s) to {}",
            self.detections.len(),
            path.display()
        );
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse summary log {}", path.display()))
    }
}
