#![warn(missing_docs)]
//! Deterministic test surfaces: golden snapshots and per-frame JSONL records.

mod snapshot;

use anyhow::Result;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub use snapshot::*;

/// Pool bookkeeping captured once per frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameRecord {
    /// Frame index, starting at 0.
    pub frame: u64,
    /// Clock value passed to the pool's update.
    pub time: f32,
    /// Spawns issued during the frame.
    pub spawned: usize,
    /// Write cursor after the frame's spawns.
    pub cursor: usize,
    /// Cumulative live overwrites.
    pub live_overwrites: u64,
    /// Hex digest of the attribute buffers.
    pub hash: String,
}

/// A sink that writes newline-delimited JSON to disk.
pub struct JsonlSink {
    file: File,
}

impl JsonlSink {
    /// Create a new sink at `path`, creating parent dirs if needed.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self { file })
    }

    /// Append one record as a JSON line.
    pub fn write<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let line = serde_json::to_string(record)?;
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        Ok(())
    }
}

/// Unique path under the system temp dir.
pub fn temp_path(prefix: &str, ext: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    std::env::temp_dir().join(format!("{prefix}_{}_{nanos}.{ext}", std::process::id()))
}
