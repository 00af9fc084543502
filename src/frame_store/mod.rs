//! FrameStore - Last Captured Frame
//!
//! Writes each captured frame to `<dir>/latest.jpg`, overwriting the previous one.

use crate::error::Result;
use crate::models::{Frame, FrameSource};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

pub const LATEST_FILE_NAME: &str = "latest.jpg";

/// Reference to a persisted frame
#[derive(Debug, Clone, Serialize)]
pub struct FrameRef {
    pub file_name: String,
    pub captured_at: DateTime<Utc>,
    pub source: FrameSource,
    pub size_bytes: usize,
}

/// FrameStore instance
#[derive(Debug, Clone)]
pub struct FrameStore {
    dir: PathBuf,
}

impl FrameStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn latest_path(&self) -> PathBuf {
        self.dir.join(LATEST_FILE_NAME)
    }

    /// Persist a frame (directory created on first use)
    pub async fn persist(&self, frame: &Frame) -> Result<FrameRef> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.latest_path();
        tokio::fs::write(&path, &frame.data).await?;

        tracing::debug!(
            path = %path.display(),
            size = frame.data.len(),
            source = frame.source.as_str(),
            "Frame saved"
        );

        Ok(FrameRef {
            file_name: LATEST_FILE_NAME.to_string(),
            captured_at: frame.captured_at,
            source: frame.source,
            size_bytes: frame.data.len(),
        })
    }
}
