//! Shared models and types for Recycle Sorter
//!
//! This module contains types shared across multiple modules
//! to avoid circular dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sorting class produced by the classifier and consumed by the actuators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortLabel {
    Can,
    Plastic,
}

impl SortLabel {
    /// Display name ("Can" / "Plastic")
    pub fn as_str(&self) -> &'static str {
        match self {
            SortLabel::Can => "Can",
            SortLabel::Plastic => "Plastic",
        }
    }

    /// Lowercase wire form used by the capture node motor API
    pub fn wire_name(&self) -> &'static str {
        match self {
            SortLabel::Can => "can",
            SortLabel::Plastic => "plastic",
        }
    }
}

impl fmt::Display for SortLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "can" => Ok(SortLabel::Can),
            "plastic" => Ok(SortLabel::Plastic),
            other => Err(format!("unknown label: {}", other)),
        }
    }
}

/// Per-session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tallies {
    pub can_count: u32,
    pub plastic_count: u32,
}

impl Tallies {
    pub fn total(&self) -> u32 {
        self.can_count + self.plastic_count
    }

    /// Count one sorted item
    pub fn record(&mut self, label: SortLabel) {
        match label {
            SortLabel::Can => self.can_count += 1,
            SortLabel::Plastic => self.plastic_count += 1,
        }
    }
}

/// Where a frame came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameSource {
    /// Camera attached to this node
    Local,
    /// Capture node over HTTP
    Remote,
}

impl FrameSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameSource::Local => "local",
            FrameSource::Remote => "remote",
        }
    }
}

/// Encoded (JPEG) frame as produced by a camera or the capture node
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub captured_at: DateTime<Utc>,
    pub source: FrameSource,
}

impl Frame {
    pub fn new(data: Vec<u8>, source: FrameSource) -> Self {
        Self {
            data,
            captured_at: Utc::now(),
            source,
        }
    }
}

/// Health check response (classification node)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub remote_node_configured: bool,
    pub remote_node_connected: bool,
}
