//! ffmpeg-backed V4L2 camera
//!
//! One long-running ffmpeg process per open device, streaming MJPEG to a
//! pipe. The process is spawned with `kill_on_drop(true)` so a dropped
//! handle never leaves ffmpeg holding the device. Its output is drained
//! continuously by [`LatestFrame`]; a read returns a frame produced after
//! the call, never one that sat in the pipe between captures.

use super::{CameraBackend, CameraStream, LatestFrame, Resolution};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};

/// V4L2 camera backend driving ffmpeg
#[derive(Debug, Clone)]
pub struct FfmpegV4l2Backend {
    program: String,
    device_prefix: String,
}

impl FfmpegV4l2Backend {
    pub fn new() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            device_prefix: "/dev/video".to_string(),
        }
    }

    /// Device node for a camera index (`/dev/video{index}`)
    pub fn device_path(&self, index: u32) -> String {
        format!("{}{}", self.device_prefix, index)
    }

    /// Check if ffmpeg is available
    pub async fn check_ffmpeg(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .arg("-version")
            .output()
            .await
            .map_err(|e| Error::Config(format!("ffmpeg not found: {}", e)))?;

        if !output.status.success() {
            return Err(Error::Config("ffmpeg version check failed".to_string()));
        }

        let version = String::from_utf8_lossy(&output.stdout);
        let first_line = version.lines().next().unwrap_or("unknown");
        Ok(first_line.to_string())
    }
}

impl Default for FfmpegV4l2Backend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CameraBackend for FfmpegV4l2Backend {
    async fn open(&self, index: u32, resolution: Resolution) -> Result<Box<dyn CameraStream>> {
        let device = self.device_path(index);

        if !tokio::fs::try_exists(&device).await.unwrap_or(false) {
            return Err(Error::DeviceUnavailable(format!("{} not present", device)));
        }

        let video_size = format!("{}x{}", resolution.width, resolution.height);

        // -f v4l2 -video_size WxH: fixed capture resolution
        // -f image2pipe -vcodec mjpeg: back-to-back JPEGs on stdout
        let mut child = Command::new(&self.program)
            .args([
                "-hide_banner",
                "-loglevel", "error",
                "-f", "v4l2",
                "-video_size", video_size.as_str(),
                "-i", device.as_str(),
                "-f", "image2pipe",
                "-vcodec", "mjpeg",
                "-q:v", "2",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::DeviceUnavailable(format!("ffmpeg spawn failed: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Internal("ffmpeg stdout not captured".to_string()))?;

        tracing::debug!(device = %device, video_size = %video_size, "ffmpeg capture process started");

        let frames = LatestFrame::spawn(stdout, device.clone());

        Ok(Box::new(FfmpegStream {
            device,
            child: Some(child),
            frames,
        }))
    }
}

struct FfmpegStream {
    device: String,
    child: Option<Child>,
    frames: LatestFrame,
}

#[async_trait]
impl CameraStream for FfmpegStream {
    async fn read_frame(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        self.frames.next_fresh(timeout).await
    }

    async fn release(&mut self) {
        self.frames.stop();
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                tracing::debug!(device = %self.device, error = %e, "ffmpeg already exited");
            }
            tracing::debug!(device = %self.device, "ffmpeg capture process stopped");
        }
    }
}
