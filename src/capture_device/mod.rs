//! CaptureDevice - Local Imaging Device Adapter
//!
//! ## Responsibilities
//!
//! - Probe configured camera indices in order, keep the first that yields a frame
//! - Warm-up discard of buffered frames before trusting reads
//! - Hold at most one open handle; release is idempotent

mod ffmpeg;
mod latest;
mod mjpeg;

pub use ffmpeg::FfmpegV4l2Backend;
pub use latest::LatestFrame;
pub use mjpeg::MjpegFrameReader;

use crate::error::{Error, Result};
use crate::models::{Frame, FrameSource};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Capture resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
        }
    }
}

/// Camera probing and read configuration
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Device indices tried in order
    pub candidates: Vec<u32>,
    pub resolution: Resolution,
    /// Frames discarded after a successful probe
    pub warmup_frames: usize,
    /// Upper bound for a single frame read
    pub read_timeout: Duration,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            candidates: vec![0, 1, 2],
            resolution: Resolution::default(),
            warmup_frames: 5,
            read_timeout: Duration::from_secs(3),
        }
    }
}

/// Opens imaging devices by index
#[async_trait]
pub trait CameraBackend: Send + Sync {
    async fn open(&self, index: u32, resolution: Resolution) -> Result<Box<dyn CameraStream>>;
}

/// An open imaging device
#[async_trait]
pub trait CameraStream: Send {
    /// Next encoded frame
    async fn read_frame(&mut self, timeout: Duration) -> Result<Vec<u8>>;

    /// Release the underlying device. Called exactly once before drop.
    async fn release(&mut self);
}

struct OpenCamera {
    index: u32,
    stream: Box<dyn CameraStream>,
}

/// CaptureDevice instance
pub struct CaptureDevice {
    backend: Arc<dyn CameraBackend>,
    config: CameraConfig,
    handle: Option<OpenCamera>,
}

impl CaptureDevice {
    /// Create new CaptureDevice (no device is opened yet)
    pub fn new(backend: Arc<dyn CameraBackend>, config: CameraConfig) -> Self {
        Self {
            backend,
            config,
            handle: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Index of the open device, if any
    pub fn active_index(&self) -> Option<u32> {
        self.handle.as_ref().map(|h| h.index)
    }

    /// Open the first working candidate
    ///
    /// A candidate must open and return one frame. Candidates that open but
    /// fail the test read (or the warm-up) are released before moving on.
    /// Returns the selected index. No-op when already open.
    pub async fn open(&mut self) -> Result<u32> {
        if let Some(handle) = &self.handle {
            return Ok(handle.index);
        }

        for &index in &self.config.candidates {
            tracing::debug!(camera_index = index, "Trying camera index");

            let mut stream = match self.backend.open(index, self.config.resolution).await {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::debug!(camera_index = index, error = %e, "Camera index did not open");
                    continue;
                }
            };

            if let Err(e) = stream.read_frame(self.config.read_timeout).await {
                tracing::warn!(camera_index = index, error = %e, "Camera opened but test read failed");
                stream.release().await;
                continue;
            }

            if let Err(e) = Self::warm_up(stream.as_mut(), &self.config).await {
                tracing::warn!(camera_index = index, error = %e, "Camera warm-up failed");
                stream.release().await;
                continue;
            }

            tracing::info!(
                camera_index = index,
                width = self.config.resolution.width,
                height = self.config.resolution.height,
                warmup_frames = self.config.warmup_frames,
                "Camera opened"
            );
            self.handle = Some(OpenCamera { index, stream });
            return Ok(index);
        }

        tracing::error!(candidates = ?self.config.candidates, "No working camera found");
        Err(Error::DeviceUnavailable(format!(
            "no working camera among indices {:?}",
            self.config.candidates
        )))
    }

    async fn warm_up(stream: &mut dyn CameraStream, config: &CameraConfig) -> Result<()> {
        for _ in 0..config.warmup_frames {
            stream.read_frame(config.read_timeout).await?;
        }
        Ok(())
    }

    /// Read the next frame from the open device
    ///
    /// A failed read releases the handle so the next capture re-probes.
    pub async fn read(&mut self) -> Result<Frame> {
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| Error::CaptureFailed("camera not opened".to_string()))?;

        match handle.stream.read_frame(self.config.read_timeout).await {
            Ok(data) => {
                tracing::debug!(camera_index = handle.index, size = data.len(), "Frame captured");
                Ok(Frame::new(data, FrameSource::Local))
            }
            Err(e) => {
                tracing::warn!(camera_index = handle.index, error = %e, "Frame read failed, releasing camera");
                self.close().await;
                Err(match e {
                    Error::CaptureFailed(_) => e,
                    other => Error::CaptureFailed(other.to_string()),
                })
            }
        }
    }

    /// Open lazily, then read
    pub async fn capture(&mut self) -> Result<Frame> {
        if !self.is_open() {
            self.open().await?;
        }
        self.read().await
    }

    /// Release the device. Safe to call when already closed.
    pub async fn close(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.stream.release().await;
            tracing::info!(camera_index = handle.index, "Camera released");
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FakeCameraBackend, FakeDevice};
    use super::*;

    fn config(candidates: Vec<u32>, warmup_frames: usize) -> CameraConfig {
        CameraConfig {
            candidates,
            warmup_frames,
            read_timeout: Duration::from_millis(50),
            ..CameraConfig::default()
        }
    }

    #[tokio::test]
    async fn test_probe_selects_first_working_candidate() {
        let backend = Arc::new(FakeCameraBackend::new(vec![
            (1, FakeDevice::Missing),
            (0, FakeDevice::Broken),
            (2, FakeDevice::Working),
        ]));
        let log = backend.log.clone();
        let mut device = CaptureDevice::new(backend, config(vec![1, 0, 2], 0));

        let index = device.open().await.unwrap();
        assert_eq!(index, 2);
        assert_eq!(device.active_index(), Some(2));

        let log = log.lock().unwrap();
        assert_eq!(log.opened, vec![0, 2]);
        // The broken device was released immediately after its test read
        assert_eq!(log.released, vec![0]);
    }

    #[tokio::test]
    async fn test_warm_up_discards_frames() {
        let backend = Arc::new(FakeCameraBackend::new(vec![(0, FakeDevice::Working)]));
        let log = backend.log.clone();
        let mut device = CaptureDevice::new(backend, config(vec![0], 5));

        device.open().await.unwrap();
        let frame = device.read().await.unwrap();

        // 1 test read + 5 warm-up + 1 real read
        assert_eq!(log.lock().unwrap().reads[&0], 7);
        assert_eq!(frame.data, vec![0, 7]);
        assert_eq!(frame.source, FrameSource::Local);
    }

    #[tokio::test]
    async fn test_warm_up_failure_rejects_candidate() {
        let backend = Arc::new(FakeCameraBackend::new(vec![
            (0, FakeDevice::FailsAfter(2)),
            (1, FakeDevice::Working),
        ]));
        let log = backend.log.clone();
        let mut device = CaptureDevice::new(backend, config(vec![0, 1], 3));

        assert_eq!(device.open().await.unwrap(), 1);
        assert_eq!(log.lock().unwrap().released, vec![0]);
    }

    #[tokio::test]
    async fn test_no_working_camera() {
        let backend = Arc::new(FakeCameraBackend::new(vec![(0, FakeDevice::Broken)]));
        let log = backend.log.clone();
        let mut device = CaptureDevice::new(backend, config(vec![1, 0, 2], 0));

        let result = device.open().await;
        assert!(matches!(result, Err(Error::DeviceUnavailable(_))));
        assert!(!device.is_open());

        let log = log.lock().unwrap();
        assert_eq!(log.opened, log.released);
    }

    #[tokio::test]
    async fn test_read_without_open_fails() {
        let backend = Arc::new(FakeCameraBackend::new(vec![]));
        let mut device = CaptureDevice::new(backend, config(vec![0], 0));
        assert!(matches!(device.read().await, Err(Error::CaptureFailed(_))));
    }

    #[tokio::test]
    async fn test_read_failure_releases_handle() {
        let backend = Arc::new(FakeCameraBackend::new(vec![(0, FakeDevice::FailsAfter(1))]));
        let log = backend.log.clone();
        let mut device = CaptureDevice::new(backend, config(vec![0], 0));

        device.open().await.unwrap();
        assert!(matches!(device.read().await, Err(Error::CaptureFailed(_))));
        assert!(!device.is_open());
        assert_eq!(log.lock().unwrap().released, vec![0]);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_reopen_works() {
        let backend = Arc::new(FakeCameraBackend::new(vec![(0, FakeDevice::Working)]));
        let log = backend.log.clone();
        let mut device = CaptureDevice::new(backend, config(vec![0], 0));

        device.open().await.unwrap();
        // Second open keeps the same handle
        device.open().await.unwrap();
        device.close().await;
        device.close().await;
        assert_eq!(log.lock().unwrap().released, vec![0]);

        device.capture().await.unwrap();
        assert_eq!(log.lock().unwrap().opened, vec![0, 0]);
    }
}
