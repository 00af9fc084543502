//! CaptureNode - Camera + Motor Service
//!
//! ## Responsibilities
//!
//! - Own the capture node's camera and motor lines
//! - Serve the node contract used by `RemoteNodeClient`
//! - Release camera and lines on shutdown

use crate::actuator::{ActuationReport, ActuatorController};
use crate::capture_device::CaptureDevice;
use crate::error::{Error, Result};
use crate::models::Frame;
use crate::remote_node::{NodeStatus, NodeTestResponse, STATUS_ONLINE, STATUS_SUCCESS};

/// CaptureNode instance
pub struct CaptureNode {
    camera: CaptureDevice,
    actuator: ActuatorController,
}

impl CaptureNode {
    pub fn new(camera: CaptureDevice, actuator: ActuatorController) -> Self {
        Self { camera, actuator }
    }

    /// Acquire camera and lines at boot; failures leave them for lazy retry
    pub async fn initialize(&mut self) {
        match self.camera.open().await {
            Ok(index) => tracing::info!(camera_index = index, "Camera ready"),
            Err(e) => tracing::warn!(error = %e, "Camera not available at startup"),
        }
        if let Err(e) = self.actuator.initialize() {
            tracing::warn!(error = %e, "Motor lines not available at startup");
        }
    }

    /// Grab a frame, opening the camera if needed
    pub async fn capture(&mut self) -> Result<Frame> {
        self.camera.capture().await
    }

    pub async fn actuate(&mut self, target: &str) -> Result<ActuationReport> {
        self.actuator.activate(target).await
    }

    pub fn status(&self) -> NodeStatus {
        let camera_available = self.camera.is_open();
        let gpio_initialized = self.actuator.is_initialized();
        let device_ready = camera_available && gpio_initialized;

        NodeStatus {
            status: STATUS_ONLINE.to_string(),
            message: if device_ready {
                "Capture node ready".to_string()
            } else {
                "Capture node running with missing devices".to_string()
            },
            camera_available,
            gpio_initialized,
            device_ready,
        }
    }

    /// Claim the motor lines, capture one frame and report its decoded shape
    ///
    /// Line claim failures are reported in the response, not raised.
    pub async fn self_test(&mut self) -> Result<NodeTestResponse> {
        let gpio_initialized = match self.actuator.initialize() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Self-test: motor lines unavailable");
                false
            }
        };

        let frame = self.capture().await?;
        let decoded = image::load_from_memory(&frame.data)
            .map_err(|e| Error::CaptureFailed(format!("test frame not decodable: {}", e)))?;

        Ok(NodeTestResponse {
            status: STATUS_SUCCESS.to_string(),
            message: "Camera and GPIO test completed".to_string(),
            camera_shape: Some([decoded.height(), decoded.width(), 3]),
            gpio_initialized,
        })
    }

    pub async fn shutdown(&mut self) {
        self.camera.close().await;
        self.actuator.release();
        tracing::info!("Capture node devices released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::testing::FakeLines;
    use crate::actuator::{ActuatorConfig, Level};
    use crate::capture_device::testing::{FakeCameraBackend, FakeDevice};
    use crate::capture_device::CameraConfig;
    use crate::classifier::testing::sample_image;
    use std::sync::Arc;
    use std::time::Duration;

    fn node(devices: Vec<(u32, FakeDevice)>) -> (CaptureNode, Arc<FakeCameraBackend>, Arc<FakeLines>) {
        node_with_lines(devices, FakeLines::default())
    }

    fn node_with_lines(
        devices: Vec<(u32, FakeDevice)>,
        lines: FakeLines,
    ) -> (CaptureNode, Arc<FakeCameraBackend>, Arc<FakeLines>) {
        let backend = Arc::new(FakeCameraBackend::new(devices));
        let lines = Arc::new(lines);
        let camera = CaptureDevice::new(
            backend.clone(),
            CameraConfig {
                candidates: vec![0, 1, 2],
                warmup_frames: 0,
                ..CameraConfig::default()
            },
        );
        let actuator = ActuatorController::new(
            lines.clone(),
            ActuatorConfig {
                can_duration: Duration::from_millis(5),
                plastic_duration: Duration::from_millis(5),
                ..ActuatorConfig::default()
            },
        );
        (CaptureNode::new(camera, actuator), backend, lines)
    }

    #[tokio::test]
    async fn test_status_after_initialize() {
        let (mut node, _, _) = node(vec![(1, FakeDevice::Working)]);
        assert!(!node.status().device_ready);

        node.initialize().await;
        let status = node.status();
        assert_eq!(status.status, "online");
        assert!(status.camera_available);
        assert!(status.gpio_initialized);
        assert!(status.device_ready);
    }

    #[tokio::test]
    async fn test_status_without_camera() {
        let (mut node, _, _) = node(vec![]);
        node.initialize().await;

        let status = node.status();
        assert!(!status.camera_available);
        assert!(status.gpio_initialized);
        assert!(!status.device_ready);
        assert!(matches!(node.capture().await, Err(Error::DeviceUnavailable(_))));
    }

    #[tokio::test]
    async fn test_actuate_unknown_target() {
        let (mut node, _, lines) = node(vec![]);
        assert!(matches!(
            node.actuate("paper").await,
            Err(Error::UnknownActuatorTarget(_))
        ));
        assert!(lines.log.lock().unwrap().writes.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_releases_devices() {
        let (mut node, backend, lines) = node(vec![(0, FakeDevice::Working)]);
        node.initialize().await;
        node.actuate("can").await.unwrap();
        node.shutdown().await;

        assert_eq!(backend.log.lock().unwrap().released, vec![0]);
        let log = lines.log.lock().unwrap();
        assert_eq!(log.last_level(17), Some(Level::Low));
        assert_eq!(log.last_level(27), Some(Level::Low));
        assert!(!node.status().camera_available);
    }

    #[tokio::test]
    async fn test_self_test_rejects_undecodable_frame() {
        // Fake frames are two raw bytes, not an image
        let (mut node, _, _) = node(vec![(0, FakeDevice::Working)]);
        assert!(matches!(node.self_test().await, Err(Error::CaptureFailed(_))));
    }

    #[tokio::test]
    async fn test_self_test_initializes_lines_on_fresh_node() {
        let (mut node, _, lines) =
            node(vec![(0, FakeDevice::Picture(sample_image([200, 30, 30])))]);
        assert!(!node.status().gpio_initialized);

        let report = node.self_test().await.unwrap();
        assert_eq!(report.status, "success");
        assert_eq!(report.camera_shape, Some([24, 32, 3]));
        assert!(report.gpio_initialized);
        assert!(node.status().gpio_initialized);
        assert_eq!(lines.log.lock().unwrap().claimed, vec![17, 27]);
    }

    #[tokio::test]
    async fn test_self_test_claims_lines_even_without_camera() {
        let (mut node, _, _) = node(vec![]);

        assert!(matches!(node.self_test().await, Err(Error::DeviceUnavailable(_))));
        assert!(node.status().gpio_initialized);
    }

    #[tokio::test]
    async fn test_self_test_reports_unclaimable_lines() {
        let lines = FakeLines {
            unclaimable: [27].into_iter().collect(),
            ..FakeLines::default()
        };
        let (mut node, _, _) =
            node_with_lines(vec![(0, FakeDevice::Picture(sample_image([10, 10, 10])))], lines);

        let report = node.self_test().await.unwrap();
        assert_eq!(report.camera_shape, Some([24, 32, 3]));
        assert!(!report.gpio_initialized);
    }
}
