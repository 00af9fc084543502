//! SortingStation - Capture + Actuate Pair
//!
//! ## Responsibilities
//!
//! - One interface for the local devices and the remote capture node
//! - Connect remote stations by address

use crate::actuator::ActuatorController;
use crate::capture_device::CaptureDevice;
use crate::error::Result;
use crate::models::{Frame, FrameSource, SortLabel};
use crate::remote_node::{RemoteNodeClient, RemoteTimeouts};
use async_trait::async_trait;

/// A place that can produce a frame and dispense the classified item
#[async_trait]
pub trait SortingStation: Send {
    fn kind(&self) -> FrameSource;

    /// Acquire devices ahead of the first capture
    async fn prepare(&mut self) -> Result<()>;

    async fn acquire_frame(&mut self) -> Result<Frame>;

    /// Dispense; returns a human-readable report
    async fn actuate(&mut self, label: SortLabel) -> Result<String>;

    /// Release devices. Safe to call repeatedly.
    async fn release(&mut self);
}

/// Camera (and optionally motors) attached to this node
pub struct LocalStation {
    camera: CaptureDevice,
    actuator: Option<ActuatorController>,
}

impl LocalStation {
    pub fn new(camera: CaptureDevice, actuator: Option<ActuatorController>) -> Self {
        Self { camera, actuator }
    }
}

#[async_trait]
impl SortingStation for LocalStation {
    fn kind(&self) -> FrameSource {
        FrameSource::Local
    }

    async fn prepare(&mut self) -> Result<()> {
        self.camera.open().await.map(|_| ())
    }

    async fn acquire_frame(&mut self) -> Result<Frame> {
        self.camera.capture().await
    }

    async fn actuate(&mut self, label: SortLabel) -> Result<String> {
        match self.actuator.as_mut() {
            Some(actuator) => actuator.activate_label(label).await.map(|r| r.message),
            None => {
                tracing::debug!(label = %label, "Local actuation disabled, skipping motor");
                Ok("local actuation disabled".to_string())
            }
        }
    }

    async fn release(&mut self) {
        self.camera.close().await;
        if let Some(actuator) = self.actuator.as_mut() {
            actuator.release();
        }
    }
}

/// Capture node reached over HTTP
pub struct RemoteStation {
    client: RemoteNodeClient,
}

impl RemoteStation {
    pub fn new(client: RemoteNodeClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SortingStation for RemoteStation {
    fn kind(&self) -> FrameSource {
        FrameSource::Remote
    }

    async fn prepare(&mut self) -> Result<()> {
        Ok(())
    }

    async fn acquire_frame(&mut self) -> Result<Frame> {
        self.client.capture().await
    }

    async fn actuate(&mut self, label: SortLabel) -> Result<String> {
        self.client.actuate(label).await
    }

    async fn release(&mut self) {}
}

/// Builds remote stations from an address
pub trait StationConnector: Send + Sync {
    fn connect(&self, address: &str) -> Result<Box<dyn SortingStation>>;
}

/// Connects to capture nodes over HTTP
#[derive(Debug, Clone, Default)]
pub struct RemoteNodeConnector {
    timeouts: RemoteTimeouts,
}

impl RemoteNodeConnector {
    pub fn new(timeouts: RemoteTimeouts) -> Self {
        Self { timeouts }
    }
}

impl StationConnector for RemoteNodeConnector {
    fn connect(&self, address: &str) -> Result<Box<dyn SortingStation>> {
        let client = RemoteNodeClient::new(address, self.timeouts)?;
        tracing::info!(remote_node = %client.base_url(), "Remote station connected");
        Ok(Box::new(RemoteStation::new(client)))
    }
}
