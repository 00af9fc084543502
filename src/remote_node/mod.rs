//! RemoteNodeClient - Capture Node Communication Adapter
//!
//! ## Responsibilities
//!
//! - Request a frame from the capture node (`GET /api/capture`)
//! - Send a motor command (`POST /api/motor`)
//! - Node status check (`GET /api/status`)
//! - Classify failures as timeout / connection / remote error, no retry

pub mod types;

pub use types::*;

use crate::error::{Error, RemoteOp, Result};
use crate::models::{Frame, FrameSource, SortLabel};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Per-call timeouts
#[derive(Debug, Clone, Copy)]
pub struct RemoteTimeouts {
    pub capture: Duration,
    pub actuate: Duration,
    pub health: Duration,
}

impl Default for RemoteTimeouts {
    fn default() -> Self {
        Self {
            capture: Duration::from_secs(10),
            actuate: Duration::from_secs(5),
            health: Duration::from_secs(3),
        }
    }
}

/// Capture node client
pub struct RemoteNodeClient {
    client: reqwest::Client,
    base_url: String,
    timeouts: RemoteTimeouts,
}

impl RemoteNodeClient {
    /// Create new client for `address` (`host:port` or full URL)
    pub fn new(address: &str, timeouts: RemoteTimeouts) -> Result<Self> {
        let base_url = normalize_base_url(address)?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            timeouts,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Request one frame from the capture node
    pub async fn capture(&self) -> Result<Frame> {
        let url = format!("{}/api/capture", self.base_url);
        tracing::debug!(url = %url, "Requesting remote capture");

        let request = self.client.get(&url).timeout(self.timeouts.capture);
        let body: CaptureResponse = self.call(RemoteOp::Capture, request).await?;

        if body.status != STATUS_SUCCESS {
            return Err(remote_error(
                RemoteOp::Capture,
                body.message.unwrap_or_else(|| "capture failed".to_string()),
            ));
        }

        let encoded = body
            .image
            .ok_or_else(|| remote_error(RemoteOp::Capture, "response has no image"))?;
        let data = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| remote_error(RemoteOp::Capture, format!("invalid base64 image: {}", e)))?;

        tracing::debug!(size = data.len(), "Remote frame received");
        Ok(Frame::new(data, FrameSource::Remote))
    }

    /// Ask the capture node to run the motor for `label`
    pub async fn actuate(&self, label: SortLabel) -> Result<String> {
        let url = format!("{}/api/motor", self.base_url);
        let payload = MotorRequest {
            prediction: Some(label.wire_name().to_string()),
        };
        tracing::debug!(url = %url, label = %label, "Sending remote motor command");

        let request = self
            .client
            .post(&url)
            .timeout(self.timeouts.actuate)
            .json(&payload);
        let body: MotorResponse = self.call(RemoteOp::Actuate, request).await?;

        if body.status != STATUS_SUCCESS {
            return Err(remote_error(RemoteOp::Actuate, body.message));
        }
        Ok(body.message)
    }

    /// Capture node status
    pub async fn health(&self) -> Result<NodeStatus> {
        let url = format!("{}/api/status", self.base_url);
        let request = self.client.get(&url).timeout(self.timeouts.health);
        self.call(RemoteOp::Health, request).await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        op: RemoteOp,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = request.send().await.map_err(|e| transport_error(op, e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| transport_error(op, e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<NodeErrorBody>(&text)
                .map(|b| b.message)
                .unwrap_or_else(|_| format!("HTTP {}", status));
            tracing::warn!(op = %op, status = %status, message = %message, "Remote node returned error");
            return Err(remote_error(op, message));
        }

        serde_json::from_str(&text)
            .map_err(|e| remote_error(op, format!("malformed response: {}", e)))
    }
}

fn remote_error(op: RemoteOp, message: impl Into<String>) -> Error {
    Error::Remote {
        op,
        message: message.into(),
    }
}

fn transport_error(op: RemoteOp, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        tracing::warn!(op = %op, "Remote node call timed out");
        Error::RemoteTimeout { op }
    } else if e.is_connect() {
        tracing::warn!(op = %op, error = %e, "Remote node unreachable");
        Error::RemoteConnection {
            op,
            message: e.to_string(),
        }
    } else {
        tracing::warn!(op = %op, error = %e, "Remote node request failed");
        remote_error(op, e.to_string())
    }
}

/// `host:port` → `http://host:port`, trailing slash removed
pub fn normalize_base_url(address: &str) -> Result<String> {
    let trimmed = address.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::Config("remote node address is empty".to_string()));
    }
    if trimmed.contains("://") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("http://{}", trimmed))
    }
}
