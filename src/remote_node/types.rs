//! Capture node wire types
//!
//! Shared by `RemoteNodeClient` and the capture node's own routes.

use serde::{Deserialize, Serialize};

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_ERROR: &str = "error";
pub const STATUS_ONLINE: &str = "online";

/// `GET /api/capture`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureResponse {
    pub status: String,
    /// Base64 JPEG
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `POST /api/motor` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotorRequest {
    #[serde(default)]
    pub prediction: Option<String>,
}

/// `POST /api/motor` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotorResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction: Option<String>,
}

/// `GET /api/status`
///
/// Serialized snake_case; camelCase names from older nodes are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatus {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, alias = "cameraAvailable")]
    pub camera_available: bool,
    #[serde(default, alias = "gpioInitialized")]
    pub gpio_initialized: bool,
    #[serde(default, alias = "deviceReady")]
    pub device_ready: bool,
}

/// `GET /api/test`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTestResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    /// `[height, width, channels]` of a decoded test frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_shape: Option<[u32; 3]>,
    #[serde(default)]
    pub gpio_initialized: bool,
}

/// Error body used by the capture node for any failed call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeErrorBody {
    pub status: String,
    pub message: String,
}

impl NodeErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_ERROR.to_string(),
            message: message.into(),
        }
    }
}
