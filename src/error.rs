//! Error handling for Recycle Sorter

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Remote node operation a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOp {
    Capture,
    Actuate,
    Health,
}

impl RemoteOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteOp::Capture => "capture",
            RemoteOp::Actuate => "actuate",
            RemoteOp::Health => "health",
        }
    }
}

impl fmt::Display for RemoteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Operation requires an active session
    #[error("Session not active. Please start first.")]
    SessionNotActive,

    /// No capture device could be acquired
    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Device opened but the frame could not be obtained
    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    /// Preprocessing or inference failed
    #[error("Classification failed: {0}")]
    ClassificationFailed(String),

    /// Output line could not be driven
    #[error("Actuation failed: {0}")]
    ActuationFailed(String),

    /// Remote node did not answer within the call timeout
    #[error("Remote node {op} timed out")]
    RemoteTimeout { op: RemoteOp },

    /// Remote node unreachable (refused, DNS, reset)
    #[error("Remote node {op} connection error: {message}")]
    RemoteConnection { op: RemoteOp, message: String },

    /// Remote node answered with an error
    #[error("Remote node {op} error: {message}")]
    Remote { op: RemoteOp, message: String },

    /// Backend registrar rejected or failed the claim
    #[error("Registrar error: {0}")]
    Registrar(String),

    /// Session has no sorted items
    #[error("Nothing to claim: session has no sorted items")]
    NothingToClaim,

    /// Label does not map to an output line
    #[error("Unknown actuator target: {0}")]
    UnknownActuatorTarget(String),

    /// Request body could not be parsed
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Config error
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::SessionNotActive => "SESSION_NOT_ACTIVE",
            Error::DeviceUnavailable(_) => "DEVICE_UNAVAILABLE",
            Error::CaptureFailed(_) => "CAPTURE_FAILED",
            Error::ClassificationFailed(_) => "CLASSIFICATION_FAILED",
            Error::ActuationFailed(_) => "ACTUATION_FAILED",
            Error::RemoteTimeout { .. } => "REMOTE_TIMEOUT",
            Error::RemoteConnection { .. } => "REMOTE_CONNECTION_ERROR",
            Error::Remote { .. } => "REMOTE_ERROR",
            Error::Registrar(_) => "REGISTRAR_ERROR",
            Error::NothingToClaim => "NOTHING_TO_CLAIM",
            Error::UnknownActuatorTarget(_) => "UNKNOWN_ACTUATOR_TARGET",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::SessionNotActive
            | Error::NothingToClaim
            | Error::UnknownActuatorTarget(_)
            | Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::DeviceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::RemoteTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Error::RemoteConnection { .. } | Error::Remote { .. } | Error::Registrar(_) => {
                StatusCode::BAD_GATEWAY
            }
            Error::CaptureFailed(_)
            | Error::ClassificationFailed(_)
            | Error::ActuationFailed(_)
            | Error::Config(_)
            | Error::Io(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error_code = %error_code,
                message = %message,
                "Request error"
            );
        } else {
            tracing::warn!(
                status = %status,
                error_code = %error_code,
                message = %message,
                "Request rejected"
            );
        }

        let body = Json(json!({
            "status": "error",
            "error_code": error_code,
            "message": message
        }));

        (status, body).into_response()
    }
}
