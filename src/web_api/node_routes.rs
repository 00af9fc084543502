//! Capture node routes
//!
//! Error bodies follow the node contract (`{status: "error", message}`)
//! rather than the classification node's error codes.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::Error;
use crate::remote_node::{CaptureResponse, MotorRequest, MotorResponse, NodeErrorBody, STATUS_SUCCESS};
use crate::state::NodeState;

/// Create capture node router
pub fn create_node_router(state: NodeState) -> Router {
    Router::new()
        .route("/api/status", get(node_status))
        .route("/api/capture", get(node_capture))
        .route("/api/motor", post(node_motor))
        .route("/api/test", get(node_test))
        .with_state(state)
}

fn node_error(status: StatusCode, message: impl Into<String>) -> Response {
    let message = message.into();
    if status.is_server_error() {
        tracing::error!(status = %status, message = %message, "Capture node request failed");
    } else {
        tracing::warn!(status = %status, message = %message, "Capture node request rejected");
    }
    (status, Json(NodeErrorBody::new(message))).into_response()
}

fn error_status(e: &Error) -> StatusCode {
    match e {
        Error::UnknownActuatorTarget(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn node_status(State(state): State<NodeState>) -> impl IntoResponse {
    Json(state.node.lock().await.status())
}

async fn node_capture(State(state): State<NodeState>) -> Response {
    match state.node.lock().await.capture().await {
        Ok(frame) => Json(CaptureResponse {
            status: STATUS_SUCCESS.to_string(),
            image: Some(STANDARD.encode(&frame.data)),
            message: None,
        })
        .into_response(),
        Err(e) => node_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn node_motor(
    State(state): State<NodeState>,
    body: Option<Json<MotorRequest>>,
) -> Response {
    let prediction = match body.and_then(|Json(r)| r.prediction) {
        Some(p) if !p.trim().is_empty() => p,
        _ => return node_error(StatusCode::BAD_REQUEST, "No prediction provided"),
    };

    match state.node.lock().await.actuate(&prediction).await {
        Ok(report) => Json(MotorResponse {
            status: STATUS_SUCCESS.to_string(),
            message: report.message,
            prediction: Some(report.label.wire_name().to_string()),
        })
        .into_response(),
        Err(e) => node_error(error_status(&e), e.to_string()),
    }
}

async fn node_test(State(state): State<NodeState>) -> Response {
    match state.node.lock().await.self_test().await {
        Ok(result) => Json(result).into_response(),
        Err(e) => node_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::testing::FakeLines;
    use crate::actuator::{ActuatorConfig, ActuatorController};
    use crate::capture_device::testing::{FakeCameraBackend, FakeDevice};
    use crate::capture_device::{CameraConfig, CaptureDevice};
    use crate::capture_node::CaptureNode;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    fn test_state(devices: Vec<(u32, FakeDevice)>) -> NodeState {
        let camera = CaptureDevice::new(
            Arc::new(FakeCameraBackend::new(devices)),
            CameraConfig {
                candidates: vec![0],
                warmup_frames: 0,
                ..CameraConfig::default()
            },
        );
        let actuator = ActuatorController::new(
            Arc::new(FakeLines::default()),
            ActuatorConfig {
                can_duration: Duration::from_millis(5),
                plastic_duration: Duration::from_millis(5),
                ..ActuatorConfig::default()
            },
        );
        NodeState {
            node: Arc::new(Mutex::new(CaptureNode::new(camera, actuator))),
        }
    }

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn motor_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/motor")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_motor_activates_label() {
        let app = create_node_router(test_state(vec![]));
        let (status, body) = call(app, motor_request(json!({"prediction": "Can"}))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["prediction"], "can");
    }

    #[tokio::test]
    async fn test_motor_missing_prediction() {
        let app = create_node_router(test_state(vec![]));
        let (status, body) = call(app, motor_request(json!({}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "No prediction provided");
    }

    #[tokio::test]
    async fn test_motor_unknown_target() {
        let app = create_node_router(test_state(vec![]));
        let (status, body) = call(app, motor_request(json!({"prediction": "glass"}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_capture_returns_base64_frame() {
        let app = create_node_router(test_state(vec![(0, FakeDevice::Working)]));
        let request = Request::builder()
            .uri("/api/capture")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        let image = STANDARD.decode(body["image"].as_str().unwrap()).unwrap();
        assert_eq!(image.len(), 2);
    }

    #[tokio::test]
    async fn test_capture_without_camera() {
        let app = create_node_router(test_state(vec![]));
        let request = Request::builder()
            .uri("/api/capture")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(app, request).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_status_reports_devices() {
        let app = create_node_router(test_state(vec![]));
        let request = Request::builder()
            .uri("/api/status")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "online");
        assert_eq!(body["camera_available"], false);
        assert_eq!(body["device_ready"], false);
    }
}
