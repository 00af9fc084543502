//! Classification node routes

use axum::{
    body::Bytes,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use crate::error::{Error, Result};
use crate::session::CaptureRequest;
use crate::state::AppState;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(super::health_check))
        // Session
        .route("/start", post(start_session))
        .route("/capture", post(capture))
        .route("/stop", post(stop_session))
        .route("/finish", post(finish_session))
        .route("/get_scores", get(get_scores))
        .with_state(state)
}

async fn start_session(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.orchestrator.lock().await.start().await;
    Json(json!({
        "status": "success",
        "message": "Session started",
        "active": status.active,
        "can_count": status.tallies.can_count,
        "plastic_count": status.tallies.plastic_count
    }))
}

/// Empty body means a local capture; anything else must be a valid request
fn parse_capture_request(body: &[u8]) -> Result<CaptureRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CaptureRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| Error::Validation(e.to_string()))
}

async fn capture(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse> {
    let request = parse_capture_request(&body)?;
    let outcome = state.orchestrator.lock().await.capture(request).await?;

    Ok(Json(json!({
        "status": "success",
        "result": outcome.label,
        "confidence": outcome.confidence,
        "can_count": outcome.tallies.can_count,
        "plastic_count": outcome.tallies.plastic_count,
        "source": outcome.source,
        "frame": outcome.frame,
        "actuation": outcome.actuation
    })))
}

async fn stop_session(State(state): State<AppState>) -> impl IntoResponse {
    let tallies = state.orchestrator.lock().await.stop().await;
    Json(json!({
        "status": "success",
        "message": "Session stopped",
        "can_count": tallies.can_count,
        "plastic_count": tallies.plastic_count
    }))
}

async fn finish_session(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let receipt = state.orchestrator.lock().await.finish().await?;
    Ok(Json(json!({
        "status": "success",
        "qr_url": receipt.claim_token,
        "can_count": receipt.tallies.can_count,
        "plastic_count": receipt.tallies.plastic_count
    })))
}

async fn get_scores(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.orchestrator.lock().await.status())
}
