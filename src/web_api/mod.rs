//! WebAPI - REST API Endpoints
//!
//! ## Responsibilities
//!
//! - Classification node routes (session control)
//! - Capture node routes (camera / motor contract)
//! - Response formatting

mod node_routes;
mod routes;

pub use node_routes::create_node_router;
pub use routes::create_router;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::models::HealthResponse;
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let remote_connected = match &state.remote_health {
        Some(client) => match client.health().await {
            Ok(status) => status.device_ready,
            Err(e) => {
                tracing::debug!(error = %e, "Remote node health check failed");
                false
            }
        },
        None => false,
    };

    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        remote_node_configured: state.remote_health.is_some(),
        remote_node_connected: remote_connected,
    };

    Json(response)
}
