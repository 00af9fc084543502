//! Recycle Sorter - Capture Node
//!
//! Serves the camera and sorting motors to the classification node.

use recycle_sorter::{
    actuator::{ActuatorController, SysfsGpio},
    capture_device::{CaptureDevice, FfmpegV4l2Backend},
    capture_node::CaptureNode,
    state::{NodeConfig, NodeState},
    web_api,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recycle_sorter=debug,capture_node=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Recycle Sorter capture node v{}", env!("CARGO_PKG_VERSION"));

    let config = NodeConfig::default();
    tracing::info!(
        port = config.port,
        camera_indices = ?config.camera.candidates,
        can_pin = config.actuator.can_pin,
        plastic_pin = config.actuator.plastic_pin,
        gpio_sysfs_root = %config.gpio_sysfs_root.display(),
        "Configuration loaded"
    );

    let camera = CaptureDevice::new(Arc::new(FfmpegV4l2Backend::new()), config.camera.clone());
    let actuator = ActuatorController::new(
        Arc::new(SysfsGpio::new(&config.gpio_sysfs_root)),
        config.actuator.clone(),
    );

    let mut node = CaptureNode::new(camera, actuator);
    node.initialize().await;

    let state = NodeState {
        node: Arc::new(Mutex::new(node)),
    };

    let app = web_api::create_node_router(state.clone())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.node.lock().await.shutdown().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
