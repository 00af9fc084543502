//! Recycle Sorter - Classification Node
//!
//! Main entry point: loads the model, wires the session orchestrator and
//! serves the session API.

use recycle_sorter::{
    actuator::{ActuatorController, SysfsGpio},
    capture_device::{CaptureDevice, FfmpegV4l2Backend},
    classifier::{ClassifierClient, OnnxClassifier},
    frame_store::FrameStore,
    registrar::HttpRegistrar,
    remote_node::RemoteNodeClient,
    session::SessionOrchestrator,
    sorting_station::{LocalStation, RemoteNodeConnector},
    state::{AppConfig, AppState},
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
                .unwrap_or_else(|_| "recycle_sorter=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Recycle Sorter v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        port = config.port,
        model_path = %config.model_path.display(),
        picture_dir = %config.picture_dir.display(),
        camera_indices = ?config.camera.candidates,
        remote_node_url = ?config.remote_node_url,
        local_actuator_enabled = config.local_actuator_enabled,
        registrar_configured = config.registrar_url.is_some(),
        "Configuration loaded"
    );

    // Model load failure is fatal
    let model = OnnxClassifier::load(&config.model_path)?;
    let classifier = ClassifierClient::new(Arc::new(model));

    // Local station
    let backend = FfmpegV4l2Backend::new();
    match backend.check_ffmpeg().await {
        Ok(version) => tracing::info!(version = %version, "ffmpeg available"),
        Err(e) => tracing::warn!(error = %e, "ffmpeg not available, local capture will fail"),
    }
    let camera = CaptureDevice::new(Arc::new(backend), config.camera.clone());
    let actuator = config.local_actuator_enabled.then(|| {
        ActuatorController::new(
            Arc::new(SysfsGpio::new(&config.gpio_sysfs_root)),
            config.actuator.clone(),
        )
    });
    let local = LocalStation::new(camera, actuator);

    let mut orchestrator = SessionOrchestrator::new(
        Box::new(local),
        Arc::new(RemoteNodeConnector::new(config.remote_timeouts)),
        classifier,
        FrameStore::new(&config.picture_dir),
    )
    .with_default_remote(config.remote_node_url.clone());

    match &config.registrar_url {
        Some(url) => {
            let registrar = HttpRegistrar::new(
                url.clone(),
                config.bin_id.clone(),
                config.bin_secret_key.clone(),
            )?;
            orchestrator = orchestrator.with_registrar(Arc::new(registrar));
            tracing::info!(url = %url, bin_id = %config.bin_id, "Registrar configured");
        }
        None => tracing::warn!("REGISTRAR_URL not set, finish will fail"),
    }

    let remote_health = match &config.remote_node_url {
        Some(url) => Some(Arc::new(RemoteNodeClient::new(url, config.remote_timeouts)?)),
        None => None,
    };

    let state = AppState {
        config: config.clone(),
        orchestrator: Arc::new(Mutex::new(orchestrator)),
        remote_health,
    };

    let app = web_api::create_router(state.clone())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.orchestrator.lock().await.shutdown().await;
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
