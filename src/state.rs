//! Application state
//!
//! Configuration for both nodes and the state shared across handlers

use crate::actuator::ActuatorConfig;
use crate::capture_device::{CameraConfig, Resolution};
use crate::capture_node::CaptureNode;
use crate::remote_node::{RemoteNodeClient, RemoteTimeouts};
use crate::session::SessionOrchestrator;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Classification node configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// ONNX classifier model
    pub model_path: PathBuf,
    /// Where the last captured frame is written
    pub picture_dir: PathBuf,
    /// Local camera
    pub camera: CameraConfig,
    /// Capture node address used when a remote capture names none
    pub remote_node_url: Option<String>,
    pub remote_timeouts: RemoteTimeouts,
    /// Drive motors wired to this node
    pub local_actuator_enabled: bool,
    pub actuator: ActuatorConfig,
    pub gpio_sysfs_root: PathBuf,
    /// Rewards backend claim endpoint
    pub registrar_url: Option<String>,
    pub bin_id: String,
    pub bin_secret_key: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let defaults = RemoteTimeouts::default();
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("PORT", 5000),
            model_path: std::env::var("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("model/recycle_classifier.onnx")),
            picture_dir: std::env::var("PICTURE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("pictures")),
            camera: camera_from_env(&[1, 0, 2]),
            remote_node_url: env_opt("REMOTE_NODE_URL"),
            remote_timeouts: RemoteTimeouts {
                capture: Duration::from_secs(env_or(
                    "REMOTE_CAPTURE_TIMEOUT_SECS",
                    defaults.capture.as_secs(),
                )),
                actuate: Duration::from_secs(env_or(
                    "REMOTE_ACTUATE_TIMEOUT_SECS",
                    defaults.actuate.as_secs(),
                )),
                health: defaults.health,
            },
            local_actuator_enabled: env_flag("LOCAL_ACTUATOR_ENABLED", false),
            actuator: actuator_from_env(),
            gpio_sysfs_root: gpio_root_from_env(),
            registrar_url: env_opt("REGISTRAR_URL"),
            bin_id: std::env::var("BIN_ID").unwrap_or_else(|_| "bin-001".to_string()),
            bin_secret_key: std::env::var("BIN_SECRET_KEY").unwrap_or_default(),
        }
    }
}

/// Capture node configuration
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    pub camera: CameraConfig,
    pub actuator: ActuatorConfig,
    pub gpio_sysfs_root: PathBuf,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("PORT", 5001),
            camera: camera_from_env(&[0, 1, 2]),
            actuator: actuator_from_env(),
            gpio_sysfs_root: gpio_root_from_env(),
        }
    }
}

fn camera_from_env(default_indices: &[u32]) -> CameraConfig {
    let defaults = CameraConfig::default();
    CameraConfig {
        candidates: std::env::var("CAMERA_INDICES")
            .ok()
            .and_then(|s| parse_indices(&s))
            .unwrap_or_else(|| default_indices.to_vec()),
        resolution: Resolution {
            width: env_or("CAMERA_WIDTH", defaults.resolution.width),
            height: env_or("CAMERA_HEIGHT", defaults.resolution.height),
        },
        warmup_frames: env_or("CAMERA_WARMUP_FRAMES", defaults.warmup_frames),
        read_timeout: Duration::from_millis(env_or(
            "CAMERA_READ_TIMEOUT_MS",
            defaults.read_timeout.as_millis() as u64,
        )),
    }
}

fn actuator_from_env() -> ActuatorConfig {
    let defaults = ActuatorConfig::default();
    ActuatorConfig {
        can_pin: env_or("MOTOR_CAN_PIN", defaults.can_pin),
        plastic_pin: env_or("MOTOR_PLASTIC_PIN", defaults.plastic_pin),
        can_duration: Duration::from_millis(env_or(
            "MOTOR_TIME_CAN_MS",
            defaults.can_duration.as_millis() as u64,
        )),
        plastic_duration: Duration::from_millis(env_or(
            "MOTOR_TIME_PLASTIC_MS",
            defaults.plastic_duration.as_millis() as u64,
        )),
    }
}

fn gpio_root_from_env() -> PathBuf {
    std::env::var("GPIO_SYSFS_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/sys/class/gpio"))
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// "1,0,2" → [1, 0, 2]; `None` when empty or malformed
pub fn parse_indices(s: &str) -> Option<Vec<u32>> {
    let indices = s
        .split(',')
        .map(|part| part.trim().parse::<u32>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .ok()?;
    if indices.is_empty() {
        None
    } else {
        Some(indices)
    }
}

/// Classification node state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// The single session orchestrator; the mutex serializes requests
    pub orchestrator: Arc<Mutex<SessionOrchestrator>>,
    /// Default capture node (reachability for /healthz)
    pub remote_health: Option<Arc<RemoteNodeClient>>,
}

/// Capture node state shared across handlers
#[derive(Clone)]
pub struct NodeState {
    pub node: Arc<Mutex<CaptureNode>>,
}
