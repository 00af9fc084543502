//! Recycle Sorter Library
//!
//! Can/plastic sorting bin split across two nodes: a classification node
//! (model + session) and a capture node (camera + sorting motors).
//!
//! ## Architecture
//!
//! 1. CaptureDevice - Local camera probing, warm-up, frame reads
//! 2. ActuatorController - Sorting motor output lines
//! 3. ClassifierClient - Preprocessing + ONNX inference
//! 4. RemoteNodeClient - Capture node HTTP adapter
//! 5. SortingStation - Local / remote capture + actuate pair
//! 6. FrameStore - Last captured frame on disk
//! 7. ClaimRegistrar - Rewards backend client
//! 8. SessionOrchestrator - Session state machine and control loop
//! 9. CaptureNode - Capture node service
//! 10. WebAPI - REST endpoints for both nodes

pub mod actuator;
pub mod capture_device;
pub mod capture_node;
pub mod classifier;
pub mod error;
pub mod frame_store;
pub mod models;
pub mod registrar;
pub mod remote_node;
pub mod session;
pub mod sorting_station;
pub mod state;
pub mod web_api;

pub use error::{Error, Result};
pub use state::AppState;
