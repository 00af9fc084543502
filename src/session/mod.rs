//! SessionOrchestrator - Sorting Session Control Loop
//!
//! ## Responsibilities
//!
//! - Session lifecycle (Idle / Active) and tallies
//! - capture → persist → classify → count → actuate
//! - Local vs remote station selection
//! - Claim submission on finish
//!
//! ## Invariants
//!
//! - Counters reset only on `start`
//! - A counter moves only after a successful classification, and is never
//!   rolled back by an actuation failure
//! - Devices are released on `stop` / `finish`


use crate::classifier::ClassifierClient;
use crate::error::{Error, Result};
use crate::frame_store::{FrameRef, FrameStore};
use crate::models::{FrameSource, SortLabel, Tallies};
use crate::registrar::ClaimRegistrar;
use crate::sorting_station::{SortingStation, StationConnector};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Active,
}

#[derive(Debug, Clone, Copy)]
struct Session {
    state: SessionState,
    tallies: Tallies,
}

impl Session {
    fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }
}

/// Snapshot returned by `status` / `start`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub active: bool,
    #[serde(flatten)]
    pub tallies: Tallies,
}

/// Capture options
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaptureRequest {
    #[serde(default)]
    pub use_remote: bool,
    /// Overrides the configured remote node address
    #[serde(default)]
    pub remote_address: Option<String>,
}

impl CaptureRequest {
    pub fn local() -> Self {
        Self::default()
    }

    pub fn remote(address: Option<String>) -> Self {
        Self {
            use_remote: true,
            remote_address: address,
        }
    }
}

/// How the dispense step went
#[derive(Debug, Clone, Serialize)]
pub struct ActuationOutcome {
    pub ok: bool,
    pub message: String,
}

/// Result of a successful capture
#[derive(Debug, Clone, Serialize)]
pub struct CaptureOutcome {
    pub label: SortLabel,
    /// Percent, 2 decimals
    pub confidence: f64,
    pub tallies: Tallies,
    pub frame: Option<FrameRef>,
    pub actuation: ActuationOutcome,
    pub source: FrameSource,
}

/// Result of a successful finish
#[derive(Debug, Clone, Serialize)]
pub struct ClaimReceipt {
    pub claim_token: String,
    pub tallies: Tallies,
}

struct ConnectedRemote {
    address: String,
    station: Box<dyn SortingStation>,
}

/// SessionOrchestrator instance
pub struct SessionOrchestrator {
    session: Session,
    local: Box<dyn SortingStation>,
    connector: Arc<dyn StationConnector>,
    remote: Option<ConnectedRemote>,
    default_remote: Option<String>,
    classifier: ClassifierClient,
    frame_store: FrameStore,
    registrar: Option<Arc<dyn ClaimRegistrar>>,
}

impl SessionOrchestrator {
    /// Create new SessionOrchestrator (Idle, zero tallies)
    pub fn new(
        local: Box<dyn SortingStation>,
        connector: Arc<dyn StationConnector>,
        classifier: ClassifierClient,
        frame_store: FrameStore,
    ) -> Self {
        Self {
            session: Session {
                state: SessionState::Idle,
                tallies: Tallies::default(),
            },
            local,
            connector,
            remote: None,
            default_remote: None,
            classifier,
            frame_store,
            registrar: None,
        }
    }

    /// Remote node used when a remote capture names no address
    pub fn with_default_remote(mut self, address: Option<String>) -> Self {
        self.default_remote = address;
        self
    }

    pub fn with_registrar(mut self, registrar: Arc<dyn ClaimRegistrar>) -> Self {
        self.registrar = Some(registrar);
        self
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            active: self.session.is_active(),
            tallies: self.session.tallies,
        }
    }

    /// Begin (or restart) a session with zeroed tallies
    ///
    /// Local device acquisition is attempted eagerly; failure only logs.
    pub async fn start(&mut self) -> SessionStatus {
        let restarted = self.session.is_active();
        self.session = Session {
            state: SessionState::Active,
            tallies: Tallies::default(),
        };

        if let Err(e) = self.local.prepare().await {
            tracing::warn!(error = %e, "Local station not ready at session start");
        }

        tracing::info!(restarted = restarted, "Session started");
        self.status()
    }

    /// Run one capture → classify → count → actuate cycle
    pub async fn capture(&mut self, request: CaptureRequest) -> Result<CaptureOutcome> {
        if !self.session.is_active() {
            return Err(Error::SessionNotActive);
        }

        if request.use_remote {
            let address = request
                .remote_address
                .filter(|a| !a.trim().is_empty())
                .or_else(|| self.default_remote.clone())
                .ok_or_else(|| Error::Config("no remote node address configured".to_string()))?;
            self.connect_remote(&address).await?;
        }

        let station: &mut dyn SortingStation = match (request.use_remote, self.remote.as_mut()) {
            (true, Some(remote)) => remote.station.as_mut(),
            (true, None) => return Err(Error::Internal("remote station missing".to_string())),
            (false, _) => self.local.as_mut(),
        };

        let frame = station.acquire_frame().await.map_err(|e| {
            tracing::warn!(station = station.kind().as_str(), error = %e, "Frame acquisition failed");
            e
        })?;
        let source = frame.source;

        let frame_ref = match self.frame_store.persist(&frame).await {
            Ok(frame_ref) => Some(frame_ref),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to save frame, continuing");
                None
            }
        };

        let verdict = self.classifier.classify(frame).await.map_err(|e| {
            tracing::warn!(error = %e, "Classification failed");
            e
        })?;

        self.session.tallies.record(verdict.label);
        let confidence = verdict.confidence_pct();
        tracing::info!(
            label = %verdict.label,
            confidence = confidence,
            source = source.as_str(),
            can_count = self.session.tallies.can_count,
            plastic_count = self.session.tallies.plastic_count,
            "Item classified"
        );

        let actuation = match station.actuate(verdict.label).await {
            Ok(message) => ActuationOutcome { ok: true, message },
            Err(e) => {
                tracing::error!(label = %verdict.label, error = %e, "Actuation failed, count kept");
                ActuationOutcome {
                    ok: false,
                    message: e.to_string(),
                }
            }
        };

        Ok(CaptureOutcome {
            label: verdict.label,
            confidence,
            tallies: self.session.tallies,
            frame: frame_ref,
            actuation,
            source,
        })
    }

    /// End the session and release devices. Idle sessions just report tallies.
    pub async fn stop(&mut self) -> Tallies {
        if self.session.is_active() {
            self.session.state = SessionState::Idle;
            self.local.release().await;
            if let Some(mut remote) = self.remote.take() {
                remote.station.release().await;
            }
            tracing::info!(
                can_count = self.session.tallies.can_count,
                plastic_count = self.session.tallies.plastic_count,
                "Session stopped"
            );
        }
        self.session.tallies
    }

    /// Submit tallies to the registrar, then stop
    ///
    /// A registrar failure leaves the session Active and untouched.
    pub async fn finish(&mut self) -> Result<ClaimReceipt> {
        if !self.session.is_active() {
            return Err(Error::SessionNotActive);
        }

        let tallies = self.session.tallies;
        if tallies.total() == 0 {
            return Err(Error::NothingToClaim);
        }

        let registrar = self
            .registrar
            .as_ref()
            .ok_or_else(|| Error::Registrar("no registrar configured".to_string()))?;

        let claim_token = registrar.register(tallies).await.map_err(|e| {
            tracing::error!(error = %e, "Claim submission failed, session kept active");
            match e {
                Error::Registrar(_) => e,
                other => Error::Registrar(other.to_string()),
            }
        })?;

        self.stop().await;
        tracing::info!(total = tallies.total(), "Session finished");
        Ok(ClaimReceipt {
            claim_token,
            tallies,
        })
    }

    /// Shutdown hook: stop and drop any remote connection
    pub async fn shutdown(&mut self) {
        self.stop().await;
        self.local.release().await;
    }

    async fn connect_remote(&mut self, address: &str) -> Result<()> {
        if matches!(&self.remote, Some(remote) if remote.address == address) {
            return Ok(());
        }
        if let Some(mut previous) = self.remote.take() {
            previous.station.release().await;
        }
        let station = self.connector.connect(address)?;
        self.remote = Some(ConnectedRemote {
            address: address.to_string(),
            station,
        });
        Ok(())
    }
}
