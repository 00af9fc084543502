//! ClaimRegistrar - Rewards Backend Client
//!
//! ## Responsibilities
//!
//! - Report final session tallies to the rewards backend
//! - Return the claim reference (`qrUrl`) the user redeems
//!
//! ## Payload
//!
//! `POST {plasticCount, canCount, binId, secretKey}` → `{qrUrl}`

use crate::error::{Error, Result};
use crate::models::Tallies;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Receives tallies, returns a claim token
#[async_trait]
pub trait ClaimRegistrar: Send + Sync {
    async fn register(&self, tallies: Tallies) -> Result<String>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClaimPayload<'a> {
    plastic_count: u32,
    can_count: u32,
    bin_id: &'a str,
    secret_key: &'a str,
}

/// HTTP registrar
pub struct HttpRegistrar {
    url: String,
    bin_id: String,
    secret_key: String,
    http_client: Client,
}

impl HttpRegistrar {
    /// Create new HttpRegistrar
    ///
    /// # Arguments
    /// * `url` - claim endpoint
    /// * `bin_id` - identifier of this bin
    /// * `secret_key` - shared secret sent with each claim
    pub fn new(url: String, bin_id: String, secret_key: String) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url,
            bin_id,
            secret_key,
            http_client,
        })
    }
}

#[async_trait]
impl ClaimRegistrar for HttpRegistrar {
    async fn register(&self, tallies: Tallies) -> Result<String> {
        let payload = ClaimPayload {
            plastic_count: tallies.plastic_count,
            can_count: tallies.can_count,
            bin_id: &self.bin_id,
            secret_key: &self.secret_key,
        };

        tracing::debug!(
            url = %self.url,
            plastic_count = tallies.plastic_count,
            can_count = tallies.can_count,
            "Registrar: submitting claim"
        );

        let response = self
            .http_client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Registrar: HTTP request failed");
                Error::Registrar(format!("HTTP request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Registrar: Unexpected response");
            return Err(Error::Registrar(format!("backend returned {}", status)));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Registrar: Failed to parse response");
            Error::Registrar(format!("Failed to parse response: {}", e))
        })?;

        let token = body["qrUrl"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(String::from)
            .ok_or_else(|| {
                tracing::error!(body = %body, "Registrar: Response missing qrUrl");
                Error::Registrar("response missing qrUrl".to_string())
            })?;

        tracing::info!("Registrar: claim accepted");
        Ok(token)
    }
}
