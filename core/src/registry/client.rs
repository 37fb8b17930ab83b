//! Shutter-style registry client
//!
//! HTTP client for a remote key-release registry. Implements [`KeyRegistry`]
//! so the packet lifecycle can run against a deployed keyper network.
//!
//! ```text
//!   PacketLifecycle ──▶ ShutterRegistryClient ──HTTP──▶ registry
//!                                           └──HTTP──▶ legacy time-lock service
//! ```

use std::time::Duration;

use async_trait::async_trait;
use hongbao_threshold::{DecryptionKey, Identity};
use log::{debug, warn};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use super::types::{
    DecryptWithTimeRequest, DecryptionKeyResponse, EncryptionDataResponse, HealthResponse,
    RegisterIdentityRequest, RegisterIdentityResponse, Wrapped,
};
use super::{EncryptionParams, IdentityPrefix, KeyRegistry, RegistryError};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct RegistryClientConfig {
    /// Base URL of the registry (e.g., "http://127.0.0.1:8787")
    pub url: String,
    /// Base URL of the legacy time-lock service; defaults to `url`
    pub legacy_url: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for RegistryClientConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8787".to_string(),
            legacy_url: None,
            timeout: Duration::from_secs(10),
        }
    }
}

// ============================================================================
// Client
// ============================================================================

pub struct ShutterRegistryClient {
    config: RegistryClientConfig,
    client: reqwest::Client,
}

fn transport(e: reqwest::Error) -> RegistryError {
    RegistryError::Network(e.to_string())
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, RegistryError> {
    let wrapped: Wrapped<T> = response
        .json()
        .await
        .map_err(|e| RegistryError::InvalidResponse(e.to_string()))?;
    Ok(wrapped.into_inner())
}

/// Statuses that may clear up if the same request is sent again later
fn is_transient(status: StatusCode) -> bool {
    // 408 Request Timeout, 425 Too Early, 429 Too Many Requests
    status.is_server_error() || matches!(status.as_u16(), 408 | 425 | 429)
}

/// Split off non-2xx responses. Transient statuses are network failures.
async fn check(response: Response) -> Result<Response, (StatusCode, RegistryError)> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let msg = format!("{status}: {body}");
    let err = if is_transient(status) {
        RegistryError::Network(msg)
    } else {
        RegistryError::InvalidRequest(msg)
    };
    Err((status, err))
}

impl ShutterRegistryClient {
    pub fn new(config: RegistryClientConfig) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(transport)?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &RegistryClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.url.trim_end_matches('/'), path)
    }

    fn legacy_url(&self, path: &str) -> String {
        let base = self.config.legacy_url.as_deref().unwrap_or(&self.config.url);
        format!("{}{}", base.trim_end_matches('/'), path)
    }

    /// Check if the registry is reachable and healthy
    pub async fn health_check(&self) -> Result<HealthResponse, RegistryError> {
        let response = self
            .client
            .get(self.url("/health"))
            .send()
            .await
            .map_err(transport)?;
        let response = check(response).await.map_err(|(_, e)| e)?;
        parse(response).await
    }
}

#[async_trait]
impl KeyRegistry for ShutterRegistryClient {
    async fn register_identity(
        &self,
        release_timestamp: u64,
        prefix: &IdentityPrefix,
    ) -> Result<Identity, RegistryError> {
        let request = RegisterIdentityRequest {
            decryption_timestamp: release_timestamp,
            identity_prefix: prefix.to_string(),
        };
        debug!("Registering {} for release at {}", prefix, release_timestamp);

        let response = self
            .client
            .post(self.url("/register_identity"))
            .json(&request)
            .send()
            .await
            .map_err(transport)?;

        let response = check(response).await.map_err(|(status, e)| match e {
            RegistryError::InvalidRequest(msg) => {
                warn!("Identity registration rejected ({})", status);
                RegistryError::Registration(msg)
            }
            other => other,
        })?;
        let body: RegisterIdentityResponse = parse(response).await?;
        Ok(body.identity)
    }

    async fn encryption_params(
        &self,
        prefix: &IdentityPrefix,
    ) -> Result<EncryptionParams, RegistryError> {
        let response = self
            .client
            .get(self.url("/get_data_for_encryption"))
            .query(&[("identityPrefix", prefix.to_string())])
            .send()
            .await
            .map_err(transport)?;

        let response = check(response).await.map_err(|(status, e)| match status {
            StatusCode::NOT_FOUND => RegistryError::ParamsUnavailable(e.to_string()),
            _ => e,
        })?;
        let body: EncryptionDataResponse = parse(response).await?;
        Ok(EncryptionParams {
            eon_key: body.eon_key,
            identity: body.identity,
        })
    }

    async fn decryption_key(&self, identity: &Identity) -> Result<DecryptionKey, RegistryError> {
        let response = self
            .client
            .get(self.url("/get_decryption_key"))
            .query(&[("identity", identity.to_string())])
            .send()
            .await
            .map_err(transport)?;

        let response = check(response).await.map_err(|(status, e)| match status {
            StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => RegistryError::NotYetReleased,
            _ => e,
        })?;
        let body: DecryptionKeyResponse = parse(response).await?;
        if body.decryption_key.is_empty() {
            return Err(RegistryError::NotYetReleased);
        }
        body.decryption_key
            .parse()
            .map_err(|e| RegistryError::InvalidResponse(format!("decryption key: {e}")))
    }

    async fn decrypt_with_time(
        &self,
        ciphertext: &str,
        release_timestamp: u64,
    ) -> Result<String, RegistryError> {
        let request = DecryptWithTimeRequest {
            encrypted_msg: ciphertext.to_string(),
            timestamp: release_timestamp,
        };
        let response = self
            .client
            .post(self.legacy_url("/decrypt/with_time"))
            .json(&request)
            .send()
            .await
            .map_err(transport)?;

        let response = check(response).await.map_err(|(status, e)| match status {
            StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => RegistryError::NotYetReleased,
            _ => e,
        })?;
        parse(response).await
    }
}
