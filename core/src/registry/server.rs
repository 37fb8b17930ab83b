//! Dev registry server
//!
//! Serves a [`LocalRegistry`] over the same HTTP API the client speaks.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Json, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use hongbao_threshold::Identity;
use log::{info, warn};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use super::local::{KeyRelease, LocalRegistry, RegisterRejection};
use super::types::*;
use super::{IdentityPrefix, KeyRegistry, RegistryError};

// ============================================================================
// Shared State
// ============================================================================

#[derive(Clone)]
pub struct RegistryState {
    pub registry: Arc<LocalRegistry>,
    pub start_time: std::time::Instant,
}

impl RegistryState {
    pub fn new(registry: Arc<LocalRegistry>) -> Self {
        Self {
            registry,
            start_time: std::time::Instant::now(),
        }
    }
}

fn reject(status: StatusCode, body: ErrorResponse) -> Response {
    (status, Json(body)).into_response()
}

fn parse_prefix(raw: &str) -> Result<IdentityPrefix, Response> {
    raw.parse()
        .map_err(|e: String| reject(StatusCode::BAD_REQUEST, ErrorResponse::bad_request(e)))
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health(State(state): State<RegistryState>) -> impl IntoResponse {
    Json(HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        eon_key: state.registry.eon_key(),
    })
}

pub async fn register_identity(
    State(state): State<RegistryState>,
    Json(req): Json<RegisterIdentityRequest>,
) -> Response {
    let prefix = match parse_prefix(&req.identity_prefix) {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    match state.registry.register(req.decryption_timestamp, &prefix).await {
        Ok(identity) => Json(Wrapped::message(RegisterIdentityResponse {
            identity,
            eon_key: Some(state.registry.eon_key()),
        }))
        .into_response(),
        Err(RegisterRejection::Conflict { existing }) => reject(
            StatusCode::CONFLICT,
            ErrorResponse::conflict(format!("prefix already registered for {existing}")),
        ),
        Err(RegisterRejection::InPast {
            release_timestamp,
            now,
        }) => reject(
            StatusCode::BAD_REQUEST,
            ErrorResponse::bad_request(format!(
                "decryption timestamp {release_timestamp} is not after {now}"
            )),
        ),
    }
}

pub async fn get_data_for_encryption(
    State(state): State<RegistryState>,
    Query(query): Query<EncryptionDataQuery>,
) -> Response {
    let prefix = match parse_prefix(&query.identity_prefix) {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    match state.registry.encryption_params(&prefix).await {
        Ok(params) => Json(Wrapped::message(EncryptionDataResponse {
            eon_key: params.eon_key,
            identity: params.identity,
            identity_prefix: Some(prefix.to_string()),
        }))
        .into_response(),
        Err(e) => reject(StatusCode::NOT_FOUND, ErrorResponse::not_found(e.to_string())),
    }
}

pub async fn get_decryption_key(
    State(state): State<RegistryState>,
    Query(query): Query<DecryptionKeyQuery>,
) -> Response {
    let identity: Identity = match query.identity.parse() {
        Ok(id) => id,
        Err(e) => {
            return reject(
                StatusCode::BAD_REQUEST,
                ErrorResponse::bad_request(format!("identity: {e}")),
            );
        }
    };

    match state.registry.release_state(&identity).await {
        Ok(KeyRelease::Released {
            key,
            release_timestamp,
        }) => Json(Wrapped::message(DecryptionKeyResponse {
            decryption_key: key.to_hex(),
            identity: Some(identity),
            decryption_timestamp: Some(release_timestamp),
        }))
        .into_response(),
        Ok(KeyRelease::Pending { release_timestamp }) => reject(
            StatusCode::FORBIDDEN,
            ErrorResponse::not_released(format!("released at {release_timestamp}")),
        ),
        Ok(KeyRelease::Unknown) => reject(
            StatusCode::NOT_FOUND,
            ErrorResponse::not_found("identity is not registered"),
        ),
        Err(e) => {
            warn!("Failed to assemble decryption key for {}: {}", identity, e);
            reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new(e.to_string(), "INTERNAL_ERROR"),
            )
        }
    }
}

pub async fn encrypt_with_time(
    State(state): State<RegistryState>,
    Json(req): Json<EncryptWithTimeRequest>,
) -> Response {
    match state.registry.encrypt_with_time(&req.cypher_text, req.timestamp) {
        Ok(ct) => Json(Wrapped::message(ct)).into_response(),
        Err(e) => reject(StatusCode::BAD_REQUEST, ErrorResponse::bad_request(e.to_string())),
    }
}

pub async fn decrypt_with_time(
    State(state): State<RegistryState>,
    Json(req): Json<DecryptWithTimeRequest>,
) -> Response {
    match state
        .registry
        .decrypt_with_time(&req.encrypted_msg, req.timestamp)
        .await
    {
        Ok(plaintext) => Json(Wrapped::message(plaintext)).into_response(),
        Err(RegistryError::NotYetReleased) => reject(
            StatusCode::FORBIDDEN,
            ErrorResponse::not_released(format!("released at {}", req.timestamp)),
        ),
        Err(e) => reject(StatusCode::BAD_REQUEST, ErrorResponse::bad_request(e.to_string())),
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn create_router(state: RegistryState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Identity-based release
        .route("/register_identity", post(register_identity))
        .route("/get_data_for_encryption", get(get_data_for_encryption))
        .route("/get_decryption_key", get(get_decryption_key))
        // Legacy time-lock
        .route("/encrypt/with_time", post(encrypt_with_time))
        .route("/decrypt/with_time", post(decrypt_with_time))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve `registry` on `listener` until the task is dropped
pub async fn serve(listener: TcpListener, registry: Arc<LocalRegistry>) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!("Registry listening on http://{}", addr);
    axum::serve(listener, create_router(RegistryState::new(registry))).await
}
