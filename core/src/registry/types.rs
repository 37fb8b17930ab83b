//! Registry API Types
//!
//! Request/response shapes shared by the HTTP client and the dev server.
//! Successful responses are wrapped as `{"message": ...}`; the client also
//! accepts them bare.

use hongbao_threshold::{EonKey, Identity};
use serde::{Deserialize, Serialize};

// ============================================================================
// Identity registration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterIdentityRequest {
    pub decryption_timestamp: u64,
    pub identity_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterIdentityResponse {
    pub identity: Identity,
    #[serde(default)]
    pub eon_key: Option<EonKey>,
}

// ============================================================================
// Encryption parameters
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionDataQuery {
    #[serde(rename = "identityPrefix")]
    pub identity_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionDataResponse {
    pub eon_key: EonKey,
    pub identity: Identity,
    #[serde(default)]
    pub identity_prefix: Option<String>,
}

// ============================================================================
// Decryption key
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptionKeyQuery {
    pub identity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptionKeyResponse {
    /// Empty until released on some deployments
    #[serde(default)]
    pub decryption_key: String,
    #[serde(default)]
    pub identity: Option<Identity>,
    #[serde(default)]
    pub decryption_timestamp: Option<u64>,
}

// ============================================================================
// Legacy time-lock endpoints
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptWithTimeRequest {
    pub cypher_text: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptWithTimeRequest {
    pub encrypted_msg: String,
    pub timestamp: u64,
}

// ============================================================================
// Envelope & misc
// ============================================================================

/// Response body, either `{"message": T}` or bare `T`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Wrapped<T> {
    Message { message: T },
    Bare(T),
}

impl<T> Wrapped<T> {
    pub fn message(inner: T) -> Self {
        Wrapped::Message { message: inner }
    }

    pub fn into_inner(self) -> T {
        match self {
            Wrapped::Message { message } => message,
            Wrapped::Bare(inner) => inner,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: String,
    pub uptime_secs: u64,
    pub eon_key: EonKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(msg, "BAD_REQUEST")
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(msg, "NOT_FOUND")
    }

    pub fn not_released(msg: impl Into<String>) -> Self {
        Self::new(msg, "NOT_YET_RELEASED")
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(msg, "CONFLICT")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_accepts_both_forms() {
        let wrapped: Wrapped<String> = serde_json::from_str(r#"{"message":"0x03ab"}"#).unwrap();
        assert_eq!(wrapped.into_inner(), "0x03ab");

        let bare: Wrapped<String> = serde_json::from_str(r#""0x03ab""#).unwrap();
        assert_eq!(bare.into_inner(), "0x03ab");
    }

    #[test]
    fn test_register_request_camel_case() {
        let req = RegisterIdentityRequest {
            decryption_timestamp: 10,
            identity_prefix: "0x00".into(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["decryptionTimestamp"], 10);
        assert_eq!(json["identityPrefix"], "0x00");
    }

    #[test]
    fn test_decryption_key_defaults() {
        let resp: DecryptionKeyResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.decryption_key.is_empty());
        assert!(resp.identity.is_none());
    }
}
