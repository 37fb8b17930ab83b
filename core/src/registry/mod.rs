//! Key-release registry
//!
//! The registry binds an identity to a release timestamp, publishes the eon
//! key to encrypt under, and releases the identity's decryption key once the
//! timestamp has passed.
//!
//! ```text
//!   POST /register_identity        {decryptionTimestamp, identityPrefix} -> identity
//!   GET  /get_data_for_encryption  ?identityPrefix=..                   -> {eon_key, identity}
//!   GET  /get_decryption_key       ?identity=..                         -> {decryption_key}
//!   POST /decrypt/with_time        {encrypted_msg, timestamp}            -> plaintext (legacy)
//! ```

pub mod client;
pub mod local;
pub mod server;
pub mod types;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use hongbao_threshold::{DecryptionKey, EonKey, Identity};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use client::{RegistryClientConfig, ShutterRegistryClient};
pub use local::{KeyRelease, LocalRegistry, RegisterRejection};
pub use server::{RegistryState, create_router, serve};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("identity registration rejected: {0}")]
    Registration(String),

    #[error("encryption parameters unavailable: {0}")]
    ParamsUnavailable(String),

    #[error("decryption key not yet released")]
    NotYetReleased,

    #[error("registry rejected the request: {0}")]
    InvalidRequest(String),

    #[error("registry request failed: {0}")]
    Network(String),

    #[error("invalid registry response: {0}")]
    InvalidResponse(String),
}

/// Random 32 bytes the sender contributes to an identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdentityPrefix([u8; 32]);

impl IdentityPrefix {
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for IdentityPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for IdentityPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityPrefix({self})")
    }
}

impl FromStr for IdentityPrefix {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|_| "identity prefix must be 32 hex-encoded bytes".to_string())?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for IdentityPrefix {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IdentityPrefix> for String {
    fn from(p: IdentityPrefix) -> Self {
        p.to_string()
    }
}

/// What a sender needs to encrypt for an identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionParams {
    pub eon_key: EonKey,
    pub identity: Identity,
}

#[async_trait]
pub trait KeyRegistry: Send + Sync {
    /// Bind `prefix` to `release_timestamp`. Registering the same pair again
    /// returns the same identity.
    async fn register_identity(
        &self,
        release_timestamp: u64,
        prefix: &IdentityPrefix,
    ) -> Result<Identity, RegistryError>;

    async fn encryption_params(
        &self,
        prefix: &IdentityPrefix,
    ) -> Result<EncryptionParams, RegistryError>;

    /// [`RegistryError::NotYetReleased`] until the release timestamp has passed.
    async fn decryption_key(&self, identity: &Identity) -> Result<DecryptionKey, RegistryError>;

    /// Server-side time-lock decryption for links that carry no identity.
    async fn decrypt_with_time(
        &self,
        ciphertext: &str,
        release_timestamp: u64,
    ) -> Result<String, RegistryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_hex() {
        let prefix = IdentityPrefix::from_bytes([0xab; 32]);
        let s = prefix.to_string();
        assert!(s.starts_with("0xabab"));
        assert_eq!(s.parse::<IdentityPrefix>().unwrap(), prefix);
        assert!("0x1234".parse::<IdentityPrefix>().is_err());
    }

    #[test]
    fn test_random_prefixes_differ() {
        assert_ne!(IdentityPrefix::random(), IdentityPrefix::random());
    }
}
