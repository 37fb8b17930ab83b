use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const IV_LEN: usize = 12;
pub const SALT_LEN: usize = 16;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Tag mismatch: wrong password or corrupted ciphertext
    #[error("wrong password or corrupted envelope")]
    WrongPassword,
    #[error("malformed envelope: {0}")]
    Malformed(&'static str),
    #[error("decrypted payload is not valid UTF-8")]
    InvalidUtf8,
}

/// Password-wrapped ciphertext bundle.
///
/// All fields are standard base64. `salt` is absent on envelopes produced
/// before per-envelope salts were introduced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub encrypted: String,
    pub iv: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

impl Envelope {
    pub(crate) fn from_parts(ciphertext: &[u8], iv: &[u8; IV_LEN], salt: &[u8; SALT_LEN]) -> Self {
        Self {
            encrypted: STANDARD.encode(ciphertext),
            iv: STANDARD.encode(iv),
            salt: Some(STANDARD.encode(salt)),
        }
    }

    pub(crate) fn ciphertext_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        STANDARD
            .decode(&self.encrypted)
            .map_err(|_| EnvelopeError::Malformed("encrypted is not base64"))
    }

    pub(crate) fn iv_bytes(&self) -> Result<[u8; IV_LEN], EnvelopeError> {
        let raw = STANDARD
            .decode(&self.iv)
            .map_err(|_| EnvelopeError::Malformed("iv is not base64"))?;
        raw.try_into()
            .map_err(|_| EnvelopeError::Malformed("iv must be 12 bytes"))
    }

    pub(crate) fn salt_bytes(&self) -> Result<Option<Vec<u8>>, EnvelopeError> {
        let Some(salt) = &self.salt else {
            return Ok(None);
        };
        let raw = STANDARD
            .decode(salt)
            .map_err(|_| EnvelopeError::Malformed("salt is not base64"))?;
        if raw.is_empty() {
            return Err(EnvelopeError::Malformed("salt is empty"));
        }
        Ok(Some(raw))
    }

    /// JSON form embedded in links
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("envelope serialization failed")
    }

    pub fn from_json(s: &str) -> Result<Self, EnvelopeError> {
        serde_json::from_str(s).map_err(|_| EnvelopeError::Malformed("not an envelope object"))
    }
}
