//! Public scheme parameters: identities, eon keys, decryption keys.

use std::fmt;
use std::str::FromStr;

use ark_bls12_381::{G1Affine, G2Affine};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use serde::{Deserialize, Serialize};

use crate::error::ThresholdError;

pub(crate) fn decode_hex(s: &str) -> Result<Vec<u8>, ThresholdError> {
    let s = s.trim();
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    hex::decode(s).map_err(|_| ThresholdError::InvalidHex)
}

pub(crate) fn compress<T: CanonicalSerialize>(value: &T) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.compressed_size());
    value
        .serialize_compressed(&mut out)
        .expect("serializing into a Vec cannot fail");
    out
}

/// Registry handle a ciphertext is bound to.
///
/// Opaque bytes chosen by the registry, shown as `0x`-prefixed hex.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(Vec<u8>);

impl Identity {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ThresholdError> {
        if bytes.is_empty() {
            return Err(ThresholdError::EmptyIdentity);
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.to_hex())
    }
}

impl FromStr for Identity {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(decode_hex(s)?)
    }
}

impl TryFrom<String> for Identity {
    type Error = ThresholdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Identity> for String {
    fn from(id: Identity) -> Self {
        id.to_hex()
    }
}

/// Eon public key: `x·g2` for the committee's eon secret `x`.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EonKey(pub(crate) G2Affine);

impl EonKey {
    pub const LEN: usize = 96;

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ThresholdError> {
        if bytes.len() != Self::LEN {
            return Err(ThresholdError::InvalidPoint("eon key"));
        }
        G2Affine::deserialize_compressed(bytes)
            .map(Self)
            .map_err(|_| ThresholdError::InvalidPoint("eon key"))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        compress(&self.0)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    pub fn point(&self) -> &G2Affine {
        &self.0
    }
}

impl fmt::Display for EonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for EonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EonKey({})", self.to_hex())
    }
}

impl FromStr for EonKey {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(&decode_hex(s)?)
    }
}

impl TryFrom<String> for EonKey {
    type Error = ThresholdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<EonKey> for String {
    fn from(key: EonKey) -> Self {
        key.to_hex()
    }
}

/// Identity decryption key: `x·H1(id)`, released by the keypers.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DecryptionKey(pub(crate) G1Affine);

impl DecryptionKey {
    pub const LEN: usize = 48;

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ThresholdError> {
        if bytes.len() != Self::LEN {
            return Err(ThresholdError::InvalidPoint("decryption key"));
        }
        G1Affine::deserialize_compressed(bytes)
            .map(Self)
            .map_err(|_| ThresholdError::InvalidPoint("decryption key"))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        compress(&self.0)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    pub fn point(&self) -> &G1Affine {
        &self.0
    }
}

impl fmt::Display for DecryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for DecryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DecryptionKey({})", self.to_hex())
    }
}

impl FromStr for DecryptionKey {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(&decode_hex(s)?)
    }
}

impl TryFrom<String> for DecryptionKey {
    type Error = ThresholdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DecryptionKey> for String {
    fn from(key: DecryptionKey) -> Self {
        key.to_hex()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ec::AffineRepr;

    #[test]
    fn test_identity_hex() {
        let id: Identity = "0xdeadbeef".parse().unwrap();
        assert_eq!(id.as_bytes(), &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(id.to_string(), "0xdeadbeef");

        let bare: Identity = "deadbeef".parse().unwrap();
        assert_eq!(bare, id);
    }

    #[test]
    fn test_identity_rejects_empty_and_bad_hex() {
        assert_eq!("0x".parse::<Identity>(), Err(ThresholdError::EmptyIdentity));
        assert_eq!("0xzz".parse::<Identity>(), Err(ThresholdError::InvalidHex));
    }

    #[test]
    fn test_eon_key_hex() {
        let key = EonKey(G2Affine::generator());
        let hex = key.to_hex();
        assert_eq!(hex.len(), 2 + 2 * EonKey::LEN);
        let parsed: EonKey = hex.parse().unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_points_reject_garbage() {
        assert!(EonKey::from_bytes(&[0u8; 10]).is_err());
        assert!(DecryptionKey::from_bytes(&[0xffu8; 48]).is_err());
    }
}
