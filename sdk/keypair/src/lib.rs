use std::fmt;
use std::path::Path;
use std::str::FromStr;

use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier, VerifyingKey};
use hkdf::Hkdf;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

const PASSKEY_WALLET_INFO: &[u8] = b"hongbao-passkey-wallet-v1";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("private key must be 0x followed by 64 hex characters")]
    InvalidPrivateKey,
    #[error("key material must be 32 raw bytes or a 0x-prefixed hex key, got {0} bytes")]
    InvalidKeyMaterial(usize),
    #[error("invalid base58 address")]
    InvalidAddress,
    #[error("credential id is empty")]
    EmptyCredential,
    #[error("keypair file: {0}")]
    KeypairFile(String),
}

/// 32-byte ed25519 seed. Zeroized on drop, never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey([u8; 32]);

impl PrivateKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// `0x` + 64 lowercase hex characters
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Accept decrypted key material: either the raw 32 bytes or the
    /// 66-character `0x` hex form.
    pub fn from_key_material(material: &[u8]) -> Result<Self, KeyError> {
        if material.len() == 32 {
            let mut bytes = [0u8; 32];
            bytes.copy_from_slice(material);
            return Ok(Self(bytes));
        }
        if material.len() == 66 {
            if let Ok(s) = std::str::from_utf8(material) {
                return s.parse();
            }
        }
        Err(KeyError::InvalidKeyMaterial(material.len()))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

impl FromStr for PrivateKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex_part = s.strip_prefix("0x").ok_or(KeyError::InvalidPrivateKey)?;
        if hex_part.len() != 64 {
            return Err(KeyError::InvalidPrivateKey);
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(hex_part, &mut bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self(bytes))
    }
}

/// Account address: ed25519 public key, shown in base58.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(pub [u8; 32]);

impl Address {
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Check an ed25519 signature made by this address
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> bool {
        let Ok(vk) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        vk.verify(message, &Signature::from_bytes(signature)).is_ok()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = bs58::decode(s.trim())
            .into_vec()
            .map_err(|_| KeyError::InvalidAddress)?;
        let bytes: [u8; 32] = raw.try_into().map_err(|_| KeyError::InvalidAddress)?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Address {
    type Error = KeyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Address> for String {
    fn from(a: Address) -> Self {
        a.to_string()
    }
}

/// Anything that can authorize a transfer out of an account.
pub trait Signer: Send + Sync {
    fn address(&self) -> Address;
    fn sign(&self, message: &[u8]) -> [u8; 64];
}

/// A wallet holding one ed25519 signing key.
/// NEVER expose this struct's internals.
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generates a fresh random keypair.
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        let keypair = Self {
            signing_key: SigningKey::from_bytes(&seed),
        };
        seed.zeroize();
        keypair
    }

    pub fn from_private_key(key: &PrivateKey) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(key.as_bytes()),
        }
    }

    /// Deterministic wallet for a platform credential. The same credential id
    /// always yields the same address.
    pub fn from_credential_id(raw_id: &[u8]) -> Result<Self, KeyError> {
        if raw_id.is_empty() {
            return Err(KeyError::EmptyCredential);
        }
        let ikm = hex::encode(raw_id);
        let hk = Hkdf::<Sha256>::new(None, ikm.as_bytes());
        let mut seed = [0u8; 32];
        hk.expand(PASSKEY_WALLET_INFO, &mut seed)
            .expect("HKDF expansion failed");
        let keypair = Self {
            signing_key: SigningKey::from_bytes(&seed),
        };
        seed.zeroize();
        Ok(keypair)
    }

    pub fn private_key(&self) -> PrivateKey {
        PrivateKey(self.signing_key.to_bytes())
    }

    /// Returns the public address.
    pub fn address(&self) -> Address {
        Address(self.signing_key.verifying_key().to_bytes())
    }

    /// Load a keypair file: a JSON array of 64 bytes (seed followed by public key).
    pub fn read_file(path: impl AsRef<Path>) -> Result<Self, KeyError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| KeyError::KeypairFile(format!("{}: {e}", path.display())))?;
        let bytes: Vec<u8> = serde_json::from_str(&content)
            .map_err(|e| KeyError::KeypairFile(format!("{}: {e}", path.display())))?;
        if bytes.len() != 64 {
            return Err(KeyError::KeypairFile(format!(
                "{}: expected 64 bytes, got {}",
                path.display(),
                bytes.len()
            )));
        }

        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes[..32]);
        let keypair = Self {
            signing_key: SigningKey::from_bytes(&seed),
        };
        seed.zeroize();

        if keypair.address().0[..] != bytes[32..] {
            return Err(KeyError::KeypairFile(format!(
                "{}: public key does not match seed",
                path.display()
            )));
        }
        Ok(keypair)
    }

    /// Solana keypair file contents: JSON array of seed || public key
    pub fn to_json(&self) -> Result<String, KeyError> {
        let bytes = self.signing_key.to_keypair_bytes().to_vec();
        serde_json::to_string(&bytes).map_err(|e| KeyError::KeypairFile(e.to_string()))
    }

    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<(), KeyError> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)
            .map_err(|e| KeyError::KeypairFile(format!("{}: {e}", path.display())))
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

impl Signer for Keypair {
    fn address(&self) -> Address {
        Keypair::address(self)
    }

    fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}
