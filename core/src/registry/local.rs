//! In-process key-release registry
//!
//! Runs a whole keyper committee locally and releases decryption keys by the
//! clock. Backs the dev HTTP server and the lifecycle tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use hongbao_threshold::{
    DecryptionKey, EonKey, Identity, KeyperConfig, KeyperSet, ThresholdCiphertext,
    ThresholdError, decrypt, encrypt_message,
};
use log::{debug, info};
use tokio::sync::Mutex;

use super::{EncryptionParams, IdentityPrefix, KeyRegistry, RegistryError};
use crate::clock::Clock;

const IDENTITY_CONTEXT: &str = "hongbao-identity-v1";
const LEGACY_IDENTITY_CONTEXT: &str = "hongbao-legacy-timelock-v1";

/// Why a registration was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterRejection {
    /// Release timestamp is not in the future
    InPast { release_timestamp: u64, now: u64 },
    /// Prefix already bound to another timestamp
    Conflict { existing: u64 },
}

impl RegisterRejection {
    fn describe(&self) -> String {
        match self {
            RegisterRejection::InPast {
                release_timestamp,
                now,
            } => format!("release timestamp {release_timestamp} is not after now ({now})"),
            RegisterRejection::Conflict { existing } => {
                format!("identity prefix already registered for {existing}")
            }
        }
    }
}

/// Release status of an identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRelease {
    Unknown,
    Pending { release_timestamp: u64 },
    Released {
        key: DecryptionKey,
        release_timestamp: u64,
    },
}

#[derive(Debug, Clone)]
struct Registration {
    release_timestamp: u64,
    identity: Identity,
}

#[derive(Default)]
struct Registrations {
    by_prefix: HashMap<IdentityPrefix, Registration>,
    by_identity: HashMap<Identity, u64>,
}

pub struct LocalRegistry {
    keypers: KeyperSet,
    clock: Arc<dyn Clock>,
    registrations: Mutex<Registrations>,
}

fn derive_identity(prefix: &IdentityPrefix, release_timestamp: u64) -> Identity {
    let mut hasher = blake3::Hasher::new_derive_key(IDENTITY_CONTEXT);
    hasher.update(prefix.as_bytes());
    hasher.update(&release_timestamp.to_be_bytes());
    identity_from_hash(hasher.finalize())
}

fn legacy_identity(release_timestamp: u64) -> Identity {
    let mut hasher = blake3::Hasher::new_derive_key(LEGACY_IDENTITY_CONTEXT);
    hasher.update(&release_timestamp.to_be_bytes());
    identity_from_hash(hasher.finalize())
}

fn identity_from_hash(hash: blake3::Hash) -> Identity {
    Identity::from_bytes(hash.as_bytes().to_vec()).expect("32-byte identity is not empty")
}

impl LocalRegistry {
    pub fn new(keypers: KeyperSet, clock: Arc<dyn Clock>) -> Self {
        info!(
            "Local registry: {}-of-{} keypers, eon key {}",
            keypers.config().threshold,
            keypers.config().total_keypers,
            keypers.eon_key()
        );
        Self {
            keypers,
            clock,
            registrations: Mutex::new(Registrations::default()),
        }
    }

    /// Deal a fresh committee
    pub fn generate(config: KeyperConfig, clock: Arc<dyn Clock>) -> Result<Self, ThresholdError> {
        Ok(Self::new(KeyperSet::generate(config)?, clock))
    }

    pub fn eon_key(&self) -> EonKey {
        self.keypers.eon_key()
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub async fn register(
        &self,
        release_timestamp: u64,
        prefix: &IdentityPrefix,
    ) -> Result<Identity, RegisterRejection> {
        let mut regs = self.registrations.lock().await;

        if let Some(existing) = regs.by_prefix.get(prefix) {
            if existing.release_timestamp != release_timestamp {
                return Err(RegisterRejection::Conflict {
                    existing: existing.release_timestamp,
                });
            }
            return Ok(existing.identity.clone());
        }

        let now = self.clock.now();
        if release_timestamp <= now {
            return Err(RegisterRejection::InPast {
                release_timestamp,
                now,
            });
        }

        let identity = derive_identity(prefix, release_timestamp);
        regs.by_identity.insert(identity.clone(), release_timestamp);
        regs.by_prefix.insert(
            *prefix,
            Registration {
                release_timestamp,
                identity: identity.clone(),
            },
        );
        debug!("Registered {} for release at {}", identity, release_timestamp);
        Ok(identity)
    }

    pub async fn release_state(&self, identity: &Identity) -> Result<KeyRelease, ThresholdError> {
        let release_timestamp = {
            let regs = self.registrations.lock().await;
            match regs.by_identity.get(identity) {
                Some(ts) => *ts,
                None => return Ok(KeyRelease::Unknown),
            }
        };

        if self.clock.now() < release_timestamp {
            return Ok(KeyRelease::Pending { release_timestamp });
        }
        let key = self.keypers.decryption_key(identity)?;
        Ok(KeyRelease::Released {
            key,
            release_timestamp,
        })
    }

    /// Legacy server-side time-lock: encrypt `plaintext` so that only
    /// [`KeyRegistry::decrypt_with_time`] after `release_timestamp` opens it.
    pub fn encrypt_with_time(
        &self,
        plaintext: &str,
        release_timestamp: u64,
    ) -> Result<String, RegistryError> {
        let identity = legacy_identity(release_timestamp);
        let ct = encrypt_message(plaintext.as_bytes(), &identity, &self.eon_key(), None)
            .map_err(|e| RegistryError::InvalidRequest(e.to_string()))?;
        Ok(ct.to_hex())
    }
}

#[async_trait]
impl KeyRegistry for LocalRegistry {
    async fn register_identity(
        &self,
        release_timestamp: u64,
        prefix: &IdentityPrefix,
    ) -> Result<Identity, RegistryError> {
        self.register(release_timestamp, prefix)
            .await
            .map_err(|r| RegistryError::Registration(r.describe()))
    }

    async fn encryption_params(
        &self,
        prefix: &IdentityPrefix,
    ) -> Result<EncryptionParams, RegistryError> {
        let regs = self.registrations.lock().await;
        let reg = regs
            .by_prefix
            .get(prefix)
            .ok_or_else(|| RegistryError::ParamsUnavailable(format!("unknown prefix {prefix}")))?;
        Ok(EncryptionParams {
            eon_key: self.eon_key(),
            identity: reg.identity.clone(),
        })
    }

    async fn decryption_key(&self, identity: &Identity) -> Result<DecryptionKey, RegistryError> {
        match self.release_state(identity).await {
            Ok(KeyRelease::Released { key, .. }) => Ok(key),
            Ok(_) => Err(RegistryError::NotYetReleased),
            Err(e) => Err(RegistryError::InvalidRequest(e.to_string())),
        }
    }

    async fn decrypt_with_time(
        &self,
        ciphertext: &str,
        release_timestamp: u64,
    ) -> Result<String, RegistryError> {
        if self.clock.now() < release_timestamp {
            return Err(RegistryError::NotYetReleased);
        }
        let ct: ThresholdCiphertext = ciphertext
            .parse()
            .map_err(|e: ThresholdError| RegistryError::InvalidRequest(e.to_string()))?;
        let identity = legacy_identity(release_timestamp);
        let key = self
            .keypers
            .decryption_key(&identity)
            .map_err(|e| RegistryError::InvalidRequest(e.to_string()))?;
        let plaintext = decrypt(&ct, &key)
            .map_err(|e| RegistryError::InvalidRequest(e.to_string()))?;
        String::from_utf8(plaintext)
            .map_err(|_| RegistryError::InvalidRequest("plaintext is not UTF-8".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use hongbao_threshold::verify_decryption_key;

    const NOW: u64 = 1_767_225_600;

    fn registry() -> (LocalRegistry, ManualClock) {
        let clock = ManualClock::new(NOW);
        let reg = LocalRegistry::generate(KeyperConfig::new(2, 3), Arc::new(clock.clone())).unwrap();
        (reg, clock)
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let (reg, _) = registry();
        let prefix = IdentityPrefix::random();

        let a = reg.register_identity(NOW + 60, &prefix).await.unwrap();
        let b = reg.register_identity(NOW + 60, &prefix).await.unwrap();
        assert_eq!(a, b);

        let params = reg.encryption_params(&prefix).await.unwrap();
        assert_eq!(params.identity, a);
        assert_eq!(params.eon_key, reg.eon_key());
    }

    #[tokio::test]
    async fn test_register_conflict_and_past() {
        let (reg, _) = registry();
        let prefix = IdentityPrefix::random();
        reg.register(NOW + 60, &prefix).await.unwrap();

        assert_eq!(
            reg.register(NOW + 61, &prefix).await,
            Err(RegisterRejection::Conflict { existing: NOW + 60 })
        );
        assert!(matches!(
            reg.register(NOW, &IdentityPrefix::random()).await,
            Err(RegisterRejection::InPast { .. })
        ));
    }

    #[tokio::test]
    async fn test_key_released_by_clock() {
        let (reg, clock) = registry();
        let prefix = IdentityPrefix::random();
        let id = reg.register_identity(NOW + 60, &prefix).await.unwrap();

        assert_eq!(
            reg.decryption_key(&id).await,
            Err(RegistryError::NotYetReleased)
        );

        clock.advance(60);
        let key = reg.decryption_key(&id).await.unwrap();
        assert!(verify_decryption_key(&reg.eon_key(), &id, &key).unwrap());

        // stable across calls
        assert_eq!(reg.decryption_key(&id).await.unwrap(), key);
    }

    #[tokio::test]
    async fn test_unknown_identity() {
        let (reg, _) = registry();
        let id: Identity = "0x0badc0de".parse().unwrap();
        assert_eq!(reg.release_state(&id).await.unwrap(), KeyRelease::Unknown);
        assert!(matches!(
            reg.encryption_params(&IdentityPrefix::random()).await,
            Err(RegistryError::ParamsUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_legacy_time_lock() {
        let (reg, clock) = registry();
        let secret = format!("0x{}", "cd".repeat(32));
        let ct = reg.encrypt_with_time(&secret, NOW + 10).unwrap();

        assert_eq!(
            reg.decrypt_with_time(&ct, NOW + 10).await,
            Err(RegistryError::NotYetReleased)
        );

        clock.advance(10);
        assert_eq!(reg.decrypt_with_time(&ct, NOW + 10).await.unwrap(), secret);

        // bound to the timestamp it was locked for
        assert!(matches!(
            reg.decrypt_with_time(&ct, NOW + 5).await,
            Err(RegistryError::InvalidRequest(_))
        ));
    }
}
