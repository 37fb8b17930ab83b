#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use hongbao_core::{
    EncryptionParams, IdentityPrefix, KeyRegistry, LifecycleConfig, LocalRegistry, ManualClock,
    MemoryLedger, PacketLifecycle, RegistryError,
};
use hongbao_keypair::Keypair;
use hongbao_threshold::{DecryptionKey, Identity, KeyperConfig};

/// 2026-01-01T00:00:00Z
pub const NOW: u64 = 1_767_225_600;

pub const SENDER_FUNDS: u64 = 10_000_000_000;

/// Local registry that counts key requests
pub struct CountingRegistry {
    pub inner: LocalRegistry,
    key_requests: AtomicUsize,
}

impl CountingRegistry {
    pub fn key_requests(&self) -> usize {
        self.key_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyRegistry for CountingRegistry {
    async fn register_identity(
        &self,
        release_timestamp: u64,
        prefix: &IdentityPrefix,
    ) -> Result<Identity, RegistryError> {
        self.inner.register_identity(release_timestamp, prefix).await
    }

    async fn encryption_params(
        &self,
        prefix: &IdentityPrefix,
    ) -> Result<EncryptionParams, RegistryError> {
        self.inner.encryption_params(prefix).await
    }

    async fn decryption_key(&self, identity: &Identity) -> Result<DecryptionKey, RegistryError> {
        self.key_requests.fetch_add(1, Ordering::SeqCst);
        self.inner.decryption_key(identity).await
    }

    async fn decrypt_with_time(
        &self,
        ciphertext: &str,
        release_timestamp: u64,
    ) -> Result<String, RegistryError> {
        self.key_requests.fetch_add(1, Ordering::SeqCst);
        self.inner.decrypt_with_time(ciphertext, release_timestamp).await
    }
}

/// Registry that never answers
pub struct StalledRegistry;

#[async_trait]
impl KeyRegistry for StalledRegistry {
    async fn register_identity(
        &self,
        _release_timestamp: u64,
        _prefix: &IdentityPrefix,
    ) -> Result<Identity, RegistryError> {
        std::future::pending().await
    }

    async fn encryption_params(
        &self,
        _prefix: &IdentityPrefix,
    ) -> Result<EncryptionParams, RegistryError> {
        std::future::pending().await
    }

    async fn decryption_key(&self, _identity: &Identity) -> Result<DecryptionKey, RegistryError> {
        std::future::pending().await
    }

    async fn decrypt_with_time(
        &self,
        _ciphertext: &str,
        _release_timestamp: u64,
    ) -> Result<String, RegistryError> {
        std::future::pending().await
    }
}

pub struct Harness {
    pub clock: ManualClock,
    pub registry: Arc<CountingRegistry>,
    pub ledger: Arc<MemoryLedger>,
    pub lifecycle: PacketLifecycle,
    pub sender: Keypair,
}

impl Harness {
    pub async fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let clock = ManualClock::new(NOW);
        let registry = Arc::new(CountingRegistry {
            inner: LocalRegistry::generate(KeyperConfig::new(2, 3), Arc::new(clock.clone()))
                .expect("valid committee"),
            key_requests: AtomicUsize::new(0),
        });
        let ledger = Arc::new(MemoryLedger::default());
        let sender = Keypair::generate();
        ledger.credit(&sender.address(), SENDER_FUNDS).await;

        let lifecycle = PacketLifecycle::new(
            registry.clone(),
            ledger.clone(),
            Arc::new(clock.clone()),
            LifecycleConfig {
                call_timeout: Duration::from_secs(5),
                link_base_url: "https://hongbao.test/".into(),
            },
        );

        Self {
            clock,
            registry,
            ledger,
            lifecycle,
            sender,
        }
    }
}
