//! Packet Lifecycle
//!
//! Creation is linear:
//!
//! ```text
//! policy ─▶ ephemeral key ─▶ register identity ─▶ eon key ─▶ encrypt ─▶ [envelope] ─▶ link ─▶ fund
//! ```
//!
//! Redemption runs a [`RedemptionSession`] to a terminal state.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use hongbao_keypair::{Address, Keypair, Signer};
use hongbao_link::{Amount, KeyPayload, PacketLink};
use hongbao_threshold::{DecryptionKey, Identity};
use log::{debug, info, warn};
use tokio::time::timeout;

use super::policy::{ReleasePolicy, TimeRemaining};
use super::session::{RedemptionEvent, RedemptionSession, RedemptionState, SweepReceipt};
use crate::clock::Clock;
use crate::error::{CreateError, RedeemError};
use crate::ledger::{Ledger, LedgerError};
use crate::registry::{IdentityPrefix, KeyRegistry, RegistryError};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Upper bound on every registry and ledger call
    pub call_timeout: Duration,
    /// Page the link fragment is appended to
    pub link_base_url: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            link_base_url: "http://localhost:3000/".to_string(),
        }
    }
}

// ============================================================================
// Requests & results
// ============================================================================

#[derive(Clone)]
pub struct CreateRequest {
    pub amount: Amount,
    pub policy: ReleasePolicy,
    /// Empty is treated as no password
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FundingStatus {
    Funded { signature: String },
    /// The link is still valid; fund `address` by hand
    Failed { reason: String },
}

#[derive(Debug, Clone)]
pub struct CreatedPacket {
    pub link: PacketLink,
    pub url: String,
    /// Account holding the gift
    pub address: Address,
    pub release_timestamp: u64,
    pub funding: FundingStatus,
}

#[derive(Clone)]
pub struct RedeemOptions {
    pub password: Option<String>,
    pub destination: Address,
}

// ============================================================================
// Timeouts
// ============================================================================

pub(crate) trait TimedOut {
    fn timed_out(what: &'static str, after: Duration) -> Self;
}

impl TimedOut for RegistryError {
    fn timed_out(what: &'static str, after: Duration) -> Self {
        RegistryError::Network(format!("{what} timed out after {after:?}"))
    }
}

impl TimedOut for LedgerError {
    fn timed_out(what: &'static str, after: Duration) -> Self {
        LedgerError::Timeout(format!("{what} after {after:?}"))
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

pub struct PacketLifecycle {
    registry: Arc<dyn KeyRegistry>,
    ledger: Arc<dyn Ledger>,
    clock: Arc<dyn Clock>,
    config: LifecycleConfig,
}

impl PacketLifecycle {
    pub fn new(
        registry: Arc<dyn KeyRegistry>,
        ledger: Arc<dyn Ledger>,
        clock: Arc<dyn Clock>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            registry,
            ledger,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn time_remaining(&self, link: &PacketLink) -> TimeRemaining {
        TimeRemaining::until(link.timestamp, self.now())
    }

    async fn bounded<T, E, F>(&self, what: &'static str, call: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: TimedOut,
    {
        let after = self.config.call_timeout;
        match timeout(after, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!("{} timed out after {:?}", what, after);
                Err(E::timed_out(what, after))
            }
        }
    }

    // ------------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------------

    /// Create and fund a packet.
    ///
    /// Funding is a separate transaction: if it fails the packet is still
    /// returned, with [`FundingStatus::Failed`], so the link is not lost.
    pub async fn create(
        &self,
        sender: &dyn Signer,
        request: CreateRequest,
    ) -> Result<CreatedPacket, CreateError> {
        if request.amount.is_zero() {
            return Err(CreateError::InvalidAmount("amount must be positive".into()));
        }
        let release_timestamp = request.policy.resolve(self.now())?;

        let ephemeral = Keypair::generate();
        let address = ephemeral.address();
        let prefix = IdentityPrefix::random();

        let identity = self
            .bounded(
                "register_identity",
                self.registry.register_identity(release_timestamp, &prefix),
            )
            .await?;
        let params = self
            .bounded("encryption_params", self.registry.encryption_params(&prefix))
            .await?;
        if params.identity != identity {
            return Err(CreateError::Registry(RegistryError::InvalidResponse(format!(
                "registered {identity} but encryption data is for {}",
                params.identity
            ))));
        }
        debug!("Identity {} releases at {}", identity, release_timestamp);

        let ciphertext = hongbao_threshold::encrypt(
            ephemeral.private_key().as_bytes(),
            &identity,
            &params.eon_key,
            None,
        )
        .map_err(|e| CreateError::Encryption(e.to_string()))?;
        drop(ephemeral);

        let payload = match request.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => KeyPayload::Password(
                hongbao_envelope::encrypt(&ciphertext.to_hex(), password)
                    .map_err(|e| CreateError::Encryption(e.to_string()))?,
            ),
            None => KeyPayload::Threshold(ciphertext),
        };

        let link = PacketLink::new(&payload, release_timestamp, request.amount, Some(identity));
        let url = link.to_url(&self.config.link_base_url);
        info!(
            "Created {} packet {} for {} SOL, opens at {}",
            payload.kind(),
            address,
            request.amount,
            release_timestamp
        );

        let funding = match self
            .bounded(
                "funding transfer",
                self.ledger.transfer(sender, &address, request.amount.lamports()),
            )
            .await
        {
            Ok(signature) => {
                info!("Funded packet {} ({})", address, signature);
                FundingStatus::Funded { signature }
            }
            Err(e) => {
                warn!(
                    "Packet {} was created but funding failed: {}. The link is valid once the account is funded.",
                    address, e
                );
                FundingStatus::Failed {
                    reason: e.to_string(),
                }
            }
        };

        Ok(CreatedPacket {
            link,
            url,
            address,
            release_timestamp,
            funding,
        })
    }

    // ------------------------------------------------------------------------
    // Redemption
    // ------------------------------------------------------------------------

    pub fn session(
        &self,
        link: PacketLink,
        destination: Address,
    ) -> Result<RedemptionSession, RedeemError> {
        RedemptionSession::new(link, destination)
    }

    /// Drive a fresh session to `Swept`, stopping at the first error.
    /// The password, if any, is tried once.
    pub async fn redeem(
        &self,
        link: &PacketLink,
        options: RedeemOptions,
    ) -> Result<SweepReceipt, RedeemError> {
        let mut session = self.session(link.clone(), options.destination)?;
        let mut password = options.password;

        loop {
            let event = match session.state() {
                RedemptionState::PasswordPending { .. } => match password.take() {
                    Some(pw) => RedemptionEvent::Password(pw),
                    None => RedemptionEvent::Proceed,
                },
                _ => RedemptionEvent::Proceed,
            };

            if let RedemptionState::Swept(receipt) = session.advance(self, event).await? {
                return Ok(receipt.clone());
            }
        }
    }

    // ------------------------------------------------------------------------
    // Bounded collaborator calls used by sessions
    // ------------------------------------------------------------------------

    pub(crate) async fn decryption_key(
        &self,
        identity: &Identity,
    ) -> Result<DecryptionKey, RedeemError> {
        Ok(self
            .bounded("decryption_key", self.registry.decryption_key(identity))
            .await?)
    }

    pub(crate) async fn decrypt_with_time(
        &self,
        ciphertext: &str,
        release_timestamp: u64,
    ) -> Result<String, RedeemError> {
        Ok(self
            .bounded(
                "decrypt_with_time",
                self.registry.decrypt_with_time(ciphertext, release_timestamp),
            )
            .await?)
    }

    pub(crate) async fn balance(&self, address: &Address) -> Result<u64, RedeemError> {
        Ok(self.bounded("balance", self.ledger.balance(address)).await?)
    }

    pub(crate) async fn fee(&self, payer: &Address) -> Result<u64, RedeemError> {
        let quote = self.bounded("fee_quote", self.ledger.fee_quote(payer)).await?;
        Ok(quote.total())
    }

    pub(crate) async fn transfer(
        &self,
        from: &dyn Signer,
        to: &Address,
        lamports: u64,
    ) -> Result<String, RedeemError> {
        Ok(self
            .bounded("sweep transfer", self.ledger.transfer(from, to, lamports))
            .await?)
    }
}
