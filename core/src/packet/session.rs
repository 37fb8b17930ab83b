//! Redemption session
//!
//! One recipient's attempt to open a packet. The session owns the decoded
//! link, the payload still to be unwrapped and, once recovered, the packet's
//! key. [`RedemptionSession::advance`] performs at most one transition.

use std::fmt;

use hongbao_envelope::EnvelopeError;
use hongbao_keypair::{Address, Keypair, PrivateKey};
use hongbao_link::{KeyPayload, LinkError, PacketLink};
use hongbao_threshold::{ThresholdCiphertext, decrypt};
use log::{debug, info, warn};

use super::lifecycle::PacketLifecycle;
use super::policy::TimeRemaining;
use crate::error::RedeemError;

#[derive(Clone)]
pub enum RedemptionEvent {
    Proceed,
    Password(String),
}

impl fmt::Debug for RedemptionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedemptionEvent::Proceed => f.write_str("Proceed"),
            RedemptionEvent::Password(_) => f.write_str("Password(<redacted>)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReceipt {
    pub destination: Address,
    pub amount: u64,
    pub fee: u64,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedemptionState {
    Locked,
    PasswordPending { attempts: u32 },
    ThresholdDecrypting,
    KeyValidated { address: Address },
    BalanceChecked { balance: u64 },
    /// Estimate only; re-checked right before the transfer
    Sweeping { amount: u64, fee: u64 },
    Swept(SweepReceipt),
    Failed(RedeemError),
}

impl RedemptionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RedemptionState::Swept(_) | RedemptionState::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            RedemptionState::Locked => "locked",
            RedemptionState::PasswordPending { .. } => "password-pending",
            RedemptionState::ThresholdDecrypting => "threshold-decrypting",
            RedemptionState::KeyValidated { .. } => "key-validated",
            RedemptionState::BalanceChecked { .. } => "balance-checked",
            RedemptionState::Sweeping { .. } => "sweeping",
            RedemptionState::Swept(_) => "swept",
            RedemptionState::Failed(_) => "failed",
        }
    }
}

pub struct RedemptionSession {
    link: PacketLink,
    destination: Address,
    payload: KeyPayload,
    key: Option<Keypair>,
    state: RedemptionState,
}

impl fmt::Debug for RedemptionSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedemptionSession")
            .field("timestamp", &self.link.timestamp)
            .field("payload", &self.payload.kind())
            .field("destination", &self.destination)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// A decrypted payload is either another ciphertext or the key itself.
enum Unwrapped {
    Ciphertext(ThresholdCiphertext),
    Key(Keypair),
}

fn key_from_plaintext(plaintext: &[u8]) -> Result<Keypair, RedeemError> {
    let key = PrivateKey::from_key_material(plaintext)
        .map_err(|e| RedeemError::InvalidKey(e.to_string()))?;
    Ok(Keypair::from_private_key(&key))
}

/// Envelopes hold either the threshold ciphertext or, for packets that were
/// never time-locked, the key.
fn unwrap_envelope_plaintext(plaintext: &str) -> Result<Unwrapped, RedeemError> {
    match KeyPayload::parse(plaintext) {
        Ok(KeyPayload::Threshold(ct)) => Ok(Unwrapped::Ciphertext(ct)),
        Ok(KeyPayload::Plain(key)) => Ok(Unwrapped::Key(Keypair::from_private_key(&key))),
        Ok(KeyPayload::Password(_)) => Err(RedeemError::InvalidCiphertext(
            "nested password envelope".into(),
        )),
        Err(LinkError::Ciphertext(e)) => Err(RedeemError::InvalidCiphertext(e.to_string())),
        Err(_) => key_from_plaintext(plaintext.as_bytes()).map(Unwrapped::Key),
    }
}

impl RedemptionSession {
    pub fn new(link: PacketLink, destination: Address) -> Result<Self, RedeemError> {
        let payload = link
            .payload()
            .map_err(|e| RedeemError::InvalidCiphertext(e.to_string()))?;

        let is_envelope = matches!(payload, KeyPayload::Password(_));
        if link.protected != is_envelope {
            return Err(RedeemError::InvalidCiphertext(format!(
                "protected={} but key is a {} payload",
                link.protected,
                payload.kind()
            )));
        }

        Ok(Self {
            link,
            destination,
            payload,
            key: None,
            state: RedemptionState::Locked,
        })
    }

    pub fn state(&self) -> &RedemptionState {
        &self.state
    }

    pub fn link(&self) -> &PacketLink {
        &self.link
    }

    pub fn destination(&self) -> &Address {
        &self.destination
    }

    /// Address of the packet account, once the key is recovered
    pub fn packet_address(&self) -> Option<Address> {
        self.key.as_ref().map(Keypair::address)
    }

    pub fn time_remaining(&self, now: u64) -> TimeRemaining {
        TimeRemaining::until(self.link.timestamp, now)
    }

    /// Attempt one transition.
    ///
    /// Retryable errors leave the state as it was; any other error moves the
    /// session to [`RedemptionState::Failed`].
    pub async fn advance(
        &mut self,
        lifecycle: &PacketLifecycle,
        event: RedemptionEvent,
    ) -> Result<&RedemptionState, RedeemError> {
        if let RedemptionState::Failed(e) = &self.state {
            return Err(e.clone());
        }
        if self.state.is_terminal() {
            return Ok(&self.state);
        }

        let from = self.state.name();
        match self.step(lifecycle, event).await {
            Ok(next) => {
                debug!("Redemption {} -> {}", from, next.name());
                if let RedemptionState::Swept(receipt) = &next {
                    info!(
                        "Packet swept: {} lamports to {} ({})",
                        receipt.amount, receipt.destination, receipt.signature
                    );
                    self.key = None;
                }
                self.state = next;
                Ok(&self.state)
            }
            Err(e) if e.is_retryable() => {
                match &e {
                    RedeemError::Network(_) | RedeemError::NotYetReleased => {
                        warn!("Redemption step {} will retry: {}", from, e)
                    }
                    _ => debug!("Redemption step {} waiting: {}", from, e),
                }
                Err(e)
            }
            Err(e) => {
                warn!("Redemption failed in {}: {}", from, e);
                self.key = None;
                self.state = RedemptionState::Failed(e.clone());
                Err(e)
            }
        }
    }

    async fn step(
        &mut self,
        lifecycle: &PacketLifecycle,
        event: RedemptionEvent,
    ) -> Result<RedemptionState, RedeemError> {
        match &self.state {
            RedemptionState::Locked => self.unlock(lifecycle.now()),
            RedemptionState::PasswordPending { attempts } => {
                let attempts = *attempts;
                let RedemptionEvent::Password(password) = event else {
                    return Err(RedeemError::PasswordRequired);
                };
                self.open_envelope(&password, attempts)
            }
            RedemptionState::ThresholdDecrypting => self.threshold_decrypt(lifecycle).await,
            RedemptionState::KeyValidated { address } => {
                let balance = lifecycle.balance(address).await?;
                if balance == 0 {
                    return Err(RedeemError::AlreadyClaimed);
                }
                Ok(RedemptionState::BalanceChecked { balance })
            }
            RedemptionState::BalanceChecked { balance } => {
                let balance = *balance;
                let address = self.key_address()?;
                let fee = lifecycle.fee(&address).await?;
                if balance <= fee {
                    return Err(RedeemError::InsufficientFunds { balance, fee });
                }
                Ok(RedemptionState::Sweeping {
                    amount: balance - fee,
                    fee,
                })
            }
            RedemptionState::Sweeping { .. } => self.sweep(lifecycle).await,
            RedemptionState::Swept(_) | RedemptionState::Failed(_) => Ok(self.state.clone()),
        }
    }

    fn unlock(&mut self, now: u64) -> Result<RedemptionState, RedeemError> {
        let remaining = self.time_remaining(now);
        if !remaining.is_released() {
            return Err(RedeemError::Locked {
                remaining: remaining.secs,
            });
        }

        match &self.payload {
            KeyPayload::Password(_) => Ok(RedemptionState::PasswordPending { attempts: 0 }),
            KeyPayload::Threshold(_) => Ok(RedemptionState::ThresholdDecrypting),
            KeyPayload::Plain(key) => {
                let keypair = Keypair::from_private_key(key);
                Ok(self.hold_key(keypair))
            }
        }
    }

    fn open_envelope(
        &mut self,
        password: &str,
        attempts: u32,
    ) -> Result<RedemptionState, RedeemError> {
        let KeyPayload::Password(envelope) = &self.payload else {
            return Err(RedeemError::InvalidCiphertext("no envelope to open".into()));
        };

        let plaintext = match hongbao_envelope::decrypt(envelope, password) {
            Ok(p) => p,
            Err(EnvelopeError::WrongPassword) => {
                self.state = RedemptionState::PasswordPending {
                    attempts: attempts + 1,
                };
                return Err(RedeemError::WrongPassword);
            }
            Err(e) => return Err(RedeemError::InvalidCiphertext(e.to_string())),
        };

        match unwrap_envelope_plaintext(&plaintext)? {
            Unwrapped::Ciphertext(ct) => {
                self.payload = KeyPayload::Threshold(ct);
                Ok(RedemptionState::ThresholdDecrypting)
            }
            Unwrapped::Key(keypair) => Ok(self.hold_key(keypair)),
        }
    }

    async fn threshold_decrypt(
        &mut self,
        lifecycle: &PacketLifecycle,
    ) -> Result<RedemptionState, RedeemError> {
        let KeyPayload::Threshold(ct) = &self.payload else {
            return Err(RedeemError::InvalidCiphertext("no ciphertext to decrypt".into()));
        };

        let keypair = match &self.link.identity {
            Some(identity) => {
                let dk = lifecycle.decryption_key(identity).await?;
                let plaintext =
                    decrypt(ct, &dk).map_err(|e| RedeemError::InvalidCiphertext(e.to_string()))?;
                key_from_plaintext(&plaintext)?
            }
            None => {
                let plaintext = lifecycle
                    .decrypt_with_time(&ct.to_hex(), self.link.timestamp)
                    .await?;
                key_from_plaintext(plaintext.as_bytes())?
            }
        };
        Ok(self.hold_key(keypair))
    }

    async fn sweep(&mut self, lifecycle: &PacketLifecycle) -> Result<RedemptionState, RedeemError> {
        let address = self.key_address()?;

        let balance = lifecycle.balance(&address).await?;
        if balance == 0 {
            return Err(RedeemError::AlreadyClaimed);
        }
        let fee = lifecycle.fee(&address).await?;
        if balance <= fee {
            return Err(RedeemError::InsufficientFunds { balance, fee });
        }
        let amount = balance - fee;

        let keypair = self
            .key
            .as_ref()
            .ok_or_else(|| RedeemError::InvalidKey("key was cleared".into()))?;

        match lifecycle.transfer(keypair, &self.destination, amount).await {
            Ok(signature) => Ok(RedemptionState::Swept(SweepReceipt {
                destination: self.destination,
                amount,
                fee,
                signature,
            })),
            Err(e) => {
                // someone else may have swept in between
                if matches!(lifecycle.balance(&address).await, Ok(0)) {
                    return Err(RedeemError::AlreadyClaimed);
                }
                Err(e)
            }
        }
    }

    fn hold_key(&mut self, keypair: Keypair) -> RedemptionState {
        let address = keypair.address();
        self.key = Some(keypair);
        RedemptionState::KeyValidated { address }
    }

    fn key_address(&self) -> Result<Address, RedeemError> {
        self.packet_address()
            .ok_or_else(|| RedeemError::InvalidKey("key was cleared".into()))
    }
}
