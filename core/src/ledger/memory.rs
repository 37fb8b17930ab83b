//! In-process ledger
//!
//! Holds balances in a map and checks every transfer's signature. Used by the
//! tests and by dry runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use hongbao_keypair::{Address, Signer};
use log::debug;
use tokio::sync::Mutex;

use super::{DEFAULT_FEE_LAMPORTS, FeeQuote, Ledger, LedgerError};

/// A transfer the ledger accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    pub from: Address,
    pub to: Address,
    pub lamports: u64,
    pub fee: u64,
    pub signature: String,
}

#[derive(Default)]
struct State {
    balances: HashMap<Address, u64>,
    transfers: Vec<TransferRecord>,
}

pub struct MemoryLedger {
    state: Mutex<State>,
    fee: FeeQuote,
    sequence: AtomicU64,
    offline: AtomicBool,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new(FeeQuote::flat(DEFAULT_FEE_LAMPORTS))
    }
}

/// Bytes the payer signs: `from || to || lamports || sequence`
fn transfer_message(from: &Address, to: &Address, lamports: u64, sequence: u64) -> Vec<u8> {
    let mut msg = Vec::with_capacity(80);
    msg.extend_from_slice(&from.0);
    msg.extend_from_slice(&to.0);
    msg.extend_from_slice(&lamports.to_le_bytes());
    msg.extend_from_slice(&sequence.to_le_bytes());
    msg
}

impl MemoryLedger {
    pub fn new(fee: FeeQuote) -> Self {
        Self {
            state: Mutex::new(State::default()),
            fee,
            sequence: AtomicU64::new(0),
            offline: AtomicBool::new(false),
        }
    }

    /// Mint `lamports` into `address`
    pub async fn credit(&self, address: &Address, lamports: u64) {
        let mut state = self.state.lock().await;
        let balance = state.balances.entry(*address).or_default();
        *balance = balance.saturating_add(lamports);
    }

    /// While offline every call fails with [`LedgerError::Rpc`]
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn transfers(&self) -> Vec<TransferRecord> {
        self.state.lock().await.transfers.clone()
    }

    fn check_online(&self) -> Result<(), LedgerError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(LedgerError::Rpc("ledger is offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn balance(&self, address: &Address) -> Result<u64, LedgerError> {
        self.check_online()?;
        let state = self.state.lock().await;
        Ok(state.balances.get(address).copied().unwrap_or(0))
    }

    async fn fee_quote(&self, _payer: &Address) -> Result<FeeQuote, LedgerError> {
        self.check_online()?;
        Ok(self.fee)
    }

    async fn transfer(
        &self,
        from: &dyn Signer,
        to: &Address,
        lamports: u64,
    ) -> Result<String, LedgerError> {
        self.check_online()?;

        let payer = from.address();
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let message = transfer_message(&payer, to, lamports, sequence);
        let signature = from.sign(&message);
        if !payer.verify(&message, &signature) {
            return Err(LedgerError::Rejected("signature verification failed".into()));
        }

        let fee = self.fee.total();
        let required = lamports.saturating_add(fee);

        let mut state = self.state.lock().await;
        let balance = state.balances.get(&payer).copied().unwrap_or(0);
        if balance < required {
            return Err(LedgerError::InsufficientFunds { balance, required });
        }

        state.balances.insert(payer, balance - required);
        let credited = state.balances.entry(*to).or_default();
        *credited = credited.saturating_add(lamports);

        let signature = bs58::encode(signature).into_string();
        debug!("Transfer {} -> {}: {} lamports (fee {})", payer, to, lamports, fee);
        state.transfers.push(TransferRecord {
            from: payer,
            to: *to,
            lamports,
            fee,
            signature: signature.clone(),
        });
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hongbao_keypair::Keypair;

    #[tokio::test]
    async fn test_transfer_moves_funds_and_fee() {
        let ledger = MemoryLedger::default();
        let alice = Keypair::generate();
        let bob = Keypair::generate().address();
        ledger.credit(&alice.address(), 1_000_000).await;

        let sig = ledger.transfer(&alice, &bob, 400_000).await.unwrap();
        assert!(!sig.is_empty());
        assert_eq!(ledger.balance(&alice.address()).await.unwrap(), 595_000);
        assert_eq!(ledger.balance(&bob).await.unwrap(), 400_000);

        let records = ledger.transfers().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fee, DEFAULT_FEE_LAMPORTS);
    }

    #[tokio::test]
    async fn test_insufficient_funds() {
        let ledger = MemoryLedger::default();
        let alice = Keypair::generate();
        ledger.credit(&alice.address(), 10_000).await;

        let err = ledger
            .transfer(&alice, &Keypair::generate().address(), 10_000)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                balance: 10_000,
                required: 15_000
            }
        );
        // nothing moved
        assert_eq!(ledger.balance(&alice.address()).await.unwrap(), 10_000);
    }

    #[tokio::test]
    async fn test_offline() {
        let ledger = MemoryLedger::default();
        ledger.set_offline(true);
        let addr = Keypair::generate().address();
        assert!(matches!(ledger.balance(&addr).await, Err(LedgerError::Rpc(_))));
        ledger.set_offline(false);
        assert_eq!(ledger.balance(&addr).await.unwrap(), 0);
    }
}
