//! Ledger collaborator
//!
//! Balance queries, fee quotes and native transfers. The lifecycle only ever
//! moves funds through this trait.

pub mod memory;
pub mod solana;

use async_trait::async_trait;
use hongbao_keypair::{Address, Signer};
use thiserror::Error;

pub use memory::{MemoryLedger, TransferRecord};
pub use solana::SolanaLedger;

/// Base fee per signature on Solana
pub const DEFAULT_FEE_LAMPORTS: u64 = 5_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: u64, required: u64 },

    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error("ledger call timed out: {0}")]
    Timeout(String),
}

/// Price of one transfer: `unit_price * units` lamports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeQuote {
    pub unit_price: u64,
    pub units: u64,
}

impl FeeQuote {
    pub fn flat(lamports: u64) -> Self {
        Self {
            unit_price: lamports,
            units: 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.unit_price.saturating_mul(self.units)
    }
}

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn balance(&self, address: &Address) -> Result<u64, LedgerError>;

    /// Fee for a single transfer paid by `payer`
    async fn fee_quote(&self, payer: &Address) -> Result<FeeQuote, LedgerError>;

    /// Move `lamports` from the signer's account to `to`. Returns the
    /// transaction signature.
    async fn transfer(
        &self,
        from: &dyn Signer,
        to: &Address,
        lamports: u64,
    ) -> Result<String, LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_total() {
        assert_eq!(FeeQuote::flat(DEFAULT_FEE_LAMPORTS).total(), 5_000);
        let quote = FeeQuote {
            unit_price: 3,
            units: 200_000,
        };
        assert_eq!(quote.total(), 600_000);
        assert_eq!(
            FeeQuote {
                unit_price: u64::MAX,
                units: 2
            }
            .total(),
            u64::MAX
        );
    }
}
