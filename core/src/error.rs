use thiserror::Error;

use crate::ledger::LedgerError;
use crate::registry::RegistryError;

/// Why a redemption step did not advance.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RedeemError {
    #[error("packet is locked for another {remaining}s")]
    Locked { remaining: u64 },

    #[error("packet is password protected")]
    PasswordRequired,

    #[error("wrong password")]
    WrongPassword,

    #[error("this link is broken: {0}")]
    InvalidCiphertext(String),

    #[error("decrypted key is not a valid private key: {0}")]
    InvalidKey(String),

    #[error("decryption key not yet released")]
    NotYetReleased,

    #[error("packet was already claimed")]
    AlreadyClaimed,

    #[error("balance {balance} does not cover the transfer fee {fee}")]
    InsufficientFunds { balance: u64, fee: u64 },

    #[error("network error: {0}")]
    Network(String),
}

impl RedeemError {
    /// Whether the same step may succeed if tried again later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RedeemError::Locked { .. }
                | RedeemError::PasswordRequired
                | RedeemError::WrongPassword
                | RedeemError::NotYetReleased
                | RedeemError::Network(_)
        )
    }
}

impl From<RegistryError> for RedeemError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotYetReleased => RedeemError::NotYetReleased,
            RegistryError::InvalidRequest(msg) => RedeemError::InvalidCiphertext(msg),
            RegistryError::Network(msg) | RegistryError::InvalidResponse(msg) => {
                RedeemError::Network(msg)
            }
            other => RedeemError::Network(other.to_string()),
        }
    }
}

impl From<LedgerError> for RedeemError {
    fn from(e: LedgerError) -> Self {
        RedeemError::Network(e.to_string())
    }
}

/// Why a packet could not be created.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CreateError {
    #[error("invalid release time: {0}")]
    InvalidRelease(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("registry: {0}")]
    Registry(RegistryError),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("network error: {0}")]
    Network(String),
}

impl From<RegistryError> for CreateError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::Network(msg) => CreateError::Network(msg),
            other => CreateError::Registry(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_split() {
        assert!(RedeemError::Locked { remaining: 3 }.is_retryable());
        assert!(RedeemError::WrongPassword.is_retryable());
        assert!(RedeemError::Network("x".into()).is_retryable());
        assert!(!RedeemError::AlreadyClaimed.is_retryable());
        assert!(!RedeemError::InvalidKey("x".into()).is_retryable());
        assert!(!RedeemError::InsufficientFunds { balance: 1, fee: 2 }.is_retryable());
    }

    #[test]
    fn test_registry_mapping() {
        assert_eq!(
            RedeemError::from(RegistryError::NotYetReleased),
            RedeemError::NotYetReleased
        );
        assert!(matches!(
            RedeemError::from(RegistryError::Network("down".into())),
            RedeemError::Network(_)
        ));
        assert!(matches!(
            CreateError::from(RegistryError::Registration("past".into())),
            CreateError::Registry(_)
        ));
    }
}
