use thiserror::Error;

/// Threshold encryption errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ThresholdError {
    #[error("secret must be exactly 32 bytes, got {0}")]
    InvalidSecretLength(usize),

    #[error("unsupported ciphertext version tag 0x{0:02x}")]
    InvalidVersion(u8),

    #[error("invalid ciphertext length {got} (minimum {min}, body in 32-byte blocks)")]
    InvalidLength { got: usize, min: usize },

    #[error("invalid hex encoding")]
    InvalidHex,

    #[error("invalid {0} encoding")]
    InvalidPoint(&'static str),

    #[error("identity is empty")]
    EmptyIdentity,

    #[error("hashing identity to curve failed")]
    HashToCurve,

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("insufficient shares: got {got}, need {need}")]
    InsufficientShares { got: usize, need: usize },

    #[error("invalid threshold: k={k}, n={n}")]
    InvalidThreshold { k: usize, n: usize },

    #[error("duplicate share index {0}")]
    DuplicateShare(u32),
}
