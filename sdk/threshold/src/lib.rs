//! Hongbao Threshold Encryption
//!
//! Time-lock encryption of packet keys. A committee of keypers holds shares of
//! an eon secret; once a release timestamp has passed they publish decryption
//! shares for the identity bound to that timestamp, and any K of them combine
//! into the identity's decryption key.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       Time-Lock Packet Flow                       │
//! │                                                                   │
//! │  1. Sender                2. Registry             3. Recipient    │
//! │  ┌───────────┐          ┌──────────────┐        ┌─────────────┐  │
//! │  │ Encrypt   │─identity─▶│ Keypers hold │─after─▶│ Decrypt key │  │
//! │  │ key to    │  + time   │ eon shares   │release │ with dk(id) │  │
//! │  │ (eon, id) │           │ (K-of-N)     │        │             │  │
//! │  └───────────┘          └──────────────┘        └─────────────┘  │
//! │                                                                   │
//! │  Wire: 0x03 || C1 (G2, 96B) || C2 (32B) || C3 (32B blocks)        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod cipher;
pub mod error;
pub mod hash;
pub mod keyper;
pub mod keys;
pub mod shares;

pub use cipher::{
    MIN_CIPHERTEXT_LEN, SECRET_LEN, ThresholdCiphertext, VERSION_TAG, decrypt, encrypt,
    encrypt_message,
};
pub use error::ThresholdError;
pub use keyper::{
    DecryptionShare, Keyper, KeyperConfig, KeyperSet, combine_decryption_shares,
    verify_decryption_key,
};
pub use keys::{DecryptionKey, EonKey, Identity};
pub use shares::{ScalarShare, combine_scalar, lagrange_at_zero, random_scalar, split_scalar};
