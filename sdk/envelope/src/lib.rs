pub mod crypto;
pub mod types;

pub use types::{Envelope, EnvelopeError, IV_LEN, SALT_LEN};

pub use crypto::{KDF_ROUNDS, LEGACY_SALT, decrypt, encrypt};
