use hongbao_envelope::EnvelopeError;
use hongbao_keypair::KeyError;
use hongbao_threshold::ThresholdError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("key is not a private key, ciphertext or envelope")]
    UnrecognizedKey,
    #[error("invalid envelope: {0}")]
    Envelope(#[from] EnvelopeError),
    #[error("invalid ciphertext: {0}")]
    Ciphertext(#[from] ThresholdError),
    #[error("invalid private key: {0}")]
    Key(#[from] KeyError),
    #[error("invalid amount {0:?}")]
    InvalidAmount(String),
}
