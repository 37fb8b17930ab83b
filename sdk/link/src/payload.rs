use hongbao_envelope::Envelope;
use hongbao_keypair::PrivateKey;
use hongbao_threshold::{ThresholdCiphertext, VERSION_TAG};

use crate::error::LinkError;

/// What the `key` parameter of a link holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPayload {
    /// `0x` + 64 hex: already decrypted
    Plain(PrivateKey),
    /// `0x03...`: time-locked ciphertext
    Threshold(ThresholdCiphertext),
    /// `{encrypted, iv, salt?}`: password-wrapped
    Password(Envelope),
}

impl KeyPayload {
    /// Classify a key value.
    pub fn parse(value: &str) -> Result<Self, LinkError> {
        let value = value.trim();
        if value.starts_with('{') {
            return Ok(KeyPayload::Password(Envelope::from_json(value)?));
        }

        let Some(hex_part) = value.strip_prefix("0x") else {
            return Err(LinkError::UnrecognizedKey);
        };
        if hex_part.len() == 64 {
            return Ok(KeyPayload::Plain(value.parse()?));
        }
        let tag = format!("{VERSION_TAG:02x}");
        if hex_part.get(..2).is_some_and(|t| t.eq_ignore_ascii_case(&tag)) {
            return Ok(KeyPayload::Threshold(value.parse()?));
        }
        Err(LinkError::UnrecognizedKey)
    }

    /// Wire form, suitable for the `key` parameter.
    pub fn encode(&self) -> String {
        match self {
            KeyPayload::Plain(key) => key.to_hex(),
            KeyPayload::Threshold(ct) => ct.to_hex(),
            KeyPayload::Password(env) => env.to_json(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            KeyPayload::Plain(_) => "plain",
            KeyPayload::Threshold(_) => "threshold",
            KeyPayload::Password(_) => "password",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hongbao_threshold::{Identity, KeyperConfig, KeyperSet, ThresholdError, encrypt};

    #[test]
    fn test_plain_key() {
        let hex = format!("0x{}", "11".repeat(32));
        let payload = KeyPayload::parse(&hex).unwrap();
        assert!(matches!(payload, KeyPayload::Plain(_)));
        assert_eq!(payload.encode(), hex);
    }

    #[test]
    fn test_threshold_ciphertext() {
        let set = KeyperSet::generate(KeyperConfig::new(1, 1)).unwrap();
        let id: Identity = "0xabcd".parse().unwrap();
        let ct = encrypt(&[2u8; 32], &id, &set.eon_key(), None).unwrap();

        let payload = KeyPayload::parse(&ct.to_hex()).unwrap();
        assert_eq!(payload, KeyPayload::Threshold(ct));
    }

    #[test]
    fn test_envelope() {
        let env = hongbao_envelope::encrypt("0x03ff", "pw").unwrap();
        let payload = KeyPayload::parse(&env.to_json()).unwrap();
        assert_eq!(payload.kind(), "password");
    }

    #[test]
    fn test_short_threshold_rejected_before_network() {
        let err = KeyPayload::parse("0x03abcd").unwrap_err();
        assert!(matches!(
            err,
            LinkError::Ciphertext(ThresholdError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_unrecognized() {
        assert_eq!(KeyPayload::parse("hello"), Err(LinkError::UnrecognizedKey));
        assert_eq!(KeyPayload::parse("0x02abcd"), Err(LinkError::UnrecognizedKey));
        assert!(KeyPayload::parse("{not json").is_err());
    }
}
