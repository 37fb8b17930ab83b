use chacha20poly1305::{
    ChaCha20Poly1305,
    aead::{Aead, KeyInit},
};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::types::{Envelope, EnvelopeError, IV_LEN, SALT_LEN};

pub const KDF_ROUNDS: u32 = 100_000;

/// Salt for envelopes that carry none
pub const LEGACY_SALT: &[u8] = b"hongbao-envelope-salt-v1";

fn derive_key(password: &str, salt: &[u8]) -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new([0u8; 32]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, KDF_ROUNDS, &mut *key);
    key
}

/// Wrap `plaintext` under `password` with a fresh salt and nonce.
pub fn encrypt(plaintext: &str, password: &str) -> Result<Envelope, EnvelopeError> {
    let mut rng = rand::thread_rng();
    let mut salt = [0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);
    let mut nonce = [0u8; IV_LEN];
    rng.fill_bytes(&mut nonce);

    let key = derive_key(password, &salt);
    let cipher = ChaCha20Poly1305::new((&*key).into());

    let ciphertext = cipher
        .encrypt(&nonce.into(), plaintext.as_bytes())
        .map_err(|_| EnvelopeError::Malformed("plaintext too large"))?;

    Ok(Envelope::from_parts(&ciphertext, &nonce, &salt))
}

pub fn decrypt(envelope: &Envelope, password: &str) -> Result<String, EnvelopeError> {
    let ciphertext = envelope.ciphertext_bytes()?;
    let nonce = envelope.iv_bytes()?;
    let salt = envelope.salt_bytes()?;

    let key = derive_key(password, salt.as_deref().unwrap_or(LEGACY_SALT));
    let cipher = ChaCha20Poly1305::new((&*key).into());

    let plaintext = cipher
        .decrypt(&nonce.into(), ciphertext.as_slice())
        .map_err(|_| EnvelopeError::WrongPassword)?;

    String::from_utf8(plaintext).map_err(|_| EnvelopeError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine, engine::general_purpose::STANDARD};

    #[test]
    fn test_roundtrip() {
        let env = encrypt("0x03abcdef", "abc123").unwrap();
        assert!(env.salt.is_some());
        assert_eq!(decrypt(&env, "abc123").unwrap(), "0x03abcdef");
    }

    #[test]
    fn test_fresh_salt_and_nonce() {
        let a = encrypt("same", "pw").unwrap();
        let b = encrypt("same", "pw").unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.encrypted, b.encrypted);
    }

    #[test]
    fn test_legacy_envelope_without_salt() {
        let key = derive_key("old", LEGACY_SALT);
        let cipher = ChaCha20Poly1305::new((&*key).into());
        let nonce = [4u8; IV_LEN];
        let ct = cipher.encrypt(&nonce.into(), &b"legacy"[..]).unwrap();

        let env = Envelope {
            encrypted: STANDARD.encode(ct),
            iv: STANDARD.encode(nonce),
            salt: None,
        };
        assert_eq!(decrypt(&env, "old").unwrap(), "legacy");
        assert_eq!(decrypt(&env, "new"), Err(EnvelopeError::WrongPassword));
    }

    #[test]
    fn test_bad_iv_is_malformed() {
        let mut env = encrypt("x", "pw").unwrap();
        env.iv = STANDARD.encode([0u8; 5]);
        assert!(matches!(
            decrypt(&env, "pw"),
            Err(EnvelopeError::Malformed(_))
        ));

        env.iv = "***".to_string();
        assert!(matches!(
            decrypt(&env, "pw"),
            Err(EnvelopeError::Malformed(_))
        ));
    }
}
