//! Identity-based time-lock cipher.
//!
//! ```text
//! r  = H3(sigma, msg)
//! C1 = r·g2
//! C2 = sigma ⊕ H2(e(H1(id), eon_key)^r)
//! C3 = pad(msg) ⊕ H4(sigma)
//! ```
//!
//! Decryption with `dk = x·H1(id)` uses `e(dk, C1) = e(H1(id), eon_key)^r`.

use std::fmt;
use std::str::FromStr;

use ark_bls12_381::{Bls12_381, G2Affine};
use ark_ec::{AffineRepr, CurveGroup, pairing::Pairing};
use ark_serialize::CanonicalDeserialize;
use rand::RngCore;

use crate::error::ThresholdError;
use crate::hash::{gt_mask, hash_identity, keystream, message_scalar};
use crate::keys::{DecryptionKey, EonKey, Identity, compress, decode_hex};

/// Wire version tag of the current ciphertext format
pub const VERSION_TAG: u8 = 0x03;
/// Packet keys are 32-byte secrets
pub const SECRET_LEN: usize = 32;

const C1_LEN: usize = 96;
const C2_LEN: usize = 32;
const BLOCK_LEN: usize = 32;

/// tag + C1 + C2 + one C3 block
pub const MIN_CIPHERTEXT_LEN: usize = 1 + C1_LEN + C2_LEN + BLOCK_LEN;

#[derive(Clone, PartialEq, Eq)]
pub struct ThresholdCiphertext {
    c1: G2Affine,
    c2: [u8; C2_LEN],
    c3: Vec<u8>,
}

impl ThresholdCiphertext {
    /// Parse the tagged wire form. Checks tag and length before touching
    /// the curve point.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ThresholdError> {
        let Some(&tag) = bytes.first() else {
            return Err(ThresholdError::InvalidLength {
                got: 0,
                min: MIN_CIPHERTEXT_LEN,
            });
        };
        if tag != VERSION_TAG {
            return Err(ThresholdError::InvalidVersion(tag));
        }
        let body_len = bytes.len().saturating_sub(1 + C1_LEN + C2_LEN);
        if bytes.len() < MIN_CIPHERTEXT_LEN || body_len % BLOCK_LEN != 0 {
            return Err(ThresholdError::InvalidLength {
                got: bytes.len(),
                min: MIN_CIPHERTEXT_LEN,
            });
        }

        let c1 = G2Affine::deserialize_compressed(&bytes[1..1 + C1_LEN])
            .map_err(|_| ThresholdError::InvalidPoint("C1"))?;
        let mut c2 = [0u8; C2_LEN];
        c2.copy_from_slice(&bytes[1 + C1_LEN..1 + C1_LEN + C2_LEN]);
        let c3 = bytes[1 + C1_LEN + C2_LEN..].to_vec();

        Ok(Self { c1, c2, c3 })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + C1_LEN + C2_LEN + self.c3.len());
        out.push(VERSION_TAG);
        out.extend_from_slice(&compress(&self.c1));
        out.extend_from_slice(&self.c2);
        out.extend_from_slice(&self.c3);
        out
    }

    /// `0x`-prefixed hex, the form carried in links
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    /// Length of the wire form in bytes
    pub fn len(&self) -> usize {
        1 + C1_LEN + C2_LEN + self.c3.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for ThresholdCiphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ThresholdCiphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ThresholdCiphertext({} bytes)", self.len())
    }
}

impl FromStr for ThresholdCiphertext {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(&decode_hex(s)?)
    }
}

fn pad(msg: &[u8]) -> Vec<u8> {
    let n = BLOCK_LEN - msg.len() % BLOCK_LEN;
    let mut out = Vec::with_capacity(msg.len() + n);
    out.extend_from_slice(msg);
    out.resize(msg.len() + n, n as u8);
    out
}

fn unpad(mut padded: Vec<u8>) -> Result<Vec<u8>, ThresholdError> {
    let n = *padded.last().ok_or(ThresholdError::DecryptionFailed)? as usize;
    if n == 0 || n > BLOCK_LEN || n > padded.len() {
        return Err(ThresholdError::DecryptionFailed);
    }
    if padded[padded.len() - n..].iter().any(|&b| b as usize != n) {
        return Err(ThresholdError::DecryptionFailed);
    }
    padded.truncate(padded.len() - n);
    Ok(padded)
}

fn xor_in_place(dst: &mut [u8], mask: &[u8]) {
    for (d, m) in dst.iter_mut().zip(mask) {
        *d ^= m;
    }
}

/// Encrypt a 32-byte packet secret to `(identity, eon_key)`.
pub fn encrypt(
    secret: &[u8],
    identity: &Identity,
    eon_key: &EonKey,
    sigma: Option<[u8; 32]>,
) -> Result<ThresholdCiphertext, ThresholdError> {
    if secret.len() != SECRET_LEN {
        return Err(ThresholdError::InvalidSecretLength(secret.len()));
    }
    encrypt_message(secret, identity, eon_key, sigma)
}

/// Encrypt an arbitrary-length message. Used by the legacy time-lock
/// endpoint, which carries UTF-8 key strings rather than raw keys.
pub fn encrypt_message(
    msg: &[u8],
    identity: &Identity,
    eon_key: &EonKey,
    sigma: Option<[u8; 32]>,
) -> Result<ThresholdCiphertext, ThresholdError> {
    let sigma = sigma.unwrap_or_else(|| {
        let mut s = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut s);
        s
    });

    let h_id = hash_identity(identity)?;
    let r = message_scalar(&sigma, msg);

    let c1 = (G2Affine::generator() * r).into_affine();

    let shared = Bls12_381::pairing((h_id * r).into_affine(), eon_key.0);
    let mut c2 = sigma;
    xor_in_place(&mut c2, &gt_mask(&shared));

    let mut c3 = pad(msg);
    let stream = keystream(&sigma, c3.len());
    xor_in_place(&mut c3, &stream);

    Ok(ThresholdCiphertext { c1, c2, c3 })
}

/// Decrypt with the identity's released decryption key.
///
/// Fails with [`ThresholdError::DecryptionFailed`] when the key belongs to a
/// different identity or eon, or the ciphertext was tampered with.
pub fn decrypt(ct: &ThresholdCiphertext, key: &DecryptionKey) -> Result<Vec<u8>, ThresholdError> {
    let shared = Bls12_381::pairing(key.0, ct.c1);
    let mut sigma = ct.c2;
    xor_in_place(&mut sigma, &gt_mask(&shared));

    let mut padded = ct.c3.clone();
    let stream = keystream(&sigma, padded.len());
    xor_in_place(&mut padded, &stream);
    let msg = unpad(padded)?;

    let r = message_scalar(&sigma, &msg);
    if (G2Affine::generator() * r).into_affine() != ct.c1 {
        return Err(ThresholdError::DecryptionFailed);
    }

    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyper::{KeyperConfig, KeyperSet};

    fn setup() -> (KeyperSet, Identity) {
        let keypers = KeyperSet::generate(KeyperConfig::new(2, 3)).unwrap();
        let id: Identity = "0x0102030405060708".parse().unwrap();
        (keypers, id)
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let (keypers, id) = setup();
        let secret = [0x42u8; 32];

        let ct = encrypt(&secret, &id, &keypers.eon_key(), None).unwrap();
        assert_eq!(ct.len(), 1 + 96 + 32 + 64);

        let dk = keypers.decryption_key(&id).unwrap();
        assert_eq!(decrypt(&ct, &dk).unwrap(), secret.to_vec());
    }

    #[test]
    fn test_wire_roundtrip_via_hex() {
        let (keypers, id) = setup();
        let ct = encrypt(&[9u8; 32], &id, &keypers.eon_key(), None).unwrap();

        let hex = ct.to_hex();
        assert!(hex.starts_with("0x03"));
        let parsed: ThresholdCiphertext = hex.parse().unwrap();
        assert_eq!(parsed, ct);
    }

    #[test]
    fn test_fixed_sigma_is_deterministic() {
        let (keypers, id) = setup();
        let sigma = Some([5u8; 32]);
        let a = encrypt(&[1u8; 32], &id, &keypers.eon_key(), sigma).unwrap();
        let b = encrypt(&[1u8; 32], &id, &keypers.eon_key(), sigma).unwrap();
        assert_eq!(a, b);

        let c = encrypt(&[1u8; 32], &id, &keypers.eon_key(), None).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_wrong_identity_key_fails() {
        let (keypers, id) = setup();
        let ct = encrypt(&[3u8; 32], &id, &keypers.eon_key(), None).unwrap();

        let other: Identity = "0xffff".parse().unwrap();
        let wrong = keypers.decryption_key(&other).unwrap();
        assert_eq!(decrypt(&ct, &wrong), Err(ThresholdError::DecryptionFailed));
    }

    #[test]
    fn test_secret_length_enforced() {
        let (keypers, id) = setup();
        assert_eq!(
            encrypt(&[0u8; 31], &id, &keypers.eon_key(), None),
            Err(ThresholdError::InvalidSecretLength(31))
        );
    }

    #[test]
    fn test_message_of_any_length() {
        let (keypers, id) = setup();
        let dk = keypers.decryption_key(&id).unwrap();
        for msg in [&b""[..], b"short", &[7u8; 100][..]] {
            let ct = encrypt_message(msg, &id, &keypers.eon_key(), None).unwrap();
            assert_eq!(decrypt(&ct, &dk).unwrap(), msg.to_vec());
        }
    }

    #[test]
    fn test_parse_rejects_bad_tag_and_length() {
        let mut bytes = vec![0u8; MIN_CIPHERTEXT_LEN];
        bytes[0] = 0x02;
        assert_eq!(
            ThresholdCiphertext::from_bytes(&bytes),
            Err(ThresholdError::InvalidVersion(0x02))
        );

        let short = vec![VERSION_TAG; MIN_CIPHERTEXT_LEN - 1];
        assert!(matches!(
            ThresholdCiphertext::from_bytes(&short),
            Err(ThresholdError::InvalidLength { .. })
        ));

        let misaligned = vec![VERSION_TAG; MIN_CIPHERTEXT_LEN + 5];
        assert!(matches!(
            ThresholdCiphertext::from_bytes(&misaligned),
            Err(ThresholdError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let (keypers, id) = setup();
        let ct = encrypt(&[8u8; 32], &id, &keypers.eon_key(), None).unwrap();
        let mut bytes = ct.to_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = ThresholdCiphertext::from_bytes(&bytes).unwrap();

        let dk = keypers.decryption_key(&id).unwrap();
        assert_eq!(decrypt(&tampered, &dk), Err(ThresholdError::DecryptionFailed));
    }

    #[test]
    fn test_pad_unpad() {
        assert_eq!(pad(&[1u8; 32]).len(), 64);
        assert_eq!(pad(&[]).len(), 32);
        assert_eq!(unpad(pad(b"abc")).unwrap(), b"abc".to_vec());
        assert!(unpad(vec![0u8; 32]).is_err());
    }
}
