//! Hash functions of the time-lock scheme.
//!
//! H1 maps identities into G1, H2 masks a pairing output, H3 derives the
//! encryption scalar and H4 expands sigma into a keystream.

use ark_bls12_381::{Bls12_381, Fr, G1Affine, G1Projective};
use ark_ec::hashing::{
    HashToCurve, curve_maps::wb::WBMap, map_to_curve_hasher::MapToCurveBasedHasher,
};
use ark_ec::pairing::PairingOutput;
use ark_ff::{PrimeField, field_hashers::DefaultFieldHasher};
use sha2::Sha256;

use crate::error::ThresholdError;
use crate::keys::{Identity, compress};

pub const IDENTITY_DST: &[u8] = b"HONGBAO_TIMELOCK_V1_BLS12381G1_XMD:SHA-256_SSWU_RO_";

const GT_MASK_CONTEXT: &str = "hongbao-timelock-v1 gt-mask";
const SCALAR_CONTEXT: &str = "hongbao-timelock-v1 scalar";
const KEYSTREAM_CONTEXT: &str = "hongbao-timelock-v1 keystream";

type IdentityHasher = MapToCurveBasedHasher<
    G1Projective,
    DefaultFieldHasher<Sha256, 128>,
    WBMap<ark_bls12_381::g1::Config>,
>;

/// H1: identity to G1
pub fn hash_identity(identity: &Identity) -> Result<G1Affine, ThresholdError> {
    if identity.as_bytes().is_empty() {
        return Err(ThresholdError::EmptyIdentity);
    }
    let hasher =
        IdentityHasher::new(IDENTITY_DST).map_err(|_| ThresholdError::HashToCurve)?;
    hasher
        .hash(identity.as_bytes())
        .map_err(|_| ThresholdError::HashToCurve)
}

/// H2: pairing output to a 32-byte mask
pub fn gt_mask(gt: &PairingOutput<Bls12_381>) -> [u8; 32] {
    blake3::derive_key(GT_MASK_CONTEXT, &compress(gt))
}

/// H3: (sigma, message) to the encryption scalar
pub fn message_scalar(sigma: &[u8; 32], message: &[u8]) -> Fr {
    let mut hasher = blake3::Hasher::new_derive_key(SCALAR_CONTEXT);
    hasher.update(sigma);
    hasher.update(message);
    let mut wide = [0u8; 64];
    hasher.finalize_xof().fill(&mut wide);
    Fr::from_le_bytes_mod_order(&wide)
}

/// H4: sigma to a keystream of `len` bytes
pub fn keystream(sigma: &[u8; 32], len: usize) -> Vec<u8> {
    let mut hasher = blake3::Hasher::new_derive_key(KEYSTREAM_CONTEXT);
    hasher.update(sigma);
    let mut out = vec![0u8; len];
    hasher.finalize_xof().fill(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_identity_deterministic() {
        let id = Identity::from_bytes(b"release-1767225600".to_vec()).unwrap();
        let a = hash_identity(&id).unwrap();
        let b = hash_identity(&id).unwrap();
        assert_eq!(a, b);

        let other = Identity::from_bytes(b"release-1767225601".to_vec()).unwrap();
        assert_ne!(a, hash_identity(&other).unwrap());
    }

    #[test]
    fn test_message_scalar_binds_both_inputs() {
        let sigma = [7u8; 32];
        let a = message_scalar(&sigma, b"one");
        assert_eq!(a, message_scalar(&sigma, b"one"));
        assert_ne!(a, message_scalar(&sigma, b"two"));
        assert_ne!(a, message_scalar(&[8u8; 32], b"one"));
    }

    #[test]
    fn test_keystream_prefix_stable() {
        let sigma = [1u8; 32];
        let short = keystream(&sigma, 32);
        let long = keystream(&sigma, 64);
        assert_eq!(&long[..32], &short[..]);
    }
}
