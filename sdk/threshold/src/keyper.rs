//! Keyper Committee
//!
//! Holds the Shamir-split eon secret. Each keyper releases a decryption share
//! `x_i·H1(id)` for an identity; K shares combine into `x·H1(id)` without the
//! eon secret ever being reassembled.

use std::collections::HashSet;

use ark_bls12_381::{Bls12_381, Fr, G1Affine, G1Projective, G2Affine};
use ark_ec::{AffineRepr, CurveGroup, pairing::Pairing};
use serde::{Deserialize, Serialize};

use crate::error::ThresholdError;
use crate::hash::hash_identity;
use crate::keys::{DecryptionKey, EonKey, Identity};
use crate::shares::{ScalarShare, check_threshold, lagrange_at_zero, random_scalar, split_scalar};

/// Committee configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyperConfig {
    /// Threshold K: minimum keypers needed to release a key
    pub threshold: usize,
    /// Total keypers N
    pub total_keypers: usize,
    /// Eon number (for key rotation)
    pub eon: u64,
}

impl KeyperConfig {
    pub fn new(threshold: usize, total_keypers: usize) -> Self {
        Self {
            threshold,
            total_keypers,
            eon: 0,
        }
    }

    /// Check if config is valid
    pub fn is_valid(&self) -> bool {
        check_threshold(self.threshold, self.total_keypers).is_ok()
    }
}

/// A decryption share released by one keyper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecryptionShare {
    pub index: u32,
    pub point: G1Affine,
}

/// A keyper holding one share of the eon secret
#[derive(Clone)]
pub struct Keyper {
    share: ScalarShare,
}

impl std::fmt::Debug for Keyper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyper")
            .field("index", &self.share.index)
            .finish_non_exhaustive()
    }
}

impl Keyper {
    pub fn index(&self) -> u32 {
        self.share.index
    }

    /// This keyper's share of the identity's decryption key
    pub fn decryption_share(&self, identity: &Identity) -> Result<DecryptionShare, ThresholdError> {
        let h_id = hash_identity(identity)?;
        Ok(DecryptionShare {
            index: self.share.index,
            point: (h_id * self.share.value).into_affine(),
        })
    }
}

/// A full committee, run in one process (dev registry and tests)
#[derive(Debug, Clone)]
pub struct KeyperSet {
    config: KeyperConfig,
    eon_key: EonKey,
    keypers: Vec<Keyper>,
}

impl KeyperSet {
    /// Deal a fresh eon secret to N keypers
    pub fn generate(config: KeyperConfig) -> Result<Self, ThresholdError> {
        Self::from_secret(config, random_scalar())
    }

    pub fn from_secret(config: KeyperConfig, secret: Fr) -> Result<Self, ThresholdError> {
        let shares = split_scalar(secret, config.threshold, config.total_keypers)?;
        let eon_key = EonKey((G2Affine::generator() * secret).into_affine());
        let keypers = shares.into_iter().map(|share| Keyper { share }).collect();
        Ok(Self {
            config,
            eon_key,
            keypers,
        })
    }

    pub fn config(&self) -> &KeyperConfig {
        &self.config
    }

    pub fn eon_key(&self) -> EonKey {
        self.eon_key
    }

    pub fn keypers(&self) -> &[Keyper] {
        &self.keypers
    }

    /// Collect K shares and combine them into the identity's key
    pub fn decryption_key(&self, identity: &Identity) -> Result<DecryptionKey, ThresholdError> {
        let shares = self
            .keypers
            .iter()
            .take(self.config.threshold)
            .map(|k| k.decryption_share(identity))
            .collect::<Result<Vec<_>, _>>()?;
        combine_decryption_shares(&shares, self.config.threshold)
    }
}

/// Lagrange interpolation in the exponent over the first K shares
pub fn combine_decryption_shares(
    shares: &[DecryptionShare],
    threshold: usize,
) -> Result<DecryptionKey, ThresholdError> {
    if shares.len() < threshold || threshold == 0 {
        return Err(ThresholdError::InsufficientShares {
            got: shares.len(),
            need: threshold,
        });
    }

    let mut seen = HashSet::new();
    let shares: Vec<&DecryptionShare> = shares
        .iter()
        .filter(|s| seen.insert(s.index))
        .take(threshold)
        .collect();
    if shares.len() < threshold {
        return Err(ThresholdError::InsufficientShares {
            got: shares.len(),
            need: threshold,
        });
    }

    let indices: Vec<u32> = shares.iter().map(|s| s.index).collect();
    let coeffs = lagrange_at_zero(&indices)?;

    let combined: G1Projective = shares
        .iter()
        .zip(coeffs)
        .map(|(share, l)| share.point * l)
        .sum();

    Ok(DecryptionKey(combined.into_affine()))
}

/// Check `e(dk, g2) == e(H1(id), eon_key)`
pub fn verify_decryption_key(
    eon_key: &EonKey,
    identity: &Identity,
    key: &DecryptionKey,
) -> Result<bool, ThresholdError> {
    let h_id = hash_identity(identity)?;
    let lhs = Bls12_381::pairing(key.0, G2Affine::generator());
    let rhs = Bls12_381::pairing(h_id, eon_key.0);
    Ok(lhs == rhs)
}
