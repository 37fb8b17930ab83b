//! Shamir Secret Sharing over the BLS12-381 scalar field
//!
//! Splits the eon secret K-of-N among keypers. Reconstruction only ever
//! happens "in the exponent" (see [`crate::keyper`]), but scalar
//! reconstruction is kept for tests and tooling.

use std::collections::HashSet;

use ark_bls12_381::Fr;
use ark_ff::{Field, PrimeField};
use rand::RngCore;

use crate::error::ThresholdError;

/// A scalar share (index is 1-based, the polynomial is evaluated there)
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ScalarShare {
    pub index: u32,
    pub value: Fr,
}

impl std::fmt::Debug for ScalarShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalarShare")
            .field("index", &self.index)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Uniformly random scalar (wide reduction of 64 random bytes)
pub fn random_scalar() -> Fr {
    let mut wide = [0u8; 64];
    rand::thread_rng().fill_bytes(&mut wide);
    Fr::from_le_bytes_mod_order(&wide)
}

pub(crate) fn check_threshold(threshold: usize, total: usize) -> Result<(), ThresholdError> {
    if threshold == 0 || total == 0 || threshold > total || total > 255 {
        return Err(ThresholdError::InvalidThreshold {
            k: threshold,
            n: total,
        });
    }
    Ok(())
}

/// Split a secret into N shares, any K of which reconstruct it
///
/// f(x) = secret + a1*x + ... + a_{k-1}*x^{k-1}, share i = f(i)
pub fn split_scalar(
    secret: Fr,
    threshold: usize,
    total: usize,
) -> Result<Vec<ScalarShare>, ThresholdError> {
    check_threshold(threshold, total)?;

    let mut coeffs = Vec::with_capacity(threshold);
    coeffs.push(secret);
    for _ in 1..threshold {
        coeffs.push(random_scalar());
    }

    let shares = (1..=total as u32)
        .map(|index| {
            let x = Fr::from(index as u64);
            // Horner
            let value = coeffs
                .iter()
                .rev()
                .fold(Fr::from(0u64), |acc, c| acc * x + c);
            ScalarShare { index, value }
        })
        .collect();

    Ok(shares)
}

/// Lagrange coefficients at x = 0 for the given share indices
pub fn lagrange_at_zero(indices: &[u32]) -> Result<Vec<Fr>, ThresholdError> {
    let mut seen = HashSet::with_capacity(indices.len());
    for &i in indices {
        if i == 0 || !seen.insert(i) {
            return Err(ThresholdError::DuplicateShare(i));
        }
    }

    indices
        .iter()
        .map(|&i| {
            let xi = Fr::from(i as u64);
            let mut numerator = Fr::from(1u64);
            let mut denominator = Fr::from(1u64);
            for &j in indices.iter().filter(|&&j| j != i) {
                let xj = Fr::from(j as u64);
                // L_i(0) = prod xj / (xj - xi)
                numerator *= xj;
                denominator *= xj - xi;
            }
            denominator
                .inverse()
                .map(|inv| numerator * inv)
                .ok_or(ThresholdError::DuplicateShare(i))
        })
        .collect()
}

/// Reconstruct the secret from at least K shares
pub fn combine_scalar(shares: &[ScalarShare], threshold: usize) -> Result<Fr, ThresholdError> {
    if shares.len() < threshold || threshold == 0 {
        return Err(ThresholdError::InsufficientShares {
            got: shares.len(),
            need: threshold,
        });
    }

    let shares = &shares[..threshold];
    let indices: Vec<u32> = shares.iter().map(|s| s.index).collect();
    let coeffs = lagrange_at_zero(&indices)?;

    Ok(shares
        .iter()
        .zip(coeffs)
        .fold(Fr::from(0u64), |acc, (share, l)| acc + share.value * l))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_and_combine() {
        let secret = random_scalar();
        let threshold = 3;
        let total = 5;

        let shares = split_scalar(secret, threshold, total).unwrap();
        assert_eq!(shares.len(), total);

        let recovered = combine_scalar(&shares[0..3], threshold).unwrap();
        assert_eq!(recovered, secret);

        let recovered2 = combine_scalar(&shares[2..5], threshold).unwrap();
        assert_eq!(recovered2, secret);

        let mixed = [shares[4], shares[0], shares[2]];
        assert_eq!(combine_scalar(&mixed, threshold).unwrap(), secret);
    }

    #[test]
    fn test_below_threshold_gives_wrong_secret() {
        let secret = random_scalar();
        let shares = split_scalar(secret, 3, 5).unwrap();

        // two shares interpolate a line, not the degree-2 polynomial
        let wrong = combine_scalar(&shares[0..2], 2).unwrap();
        assert_ne!(wrong, secret);
    }

    #[test]
    fn test_insufficient_shares() {
        let shares = split_scalar(random_scalar(), 3, 5).unwrap();

        let result = combine_scalar(&shares[0..2], 3);
        assert!(matches!(
            result,
            Err(ThresholdError::InsufficientShares { got: 2, need: 3 })
        ));
    }

    #[test]
    fn test_duplicate_indices_rejected() {
        let shares = split_scalar(random_scalar(), 2, 3).unwrap();
        let dup = [shares[1], shares[1]];
        assert_eq!(
            combine_scalar(&dup, 2),
            Err(ThresholdError::DuplicateShare(2))
        );
    }

    #[test]
    fn test_invalid_threshold() {
        let secret = random_scalar();

        // k > n
        assert!(split_scalar(secret, 5, 3).is_err());

        // k = 0
        assert!(split_scalar(secret, 0, 3).is_err());

        // n = 0
        assert!(split_scalar(secret, 3, 0).is_err());
    }

    #[test]
    fn test_one_of_one() {
        let secret = random_scalar();
        let shares = split_scalar(secret, 1, 1).unwrap();
        assert_eq!(shares[0].value, secret);
    }
}
