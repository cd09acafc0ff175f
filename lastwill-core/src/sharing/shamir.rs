//! Threshold secret sharing over the prime field.
//!
//! `split` hides a secret of up to 32 bytes in the constant term of a random
//! polynomial of degree `threshold - 1` and hands out its values at
//! `x = 1..=total_shares`. `reconstruct` interpolates the supplied points at
//! `x = 0`.
//!
//! Supplying fewer shares than the original threshold does not fail: the
//! interpolation simply lands on a different value. The threshold is not
//! recorded in the shares, so callers have to know it out of band. Shares are
//! also not authenticated; a single corrupted share yields a wrong secret
//! rather than an error.

use std::collections::HashSet;

use num_bigint::{BigInt, BigUint};
use num_traits::{One, Zero};
use tracing::debug;

use super::field::{self, evaluate, mod_inverse, random_element};
use super::share::{SecretShare, MAX_SECRET_LEN, MAX_SHARES, SHARE_LEN};
use crate::error::{LastWillError, ReconstructionError, Result};

/// Split `secret` into `total_shares` shares, any `threshold` of which recover it.
///
/// # Errors
/// Returns a `Validation` error when the secret is empty or longer than 32
/// bytes, when `2 <= threshold <= total_shares <= 255` does not hold, or when
/// the secret read as a big-endian integer is not below the field modulus.
pub fn split(secret: &[u8], total_shares: usize, threshold: usize) -> Result<Vec<SecretShare>> {
    if secret.is_empty() {
        return Err(LastWillError::Validation("Secret must not be empty".into()));
    }
    if secret.len() > MAX_SECRET_LEN {
        return Err(LastWillError::Validation(format!(
            "Secret must be at most {} bytes, got {}",
            MAX_SECRET_LEN,
            secret.len()
        )));
    }
    if threshold < 2 {
        return Err(LastWillError::Validation(format!(
            "Threshold must be at least 2, got {}",
            threshold
        )));
    }
    if threshold > total_shares {
        return Err(LastWillError::Validation(format!(
            "Threshold {} exceeds total shares {}",
            threshold, total_shares
        )));
    }
    if total_shares > MAX_SHARES {
        return Err(LastWillError::Validation(format!(
            "At most {} shares are supported, got {}",
            MAX_SHARES, total_shares
        )));
    }

    let secret_value = field::element_from_bytes(secret).ok_or_else(|| {
        LastWillError::Validation("Secret must be smaller than the field modulus".into())
    })?;

    // Constant term is the secret; the rest are uniform field elements.
    let mut coefficients = Vec::with_capacity(threshold);
    coefficients.push(secret_value);
    coefficients.extend((1..threshold).map(|_| random_element()));

    // Both bounds were checked above, so the casts are lossless.
    let secret_len = secret.len() as u8;
    let shares = (1..=total_shares as u8)
        .map(|x| SecretShare::new(x, secret_len, evaluate(&coefficients, &BigUint::from(x))))
        .collect();

    debug!(
        "Split {}-byte secret into {} shares (threshold {})",
        secret.len(),
        total_shares,
        threshold
    );
    Ok(shares)
}

/// Split and serialize each share into the 34-byte wire format.
pub fn split_to_bytes(
    secret: &[u8],
    total_shares: usize,
    threshold: usize,
) -> Result<Vec<[u8; SHARE_LEN]>> {
    Ok(split(secret, total_shares, threshold)?
        .iter()
        .map(SecretShare::to_bytes)
        .collect())
}

/// Recover a secret from serialized shares.
///
/// Every supplied share takes part in the interpolation, so handing over
/// more shares than the threshold still yields the secret.
///
/// # Errors
/// Returns a `Reconstruction` error for fewer than two shares, a share that
/// is not 34 bytes, a share with index 0, duplicate indices, or shares that
/// disagree on the recorded secret length. Nothing is reconstructed in
/// those cases.
pub fn reconstruct<S: AsRef<[u8]>>(shares: &[S]) -> Result<Vec<u8>> {
    if shares.len() < 2 {
        return Err(ReconstructionError::TooFewShares(shares.len()).into());
    }

    let parsed = shares
        .iter()
        .map(|s| SecretShare::from_bytes(s.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    reconstruct_shares(&parsed)
}

/// Recover a secret from already parsed shares.
pub fn reconstruct_shares(shares: &[SecretShare]) -> Result<Vec<u8>> {
    if shares.len() < 2 {
        return Err(ReconstructionError::TooFewShares(shares.len()).into());
    }

    let mut seen = HashSet::with_capacity(shares.len());
    for share in shares {
        if share.index() == 0 {
            return Err(ReconstructionError::InvalidIndex.into());
        }
        if !seen.insert(share.index()) {
            return Err(ReconstructionError::DuplicateIndex(share.index()).into());
        }
    }

    let secret_len = shares[0].secret_len();
    if shares.iter().any(|s| s.secret_len() != secret_len) {
        return Err(ReconstructionError::InconsistentLength.into());
    }
    if secret_len == 0 || secret_len as usize > MAX_SECRET_LEN {
        return Err(ReconstructionError::InvalidSecretLength(secret_len).into());
    }

    let points: Vec<(BigInt, BigInt)> = shares
        .iter()
        .map(|s| (BigInt::from(s.index()), BigInt::from(s.value().clone())))
        .collect();

    let value = interpolate_at_zero(&points)?;
    debug!("Reconstructed secret from {} shares", shares.len());
    Ok(decode_secret(&value, secret_len as usize))
}

/// Check whether a set of shares reconstructs without error.
///
/// Used as a pre-flight before unlock attempts. A `true` result only means
/// the shares are well formed and consistent; it cannot tell whether enough
/// of them were supplied.
pub fn verify<S: AsRef<[u8]>>(shares: &[S]) -> bool {
    reconstruct(shares).is_ok()
}

/// Lagrange interpolation at x = 0.
fn interpolate_at_zero(points: &[(BigInt, BigInt)]) -> Result<BigUint> {
    let p = field::signed_modulus();
    let mut secret = BigInt::zero();

    for (i, (xi, yi)) in points.iter().enumerate() {
        let mut numerator = BigInt::one();
        let mut denominator = BigInt::one();

        for (j, (xj, _)) in points.iter().enumerate() {
            if i == j {
                continue;
            }
            numerator = field::reduce_signed(&(numerator * -xj));
            denominator = field::reduce_signed(&(denominator * (xi - xj)));
        }

        let inverse = mod_inverse(&denominator, p).ok_or(ReconstructionError::NotInvertible)?;
        let coefficient = field::reduce_signed(&(numerator * BigInt::from(inverse)));
        secret = field::reduce_signed(&(secret + coefficient * yi));
    }

    Ok(field::reduce(&secret))
}

/// Render a field element as exactly `len` big-endian bytes.
///
/// Extra high-order bytes are dropped and short values are zero-padded on
/// the left, so secrets with leading zero bytes survive the round trip.
fn decode_secret(value: &BigUint, len: usize) -> Vec<u8> {
    let raw = value.to_bytes_be();
    if raw.len() >= len {
        raw[raw.len() - len..].to_vec()
    } else {
        let mut out = vec![0u8; len - raw.len()];
        out.extend_from_slice(&raw);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pick(shares: &[[u8; SHARE_LEN]], indices: &[u8]) -> Vec<[u8; SHARE_LEN]> {
        indices
            .iter()
            .map(|i| shares[(*i - 1) as usize])
            .collect()
    }

    fn sample_secret(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(37).wrapping_add(11)).collect()
    }

    #[test]
    fn test_sixteen_byte_secret_three_of_five() {
        let secret = sample_secret(16);
        let shares = split_to_bytes(&secret, 5, 3).unwrap();
        assert_eq!(shares.len(), 5);

        assert_eq!(reconstruct(&pick(&shares, &[1, 3, 5])).unwrap(), secret);
        assert_eq!(reconstruct(&pick(&shares, &[2, 4, 5])).unwrap(), secret);

        // Below threshold: silently wrong, not an error.
        let wrong = reconstruct(&pick(&shares, &[1, 3])).unwrap();
        assert_eq!(wrong.len(), 16);
        assert_ne!(wrong, secret);
    }

    #[test]
    fn test_every_threshold_subset_reconstructs() {
        let secret = sample_secret(32);
        let shares = split_to_bytes(&secret, 5, 3).unwrap();

        for a in 1..=5u8 {
            for b in (a + 1)..=5 {
                for c in (b + 1)..=5 {
                    let subset = pick(&shares, &[a, b, c]);
                    assert_eq!(reconstruct(&subset).unwrap(), secret, "subset {a},{b},{c}");
                }
            }
        }
    }

    #[test]
    fn test_oversupplied_shares_reconstruct() {
        let secret = sample_secret(20);
        let shares = split_to_bytes(&secret, 7, 3).unwrap();

        assert_eq!(reconstruct(&pick(&shares, &[1, 2, 3, 4])).unwrap(), secret);
        assert_eq!(reconstruct(&shares).unwrap(), secret);
    }

    #[test]
    fn test_various_lengths_and_thresholds() {
        for len in [1usize, 2, 8, 31, 32] {
            let mut secret = sample_secret(len);
            secret[0] &= 0x7f;
            for (n, k) in [(2usize, 2usize), (3, 2), (6, 4), (10, 10)] {
                let shares = split_to_bytes(&secret, n, k).unwrap();
                assert_eq!(reconstruct(&shares[..k]).unwrap(), secret, "len {len} n {n} k {k}");
                assert_eq!(reconstruct(&shares[n - k..]).unwrap(), secret);
            }
        }
    }

    #[test]
    fn test_leading_zero_bytes_survive() {
        let secret = vec![0u8, 0, 0, 1, 2, 3];
        let shares = split_to_bytes(&secret, 3, 2).unwrap();
        assert_eq!(reconstruct(&shares[1..]).unwrap(), secret);

        let zeros = vec![0u8; 12];
        let shares = split_to_bytes(&zeros, 4, 3).unwrap();
        assert_eq!(reconstruct(&shares[..3]).unwrap(), zeros);
    }

    #[test]
    fn test_maximum_share_count() {
        let secret = sample_secret(16);
        let shares = split_to_bytes(&secret, 255, 3).unwrap();
        assert_eq!(shares.len(), 255);
        assert_eq!(shares[254][0], 255);
        assert!(shares.iter().all(|s| s[0] != 0));
        assert_eq!(reconstruct(&pick(&shares, &[253, 254, 255])).unwrap(), secret);
    }

    #[test]
    fn test_split_is_randomized() {
        let secret = sample_secret(16);
        let first = split_to_bytes(&secret, 5, 3).unwrap();
        let second = split_to_bytes(&secret, 5, 3).unwrap();

        assert_ne!(first, second);
        assert_eq!(reconstruct(&first[..3]).unwrap(), secret);
        assert_eq!(reconstruct(&second[2..]).unwrap(), secret);
    }

    #[test]
    fn test_share_header_bytes() {
        let secret = sample_secret(16);
        let shares = split_to_bytes(&secret, 4, 2).unwrap();
        for (i, share) in shares.iter().enumerate() {
            assert_eq!(share[0] as usize, i + 1);
            assert_eq!(share[1], 16);
        }
    }

    #[test]
    fn test_split_validation() {
        let secret = sample_secret(16);

        let cases: [(&[u8], usize, usize, &str); 6] = [
            (&[][..], 5, 3, "empty"),
            (secret.as_slice(), 5, 1, "at least 2"),
            (secret.as_slice(), 3, 4, "exceeds total"),
            (secret.as_slice(), 256, 3, "255"),
            (&[1u8; 33][..], 5, 3, "at most 32"),
            (&[0xffu8; 32][..], 5, 3, "modulus"),
        ];

        for (input, n, k, needle) in cases {
            match split(input, n, k) {
                Err(LastWillError::Validation(msg)) => {
                    assert!(msg.contains(needle), "{msg:?} should mention {needle:?}")
                }
                other => panic!("expected validation error, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_duplicate_share_rejected() {
        let shares = split_to_bytes(&sample_secret(16), 5, 3).unwrap();
        let dup = vec![shares[0], shares[1], shares[0]];

        let err = reconstruct(&dup).unwrap_err();
        assert!(matches!(
            err,
            LastWillError::Reconstruction(ReconstructionError::DuplicateIndex(1))
        ));
    }

    #[test]
    fn test_inconsistent_secret_length_rejected() {
        let shares = split_to_bytes(&sample_secret(16), 5, 3).unwrap();
        let mut tampered = pick(&shares, &[1, 2, 3]);
        tampered[2][1] = 15;

        let err = reconstruct(&tampered).unwrap_err();
        assert!(matches!(
            err,
            LastWillError::Reconstruction(ReconstructionError::InconsistentLength)
        ));
    }

    #[test]
    fn test_index_zero_rejected() {
        let shares = split_to_bytes(&sample_secret(16), 3, 2).unwrap();
        let mut tampered = pick(&shares, &[1, 2]);
        tampered[0][0] = 0;

        let err = reconstruct(&tampered).unwrap_err();
        assert!(matches!(
            err,
            LastWillError::Reconstruction(ReconstructionError::InvalidIndex)
        ));
    }

    #[test]
    fn test_malformed_inputs_rejected() {
        let shares = split_to_bytes(&sample_secret(16), 3, 2).unwrap();

        let one: Vec<[u8; SHARE_LEN]> = vec![shares[0]];
        assert!(matches!(
            reconstruct(&one).unwrap_err(),
            LastWillError::Reconstruction(ReconstructionError::TooFewShares(1))
        ));

        let short: Vec<Vec<u8>> = vec![shares[0].to_vec(), shares[1][..30].to_vec()];
        assert!(matches!(
            reconstruct(&short).unwrap_err(),
            LastWillError::Reconstruction(ReconstructionError::MalformedShare(30))
        ));

        let mut zero_len = pick(&shares, &[1, 2]);
        zero_len[0][1] = 0;
        zero_len[1][1] = 0;
        assert!(matches!(
            reconstruct(&zero_len).unwrap_err(),
            LastWillError::Reconstruction(ReconstructionError::InvalidSecretLength(0))
        ));
    }

    #[test]
    fn test_verify() {
        let shares = split_to_bytes(&sample_secret(16), 5, 3).unwrap();
        assert!(verify(&shares[..3]));
        assert!(!verify(&[shares[0], shares[0]]));
        assert!(!verify(&shares[..1]));
    }
}
