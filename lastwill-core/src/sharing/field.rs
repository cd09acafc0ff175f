//! Arithmetic over the prime field used for secret sharing.
//!
//! The modulus is the largest 256-bit prime, `2^256 - 189`. It is defined
//! exactly once, in `MODULUS_BYTES`, and every reduction performed by the
//! sharing engine goes through [`modulus`]. Shares produced with one modulus
//! and interpolated with another decode to garbage without any error, so no
//! function here accepts a different prime.

use std::sync::OnceLock;

use num_bigint::{BigInt, BigUint};
use num_traits::{One, Signed, Zero};
use rand::RngCore;

/// Width of a field element in bytes.
pub const FIELD_BYTES: usize = 32;

/// Big-endian encoding of `2^256 - 189`.
const MODULUS_BYTES: [u8; FIELD_BYTES] = {
    let mut bytes = [0xff; FIELD_BYTES];
    bytes[FIELD_BYTES - 1] = 0x43;
    bytes
};

static MODULUS: OnceLock<BigUint> = OnceLock::new();
static SIGNED_MODULUS: OnceLock<BigInt> = OnceLock::new();

/// The field modulus.
pub fn modulus() -> &'static BigUint {
    MODULUS.get_or_init(|| BigUint::from_bytes_be(&MODULUS_BYTES))
}

pub(crate) fn signed_modulus() -> &'static BigInt {
    SIGNED_MODULUS.get_or_init(|| BigInt::from(modulus().clone()))
}

/// Non-negative residue of `value` modulo `m`.
fn residue(value: &BigInt, m: &BigInt) -> BigInt {
    let r = value % m;
    if r.is_negative() {
        r + m
    } else {
        r
    }
}

/// Reduce a signed value into the field, always yielding a non-negative residue.
pub fn reduce(value: &BigInt) -> BigUint {
    let (_, magnitude) = residue(value, signed_modulus()).into_parts();
    magnitude
}

/// Signed counterpart of [`reduce`], for accumulating interpolation terms.
pub(crate) fn reduce_signed(value: &BigInt) -> BigInt {
    residue(value, signed_modulus())
}

/// Evaluate a polynomial at `x` using Horner's method.
///
/// `coefficients[0]` is the constant term. Each step is reduced mod p.
pub fn evaluate(coefficients: &[BigUint], x: &BigUint) -> BigUint {
    let p = modulus();
    coefficients
        .iter()
        .rev()
        .fold(BigUint::zero(), |acc, coeff| (acc * x + coeff) % p)
}

/// Multiplicative inverse of `a` modulo `m` via the extended Euclidean algorithm.
///
/// The result is normalized into `0..m`. Returns `None` when `a` and `m` are
/// not coprime (including `a ≡ 0`).
pub fn mod_inverse(a: &BigInt, m: &BigInt) -> Option<BigUint> {
    let m = m.abs();
    if m.is_zero() {
        return None;
    }

    let (mut old_r, mut r) = (residue(a, &m), m.clone());
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());

    while !r.is_zero() {
        let q = &old_r / &r;
        let next_r = &old_r - &q * &r;
        old_r = std::mem::replace(&mut r, next_r);
        let next_s = &old_s - &q * &s;
        old_s = std::mem::replace(&mut s, next_s);
    }

    if !old_r.is_one() {
        return None;
    }

    let (_, inverse) = residue(&old_s, &m).into_parts();
    Some(inverse)
}

/// Interpret big-endian bytes as a field element, refusing values `>= p`.
pub fn element_from_bytes(bytes: &[u8]) -> Option<BigUint> {
    let value = BigUint::from_bytes_be(bytes);
    (value < *modulus()).then_some(value)
}

/// Encode a field element as exactly [`FIELD_BYTES`] big-endian bytes, zero-padded on the left.
pub fn element_to_bytes(value: &BigUint) -> [u8; FIELD_BYTES] {
    let raw = value.to_bytes_be();
    let mut out = [0u8; FIELD_BYTES];
    // A reduced element never exceeds 32 bytes; keep the low-order bytes regardless.
    let take = raw.len().min(FIELD_BYTES);
    out[FIELD_BYTES - take..].copy_from_slice(&raw[raw.len() - take..]);
    out
}

/// Draw a uniformly random field element from the thread-local CSPRNG.
pub fn random_element() -> BigUint {
    let mut bytes = [0u8; FIELD_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    BigUint::from_bytes_be(&bytes) % modulus()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modulus_is_2_pow_256_minus_189() {
        let expected = (BigUint::one() << 256u32) - BigUint::from(189u32);
        assert_eq!(*modulus(), expected);
        assert_eq!(modulus().bits(), 256);
    }

    #[test]
    fn test_evaluate_horner() {
        // 3 + 2x + x^2 at x = 5 -> 38
        let coeffs = vec![
            BigUint::from(3u32),
            BigUint::from(2u32),
            BigUint::from(1u32),
        ];
        assert_eq!(evaluate(&coeffs, &BigUint::from(5u32)), BigUint::from(38u32));
    }

    #[test]
    fn test_evaluate_reduces_mod_p() {
        let p_minus_one = modulus() - BigUint::one();
        // (p - 1) + 1 * x at x = 1 wraps to 0
        let coeffs = vec![p_minus_one, BigUint::one()];
        assert_eq!(evaluate(&coeffs, &BigUint::one()), BigUint::zero());
    }

    #[test]
    fn test_mod_inverse_small() {
        let inv = mod_inverse(&BigInt::from(3), &BigInt::from(11)).unwrap();
        assert_eq!(inv, BigUint::from(4u32));
    }

    #[test]
    fn test_mod_inverse_negative_input_is_normalized() {
        // -3 ≡ 8 (mod 11), 8 * 7 = 56 ≡ 1
        let inv = mod_inverse(&BigInt::from(-3), &BigInt::from(11)).unwrap();
        assert_eq!(inv, BigUint::from(7u32));
    }

    #[test]
    fn test_mod_inverse_not_coprime() {
        assert!(mod_inverse(&BigInt::from(6), &BigInt::from(9)).is_none());
        assert!(mod_inverse(&BigInt::zero(), &BigInt::from(11)).is_none());
    }

    #[test]
    fn test_mod_inverse_in_field() {
        let p = signed_modulus();
        let a = BigInt::from(123_456_789u64);
        let inv = BigInt::from(mod_inverse(&a, p).unwrap());
        assert_eq!(reduce(&(a * inv)), BigUint::one());
    }

    #[test]
    fn test_reduce_negative() {
        let reduced = reduce(&BigInt::from(-1));
        assert_eq!(reduced, modulus() - BigUint::one());
    }

    #[test]
    fn test_element_bytes() {
        assert!(element_from_bytes(&MODULUS_BYTES).is_none());
        let one = element_from_bytes(&[1]).unwrap();
        let encoded = element_to_bytes(&one);
        assert_eq!(encoded[FIELD_BYTES - 1], 1);
        assert!(encoded[..FIELD_BYTES - 1].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_random_element_in_field() {
        for _ in 0..16 {
            assert!(random_element() < *modulus());
        }
    }
}
