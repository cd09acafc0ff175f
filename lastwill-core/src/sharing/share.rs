//! Wire format for a single secret share.
//!
//! A share is always exactly 34 bytes:
//!
//! | offset | size | meaning                                  |
//! |--------|------|------------------------------------------|
//! | 0      | 1    | x-coordinate (1..=255)                   |
//! | 1      | 1    | original secret length in bytes (1..=32) |
//! | 2      | 32   | evaluated y value, big-endian            |
//!
//! Both single-byte fields bound the scheme to 255 shares and 32-byte
//! secrets. Successors hold shares in this exact layout, so the limits are
//! part of the format and must not change.

use data_encoding::BASE64;
use num_bigint::BigUint;

use super::field::{element_from_bytes, element_to_bytes, FIELD_BYTES};
use crate::error::{LastWillError, ReconstructionError, Result};

/// Encoded share length in bytes.
pub const SHARE_LEN: usize = 2 + FIELD_BYTES;

/// Largest secret the sharing engine accepts.
pub const MAX_SECRET_LEN: usize = FIELD_BYTES;

/// Largest number of shares a single split can produce.
pub const MAX_SHARES: usize = u8::MAX as usize;

/// One point on the sharing polynomial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretShare {
    index: u8,
    secret_len: u8,
    value: BigUint,
}

impl SecretShare {
    pub(crate) fn new(index: u8, secret_len: u8, value: BigUint) -> Self {
        Self {
            index,
            secret_len,
            value,
        }
    }

    /// The x-coordinate of this share.
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Length of the secret this share was split from.
    pub fn secret_len(&self) -> u8 {
        self.secret_len
    }

    pub fn value(&self) -> &BigUint {
        &self.value
    }

    /// Serialize into the 34-byte wire format.
    pub fn to_bytes(&self) -> [u8; SHARE_LEN] {
        let mut out = [0u8; SHARE_LEN];
        out[0] = self.index;
        out[1] = self.secret_len;
        out[2..].copy_from_slice(&element_to_bytes(&self.value));
        out
    }

    /// Parse the 34-byte wire format.
    ///
    /// Only the length and the field range of the value are checked here.
    /// Index and secret-length rules are enforced during reconstruction,
    /// where they can be compared across the whole share set.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SHARE_LEN {
            return Err(ReconstructionError::MalformedShare(bytes.len()).into());
        }

        let value =
            element_from_bytes(&bytes[2..]).ok_or(ReconstructionError::ValueOutOfField)?;

        Ok(Self {
            index: bytes[0],
            secret_len: bytes[1],
            value,
        })
    }

    /// Encode as standard padded base64, the form handed to successors.
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.to_bytes())
    }

    /// Decode a successor-supplied base64 string.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(encoded.trim().as_bytes())
            .map_err(|e| LastWillError::Validation(format!("Invalid share encoding: {}", e)))?;
        Self::from_bytes(&bytes)
    }
}
