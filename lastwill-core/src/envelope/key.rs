//! Account master key.
//!
//! One `MasterKey` is generated per account. It encrypts every vault entry
//! and is the secret that gets split into successor shares.

use aes_gcm::aead::{rand_core::RngCore, OsRng};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::cipher::Algorithm;
use crate::error::{LastWillError, Result};

/// Master key length in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// A 256-bit key bound to one cipher suite, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    key: [u8; KEY_LEN],
    #[zeroize(skip)]
    algorithm: Algorithm,
}

impl MasterKey {
    /// Generate a fresh AES-256-GCM key from the OS random source.
    pub fn generate() -> Self {
        Self::generate_for(Algorithm::default())
    }

    /// Generate a fresh key for the given suite.
    pub fn generate_for(algorithm: Algorithm) -> Self {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self { key, algorithm }
    }

    /// Wrap existing key material, e.g. a key reconstructed from shares.
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let key: [u8; KEY_LEN] = slice.try_into().map_err(|_| {
            LastWillError::Validation(format!(
                "Master key must be {} bytes, got {}",
                KEY_LEN,
                slice.len()
            ))
        })?;
        Ok(Self {
            key,
            algorithm: Algorithm::default(),
        })
    }

    /// Rebind the key material to another cipher suite.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Short SHA-256 tag identifying the key in logs and vault metadata.
    ///
    /// Reveals nothing usable about the key itself.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"lastwill:key-fingerprint:v1");
        hasher.update(self.key);
        hex::encode(&hasher.finalize()[..8])
    }
}

impl PartialEq for MasterKey {
    fn eq(&self, other: &Self) -> bool {
        self.algorithm == other.algorithm && bool::from(self.key.ct_eq(&other.key))
    }
}

impl Eq for MasterKey {}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never log the actual key material
        f.debug_struct("MasterKey")
            .field("key", &"[REDACTED]")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_differ() {
        let a = MasterKey::generate();
        let b = MasterKey::generate();
        assert_ne!(a, b);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_from_slice_length_checked() {
        assert!(MasterKey::from_slice(&[7u8; 32]).is_ok());
        assert!(matches!(
            MasterKey::from_slice(&[7u8; 16]),
            Err(LastWillError::Validation(_))
        ));
    }

    #[test]
    fn test_fingerprint_stable() {
        let key = MasterKey::from_slice(&[9u8; 32]).unwrap();
        let again = MasterKey::from_slice(&[9u8; 32]).unwrap();
        assert_eq!(key.fingerprint(), again.fingerprint());
        assert_eq!(key.fingerprint().len(), 16);
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = MasterKey::from_slice(&[0xabu8; 32]).unwrap();
        let rendered = format!("{:?}", key);
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("171"));
    }

    #[test]
    fn test_algorithm_part_of_equality() {
        let aes = MasterKey::from_slice(&[1u8; 32]).unwrap();
        let chacha = aes.clone().with_algorithm(Algorithm::ChaCha20Poly1305);
        assert_ne!(aes, chacha);
    }
}
