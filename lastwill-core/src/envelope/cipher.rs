//! Authenticated envelope encryption.
//!
//! Every call to [`encrypt`] draws a fresh 96-bit nonce from the OS random
//! source, so callers never manage nonces themselves. [`decrypt`] reports
//! every authentication failure as the same [`LastWillError::Decryption`]:
//! a wrong key and a flipped ciphertext bit are indistinguishable to the
//! caller.

use aes_gcm::aead::{rand_core::RngCore, Aead, KeyInit, Nonce, OsRng};
use aes_gcm::Aes256Gcm;
use chacha20poly1305::ChaCha20Poly1305;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::key::MasterKey;
use crate::error::{LastWillError, Result};

/// Nonce size shared by both suites (96 bits = 12 bytes)
pub const IV_LEN: usize = 12;

/// Authentication tag appended by both suites (128 bits)
pub const TAG_LEN: usize = 16;

/// Supported AEAD suites.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    #[default]
    #[serde(rename = "AES-256-GCM")]
    Aes256Gcm,
    #[serde(rename = "ChaCha20-Poly1305")]
    ChaCha20Poly1305,
}

impl Algorithm {
    /// The tag stored in [`EncryptedEnvelope::algorithm`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aes256Gcm => "AES-256-GCM",
            Self::ChaCha20Poly1305 => "ChaCha20-Poly1305",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "AES-256-GCM" => Some(Self::Aes256Gcm),
            "ChaCha20-Poly1305" => Some(Self::ChaCha20Poly1305),
            _ => None,
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ciphertext plus everything except the key needed to open it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    /// Ciphertext with the 16-byte authentication tag appended
    #[serde(with = "hex")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "hex")]
    pub iv: Vec<u8>,
    pub algorithm: String,
}

/// Per-call encryption options.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EncryptOptions {
    /// Suite to encrypt with; the key must belong to the same suite.
    pub algorithm: Algorithm,
}

/// Encrypt `plaintext` under `key`.
///
/// Without options the key's own suite is used.
///
/// # Errors
/// `Validation` for an empty plaintext or a key from another suite, raised
/// before the cipher runs. `Encryption` if the cipher itself fails.
pub fn encrypt(
    plaintext: &[u8],
    key: &MasterKey,
    options: Option<&EncryptOptions>,
) -> Result<EncryptedEnvelope> {
    if plaintext.is_empty() {
        return Err(LastWillError::Validation("Plaintext must not be empty".into()));
    }

    let algorithm = match options {
        Some(opts) if opts.algorithm != key.algorithm() => {
            return Err(LastWillError::Validation(format!(
                "Key is bound to {}, cannot encrypt with {}",
                key.algorithm(),
                opts.algorithm
            )));
        }
        Some(opts) => opts.algorithm,
        None => key.algorithm(),
    };

    // Generate random nonce
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let ciphertext = match algorithm {
        Algorithm::Aes256Gcm => seal::<Aes256Gcm>(key, &iv, plaintext)?,
        Algorithm::ChaCha20Poly1305 => seal::<ChaCha20Poly1305>(key, &iv, plaintext)?,
    };

    debug!(
        "Encrypted {} bytes with {} (key {})",
        plaintext.len(),
        algorithm,
        key.fingerprint()
    );

    Ok(EncryptedEnvelope {
        ciphertext,
        iv: iv.to_vec(),
        algorithm: algorithm.as_str().to_string(),
    })
}

/// Decrypt an envelope, verifying its authentication tag.
///
/// # Errors
/// `Validation` when the envelope names an unknown suite, a suite other than
/// the key's, or carries an iv of the wrong length. Any failure past that
/// point, including a truncated ciphertext, is `Decryption`.
pub fn decrypt(envelope: &EncryptedEnvelope, key: &MasterKey) -> Result<Vec<u8>> {
    let algorithm = Algorithm::from_tag(&envelope.algorithm).ok_or_else(|| {
        LastWillError::Validation(format!("Unsupported algorithm: {}", envelope.algorithm))
    })?;

    if algorithm != key.algorithm() {
        return Err(LastWillError::Validation(format!(
            "Key is bound to {}, envelope uses {}",
            key.algorithm(),
            algorithm
        )));
    }

    if envelope.iv.len() != IV_LEN {
        return Err(LastWillError::Validation(format!(
            "IV must be {} bytes, got {}",
            IV_LEN,
            envelope.iv.len()
        )));
    }

    if envelope.ciphertext.len() < TAG_LEN {
        return Err(LastWillError::Decryption);
    }

    match algorithm {
        Algorithm::Aes256Gcm => open::<Aes256Gcm>(key, &envelope.iv, &envelope.ciphertext),
        Algorithm::ChaCha20Poly1305 => {
            open::<ChaCha20Poly1305>(key, &envelope.iv, &envelope.ciphertext)
        }
    }
}

fn seal<C: KeyInit + Aead>(key: &MasterKey, iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = C::new_from_slice(key.as_bytes())
        .map_err(|e| LastWillError::Encryption(format!("Invalid key: {}", e)))?;

    cipher
        .encrypt(Nonce::<C>::from_slice(iv), plaintext)
        .map_err(|e| LastWillError::Encryption(format!("Encryption failed: {}", e)))
}

fn open<C: KeyInit + Aead>(key: &MasterKey, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = C::new_from_slice(key.as_bytes()).map_err(|_| LastWillError::Decryption)?;

    cipher
        .decrypt(Nonce::<C>::from_slice(iv), ciphertext)
        .map_err(|_| LastWillError::Decryption)
}
