//! Vault-specific error types for lifecycle and storage operations.
//!
//! These are granular enough for the calling layer to pick a user-facing
//! message, and convert into the crate-wide [`LastWillError`].

use thiserror::Error;

use crate::error::LastWillError;

/// Errors that can occur during vault operations.
#[derive(Error, Debug)]
pub enum VaultError {
    /// The passphrase could not unwrap the master key.
    #[error("Invalid passphrase")]
    InvalidPassphrase,

    /// No vault exists in the data directory yet.
    #[error("Vault not set up")]
    NotSetup,

    /// The vault exists but no key is loaded.
    #[error("Vault is locked")]
    Locked,

    /// The vault file exists but cannot be trusted.
    #[error("Vault data is corrupted: {0}")]
    Corrupted(String),

    /// An error occurred in the encryption layer.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Caller-supplied input was rejected before any work was done.
    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The salt file is missing or invalid.
    #[error("Salt error: {0}")]
    Salt(String),

    /// Key derivation failed (Argon2 error).
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Vault already exists")]
    AlreadyExists,

    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// Successor shares were malformed or did not rebuild this vault's key.
    #[error("Invalid shares: {0}")]
    InvalidShares(String),
}

/// Result type alias for vault operations.
pub type VaultResult<T> = std::result::Result<T, VaultError>;

impl VaultError {
    /// Stable code for programmatic handling by callers.
    pub fn code(&self) -> &'static str {
        match self {
            VaultError::InvalidPassphrase => "INVALID_PASSPHRASE",
            VaultError::NotSetup => "NOT_SETUP",
            VaultError::Locked => "LOCKED",
            VaultError::Corrupted(_) => "CORRUPTED",
            VaultError::Encryption(_) => "ENCRYPTION_ERROR",
            VaultError::Invalid(_) => "INVALID_INPUT",
            VaultError::Io(_) => "IO_ERROR",
            VaultError::Serialization(_) => "SERIALIZATION_ERROR",
            VaultError::Salt(_) => "SALT_ERROR",
            VaultError::KeyDerivation(_) => "KEY_DERIVATION_ERROR",
            VaultError::AlreadyExists => "ALREADY_EXISTS",
            VaultError::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            VaultError::InvalidShares(_) => "INVALID_SHARES",
        }
    }
}

// ============================================================================
// Conversions to and from the crate error type
// ============================================================================

impl From<VaultError> for LastWillError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::InvalidPassphrase => LastWillError::Decryption,
            VaultError::NotSetup => LastWillError::Storage("Vault not set up".into()),
            VaultError::Locked => LastWillError::Storage("Vault is locked".into()),
            VaultError::Corrupted(msg) => {
                LastWillError::Storage(format!("Vault corrupted: {}", msg))
            }
            VaultError::Encryption(msg) => LastWillError::Encryption(msg),
            VaultError::Invalid(msg) => LastWillError::Validation(msg),
            VaultError::Io(e) => LastWillError::Io(e),
            VaultError::Serialization(e) => LastWillError::Serialization(e),
            VaultError::Salt(msg) => LastWillError::Storage(format!("Salt error: {}", msg)),
            VaultError::KeyDerivation(msg) => {
                LastWillError::Encryption(format!("Key derivation: {}", msg))
            }
            VaultError::AlreadyExists => LastWillError::Storage("Vault already exists".into()),
            VaultError::EntryNotFound(id) => {
                LastWillError::Storage(format!("Entry not found: {}", id))
            }
            VaultError::InvalidShares(msg) => LastWillError::Validation(msg),
        }
    }
}

impl From<LastWillError> for VaultError {
    fn from(err: LastWillError) -> Self {
        match err {
            LastWillError::Validation(msg) => VaultError::Invalid(msg),
            LastWillError::Encryption(msg) => VaultError::Encryption(msg),
            // Keep the single decryption message; callers that know the
            // context (passphrase unwrap) map it themselves.
            LastWillError::Decryption => VaultError::Corrupted("Decryption failed".into()),
            LastWillError::Reconstruction(e) => VaultError::InvalidShares(e.to_string()),
            LastWillError::Serialization(e) => VaultError::Serialization(e),
            LastWillError::Io(e) => VaultError::Io(e),
            LastWillError::Storage(msg) | LastWillError::Config(msg) => {
                VaultError::Corrupted(msg)
            }
        }
    }
}

// ============================================================================
// Serialization for the calling layer
// ============================================================================

impl serde::Serialize for VaultError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        // Serialize as a structured object for better caller handling
        let mut state = serializer.serialize_struct("VaultError", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReconstructionError;

    #[test]
    fn test_vault_error_to_crate_error() {
        let err: LastWillError = VaultError::InvalidPassphrase.into();
        assert!(matches!(err, LastWillError::Decryption));

        let err: LastWillError = VaultError::Invalid("bad".into()).into();
        assert!(matches!(err, LastWillError::Validation(_)));
    }

    #[test]
    fn test_reconstruction_maps_to_invalid_shares() {
        let err: VaultError =
            LastWillError::Reconstruction(ReconstructionError::InconsistentLength).into();
        assert_eq!(err.code(), "INVALID_SHARES");
    }

    #[test]
    fn test_vault_error_serialization() {
        let err = VaultError::InvalidPassphrase;
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("INVALID_PASSPHRASE"));
        assert!(json.contains("Invalid passphrase"));
    }
}
