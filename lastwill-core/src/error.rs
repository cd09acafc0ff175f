use thiserror::Error;

#[derive(Error, Debug)]
pub enum LastWillError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Wrong key, corrupted ciphertext and tampering all collapse into this variant.
    #[error("Decryption failed")]
    Decryption,

    #[error("Reconstruction error: {0}")]
    Reconstruction(#[from] ReconstructionError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Reasons a set of shares is refused before any interpolation happens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconstructionError {
    #[error("At least 2 shares are required, got {0}")]
    TooFewShares(usize),

    #[error("Share must be exactly 34 bytes, got {0}")]
    MalformedShare(usize),

    #[error("Duplicate share index {0}")]
    DuplicateIndex(u8),

    #[error("Shares disagree on the original secret length")]
    InconsistentLength,

    #[error("Share index 0 is not a valid coordinate")]
    InvalidIndex,

    #[error("Recorded secret length {0} is outside 1..=32")]
    InvalidSecretLength(u8),

    #[error("Share value is outside the field")]
    ValueOutOfField,

    #[error("Interpolation denominator is not invertible")]
    NotInvertible,
}

impl serde::Serialize for LastWillError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LastWillError>;
