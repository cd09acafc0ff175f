//! File and object adapters over the envelope cipher.
//!
//! Binary payloads pass through unchanged. Structured values are encoded to
//! canonical JSON before encryption and parsed after decryption; a failure in
//! either step is a `Serialization` error, never a `Decryption` one.

use serde::{de::DeserializeOwned, Serialize};

use super::cipher::{decrypt, encrypt, EncryptOptions, EncryptedEnvelope};
use super::key::MasterKey;
use crate::error::Result;

pub fn encrypt_file(
    contents: &[u8],
    key: &MasterKey,
    options: Option<&EncryptOptions>,
) -> Result<EncryptedEnvelope> {
    encrypt(contents, key, options)
}

pub fn decrypt_file(envelope: &EncryptedEnvelope, key: &MasterKey) -> Result<Vec<u8>> {
    decrypt(envelope, key)
}

/// Serialize `value` to JSON and encrypt it.
pub fn encrypt_object<T: Serialize>(
    value: &T,
    key: &MasterKey,
    options: Option<&EncryptOptions>,
) -> Result<EncryptedEnvelope> {
    let plaintext = serde_json::to_vec(value)?;
    encrypt(&plaintext, key, options)
}

/// Decrypt an envelope and parse the plaintext as JSON.
pub fn decrypt_object<T: DeserializeOwned>(
    envelope: &EncryptedEnvelope,
    key: &MasterKey,
) -> Result<T> {
    let plaintext = decrypt(envelope, key)?;
    let value = serde_json::from_slice(&plaintext)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LastWillError;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Note {
        title: String,
        body: String,
    }

    #[test]
    fn test_object_roundtrip() {
        let key = MasterKey::generate();
        let note = Note {
            title: "bank".into(),
            body: "PIN 4321".into(),
        };

        let envelope = encrypt_object(&note, &key, None).unwrap();
        let back: Note = decrypt_object(&envelope, &key).unwrap();
        assert_eq!(back, note);
    }

    #[test]
    fn test_file_passthrough() {
        let key = MasterKey::generate();
        let contents: Vec<u8> = (0..=255u8).collect();

        let envelope = encrypt_file(&contents, &key, None).unwrap();
        assert_eq!(decrypt_file(&envelope, &key).unwrap(), contents);
    }

    #[test]
    fn test_parse_failure_is_serialization_error() {
        let key = MasterKey::generate();
        let envelope = encrypt_file(b"not json at all", &key, None).unwrap();

        let result: Result<Note> = decrypt_object(&envelope, &key);
        assert!(matches!(result, Err(LastWillError::Serialization(_))));
    }

    #[test]
    fn test_cipher_failure_is_decryption_error() {
        let key = MasterKey::generate();
        let note = Note {
            title: "t".into(),
            body: "b".into(),
        };
        let envelope = encrypt_object(&note, &key, None).unwrap();

        let result: Result<Note> = decrypt_object(&envelope, &MasterKey::generate());
        assert!(matches!(result, Err(LastWillError::Decryption)));
    }
}
