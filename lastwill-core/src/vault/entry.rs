use chrono::{DateTime, Utc};
use data_encoding::BASE64;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::envelope::{decrypt_object, encrypt_object, EncryptedEnvelope, MasterKey};
use crate::error::{LastWillError, Result};

/// The cleartext record stored inside a vault entry.
///
/// Never persisted as-is; it only exists between `open` and `seal`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultRecord {
    pub name: String,
    pub payload: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl VaultRecord {
    pub fn text(name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
            kind: None,
            mime_type: None,
            filename: None,
        }
    }

    /// A binary attachment; the bytes are kept base64-encoded in `payload`.
    pub fn file(
        name: impl Into<String>,
        contents: &[u8],
        mime_type: Option<String>,
        filename: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            payload: BASE64.encode(contents),
            kind: Some("file".to_string()),
            mime_type,
            filename,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind.as_deref() == Some("file")
    }

    /// Decode the attachment bytes of a file record.
    pub fn file_contents(&self) -> Result<Vec<u8>> {
        if !self.is_file() {
            return Err(LastWillError::Validation(format!(
                "Record '{}' is not a file",
                self.name
            )));
        }
        BASE64
            .decode(self.payload.as_bytes())
            .map_err(|e| LastWillError::Validation(format!("Corrupted file payload: {}", e)))
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(LastWillError::Validation("Record name must not be empty".into()));
        }
        Ok(())
    }
}

/// An encrypted record as persisted in the vault.
///
/// Only `category` and `version` are visible without the master key.
/// Entries are never modified in place: an update produces a new entry
/// with the same id and the next version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultEntry {
    pub id: String,
    pub category: String,
    pub version: u32,
    pub envelope: EncryptedEnvelope,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Metadata of an entry, listable while the vault contents stay sealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySummary {
    pub id: String,
    pub category: String,
    pub version: u32,
    pub updated_at: DateTime<Utc>,
}

impl VaultEntry {
    /// Encrypt a record into a fresh version-1 entry.
    pub fn seal(record: &VaultRecord, category: &str, key: &MasterKey) -> Result<Self> {
        record.validate()?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            category: category.to_string(),
            version: 1,
            envelope: encrypt_object(record, key, None)?,
            created_at: now,
            updated_at: now,
        })
    }

    /// Decrypt and parse the record.
    pub fn open(&self, key: &MasterKey) -> Result<VaultRecord> {
        decrypt_object(&self.envelope, key)
    }

    /// Produce the successor of this entry holding `record`.
    pub fn reseal(&self, record: &VaultRecord, key: &MasterKey) -> Result<Self> {
        record.validate()?;
        Ok(Self {
            id: self.id.clone(),
            category: self.category.clone(),
            version: self.version + 1,
            envelope: encrypt_object(record, key, None)?,
            created_at: self.created_at,
            updated_at: Utc::now(),
        })
    }

    pub fn summary(&self) -> EntrySummary {
        EntrySummary {
            id: self.id.clone(),
            category: self.category.clone(),
            version: self.version,
            updated_at: self.updated_at,
        }
    }
}
