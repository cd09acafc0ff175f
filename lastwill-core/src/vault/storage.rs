//! On-disk vault file.
//!
//! The vault is a JSON document, `vault.json`, inside the vault's data
//! directory. Each entry is individually encrypted under the master key; the
//! master key itself is stored wrapped under a passphrase-derived key.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::entry::VaultEntry;
use super::error::{VaultError, VaultResult};
use crate::envelope::{Algorithm, EncryptedEnvelope};

/// Vault file name
pub const VAULT_FILE_NAME: &str = "vault.json";

/// Current layout version of the vault file.
pub const VAULT_FORMAT_VERSION: u32 = 1;

/// Argon2id cost parameters, stored alongside the vault so it can be reopened
/// with exactly the parameters it was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    /// 64 MB, 3 passes, 4 lanes.
    fn default() -> Self {
        Self {
            memory_kib: 65536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

/// Everything stored in `vault.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultFile {
    pub format_version: u32,
    pub kdf: KdfParams,
    /// Suite the master key is bound to
    pub key_algorithm: Algorithm,
    /// Fingerprint of the master key, used to accept a key rebuilt from shares
    pub key_fingerprint: String,
    /// Master key encrypted under the passphrase-derived key
    pub wrapped_key: EncryptedEnvelope,
    #[serde(default)]
    pub entries: Vec<VaultEntry>,
}

pub fn vault_path(data_dir: &Path) -> PathBuf {
    data_dir.join(VAULT_FILE_NAME)
}

pub fn vault_exists(data_dir: &Path) -> bool {
    vault_path(data_dir).exists()
}

/// Write the vault file atomically (temp file, then rename).
pub fn write_vault(data_dir: &Path, file: &VaultFile) -> VaultResult<()> {
    std::fs::create_dir_all(data_dir)?;
    let path = vault_path(data_dir);

    let contents = serde_json::to_vec_pretty(file)?;

    let temp_path = path.with_extension("json.tmp");
    std::fs::write(&temp_path, &contents)?;
    std::fs::rename(&temp_path, &path)?;

    // Set restrictive permissions on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&path)?.permissions();
        perms.set_mode(0o600);
        std::fs::set_permissions(&path, perms)?;
    }

    Ok(())
}

/// Read and parse the vault file.
pub fn read_vault(data_dir: &Path) -> VaultResult<VaultFile> {
    let path = vault_path(data_dir);
    if !path.exists() {
        return Err(VaultError::NotSetup);
    }

    let contents = std::fs::read(&path)?;
    let file: VaultFile = serde_json::from_slice(&contents)
        .map_err(|e| VaultError::Corrupted(format!("Unreadable vault file: {}", e)))?;

    if file.format_version != VAULT_FORMAT_VERSION {
        return Err(VaultError::Corrupted(format!(
            "Unsupported vault format version {}",
            file.format_version
        )));
    }

    Ok(file)
}

/// Delete the vault file.
pub fn delete_vault(data_dir: &Path) -> VaultResult<()> {
    let path = vault_path(data_dir);
    if path.exists() {
        std::fs::remove_file(&path)?;
    }
    Ok(())
}
