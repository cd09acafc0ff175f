//! VaultManager - vault lifecycle and entry storage.
//!
//! This module provides the VaultManager struct that handles:
//! - Vault creation with a freshly generated master key
//! - Unlocking with the owner passphrase, a master key, or successor shares
//! - Splitting the master key into successor shares
//! - Entry CRUD over individually encrypted records
//! - Vault destruction
//!
//! The master key is stored wrapped under a key derived from the owner's
//! passphrase with Argon2id and a per-vault salt. Successors never learn the
//! passphrase; they rebuild the master key from their shares instead.

use std::path::{Path, PathBuf};

use argon2::{Argon2, Params, Version};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::envelope::{decrypt, encrypt, MasterKey};
use crate::error::LastWillError;
use crate::sharing::{self, SecretShare};
use crate::vault::auth::{UnlockMethod, VaultStatus};
use crate::vault::entry::{EntrySummary, VaultEntry, VaultRecord};
use crate::vault::error::{VaultError, VaultResult};
use crate::vault::salt::{delete_salt, get_or_create_salt, load_salt, SALT_SIZE};
use crate::vault::storage::{
    delete_vault, read_vault, vault_exists, vault_path, write_vault, KdfParams, VaultFile,
    VAULT_FORMAT_VERSION,
};

/// 256-bit wrapping key for AES-256
const ARGON2_OUTPUT_LEN: usize = 32;

/// Shortest passphrase accepted when creating or re-keying a vault.
pub const MIN_PASSPHRASE_LEN: usize = 8;

/// VaultManager handles the lifecycle of one vault directory.
pub struct VaultManager {
    data_dir: PathBuf,
    /// Cost parameters for vaults created by this manager
    kdf: KdfParams,
    /// The master key (only present when the vault is unlocked)
    key: Option<MasterKey>,
    /// In-memory vault contents (loaded when the vault is unlocked)
    file: Option<VaultFile>,
    unlock_method: Option<UnlockMethod>,
}

impl VaultManager {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            kdf: KdfParams::default(),
            key: None,
            file: None,
            unlock_method: None,
        }
    }

    /// Override the Argon2id cost used by `create`.
    ///
    /// Existing vaults always reopen with the parameters stored in their file.
    pub fn with_kdf_params(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn vault_path(&self) -> PathBuf {
        vault_path(&self.data_dir)
    }

    /// Check if a vault file exists.
    pub fn exists(&self) -> bool {
        vault_exists(&self.data_dir)
    }

    pub fn status(&self) -> VaultStatus {
        if self.key.is_some() {
            VaultStatus::Unlocked
        } else if self.exists() {
            VaultStatus::Locked
        } else {
            VaultStatus::NotSetup
        }
    }

    /// How the current session was unlocked, if it is.
    pub fn unlock_method(&self) -> Option<UnlockMethod> {
        self.unlock_method
    }

    /// Derive the key-wrapping key from a passphrase using Argon2id.
    pub fn derive_key(
        passphrase: &str,
        salt: &[u8; SALT_SIZE],
        kdf: &KdfParams,
    ) -> VaultResult<MasterKey> {
        let params = Params::new(
            kdf.memory_kib,
            kdf.iterations,
            kdf.parallelism,
            Some(ARGON2_OUTPUT_LEN),
        )
        .map_err(|e| VaultError::KeyDerivation(format!("Invalid Argon2 params: {}", e)))?;

        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

        let mut key_bytes = Zeroizing::new([0u8; ARGON2_OUTPUT_LEN]);
        argon2
            .hash_password_into(passphrase.as_bytes(), salt, &mut key_bytes[..])
            .map_err(|e| VaultError::KeyDerivation(e.to_string()))?;

        debug!("Derived {}-byte wrapping key from passphrase", key_bytes.len());
        Ok(MasterKey::from_slice(&key_bytes[..])?)
    }

    /// Create a new vault protected by `passphrase`.
    ///
    /// Generates the account master key; it stays loaded, so the caller can
    /// split it for successors right away.
    ///
    /// # Errors
    /// `AlreadyExists` if a vault is present, `Invalid` for a short passphrase.
    pub fn create(&mut self, passphrase: &str) -> VaultResult<()> {
        if self.exists() {
            return Err(VaultError::AlreadyExists);
        }
        validate_passphrase(passphrase)?;

        info!("Creating new vault at {:?}", self.vault_path());

        let salt = get_or_create_salt(&self.data_dir)?;
        let wrapping_key = Self::derive_key(passphrase, &salt, &self.kdf)?;

        let key = MasterKey::generate();
        let wrapped_key = encrypt(key.as_bytes(), &wrapping_key, None)?;

        let file = VaultFile {
            format_version: VAULT_FORMAT_VERSION,
            kdf: self.kdf,
            key_algorithm: key.algorithm(),
            key_fingerprint: key.fingerprint(),
            wrapped_key,
            entries: Vec::new(),
        };
        write_vault(&self.data_dir, &file)?;

        info!("Vault created (key {})", file.key_fingerprint);
        self.accept(file, key, UnlockMethod::Passphrase);
        Ok(())
    }

    /// Unlock with the owner passphrase.
    ///
    /// # Errors
    /// `NotSetup` if there is no vault, `InvalidPassphrase` if the passphrase
    /// cannot unwrap the master key.
    pub fn open(&mut self, passphrase: &str) -> VaultResult<()> {
        let file = read_vault(&self.data_dir)?;
        info!("Opening vault at {:?}", self.vault_path());

        let salt = load_salt(&self.data_dir)?;
        let wrapping_key = Self::derive_key(passphrase, &salt, &file.kdf)?;

        let raw = Zeroizing::new(decrypt(&file.wrapped_key, &wrapping_key).map_err(
            |e| match e {
                LastWillError::Decryption => VaultError::InvalidPassphrase,
                other => other.into(),
            },
        )?);

        let key = MasterKey::from_slice(&raw)?.with_algorithm(file.key_algorithm);
        if key.fingerprint() != file.key_fingerprint {
            return Err(VaultError::Corrupted(
                "Unwrapped key does not match the stored fingerprint".into(),
            ));
        }

        self.accept(file, key, UnlockMethod::Passphrase);
        info!("Vault opened with passphrase");
        Ok(())
    }

    /// Unlock with a master key obtained out of band.
    pub fn unlock_with_master_key(&mut self, key: MasterKey) -> VaultResult<()> {
        let file = read_vault(&self.data_dir)?;
        let key = key.with_algorithm(file.key_algorithm);

        if key.fingerprint() != file.key_fingerprint {
            return Err(VaultError::Invalid(
                "Master key does not belong to this vault".into(),
            ));
        }

        self.accept(file, key, UnlockMethod::MasterKey);
        info!("Vault opened with master key");
        Ok(())
    }

    /// Unlock by rebuilding the master key from successor shares.
    ///
    /// Under-supplied shares interpolate to a wrong key without error; the
    /// stored fingerprint is what turns that into `InvalidShares` here.
    pub fn unlock_with_shares<S: AsRef<[u8]>>(&mut self, shares: &[S]) -> VaultResult<()> {
        let file = read_vault(&self.data_dir)?;

        let raw = Zeroizing::new(sharing::reconstruct(shares)?);
        let key = MasterKey::from_slice(&raw)
            .map_err(|e| VaultError::InvalidShares(e.to_string()))?
            .with_algorithm(file.key_algorithm);

        if key.fingerprint() != file.key_fingerprint {
            warn!("Shares reconstructed a key that does not match this vault");
            return Err(VaultError::InvalidShares(
                "Shares do not reconstruct this vault's master key".into(),
            ));
        }

        self.accept(file, key, UnlockMethod::Shares);
        info!("Vault opened with {} successor shares", shares.len());
        Ok(())
    }

    fn accept(&mut self, file: VaultFile, key: MasterKey, method: UnlockMethod) {
        self.file = Some(file);
        self.key = Some(key);
        self.unlock_method = Some(method);
    }

    /// Split the master key into successor shares.
    pub fn split_master_key(
        &self,
        total_shares: usize,
        threshold: usize,
    ) -> VaultResult<Vec<SecretShare>> {
        let key = self.key.as_ref().ok_or(VaultError::Locked)?;
        let shares = sharing::split(key.as_bytes(), total_shares, threshold)?;
        info!(
            "Split master key {} into {} shares (threshold {})",
            key.fingerprint(),
            total_shares,
            threshold
        );
        Ok(shares)
    }

    /// Re-wrap the master key under a new passphrase and persist it.
    ///
    /// Used by the owner to rotate the passphrase and by a successor who
    /// unlocked with shares and wants a passphrase of their own.
    pub fn set_passphrase(&mut self, passphrase: &str) -> VaultResult<()> {
        validate_passphrase(passphrase)?;
        let salt = get_or_create_salt(&self.data_dir)?;

        let (key, file) = self.unlocked_mut()?;
        let wrapping_key = Self::derive_key(passphrase, &salt, &file.kdf)?;
        file.wrapped_key = encrypt(key.as_bytes(), &wrapping_key, None)?;

        self.flush()?;
        info!("Vault passphrase updated");
        Ok(())
    }

    /// Check if the vault is currently unlocked.
    pub fn is_open(&self) -> bool {
        self.key.is_some()
    }

    /// Flush and drop the master key from memory.
    pub fn lock(&mut self) -> VaultResult<()> {
        if self.is_open() {
            info!("Locking vault");

            if let Err(e) = self.flush() {
                warn!("Failed to save vault before locking: {}", e);
            }
        }

        // MasterKey implements ZeroizeOnDrop
        self.key = None;
        self.file = None;
        self.unlock_method = None;
        Ok(())
    }

    /// Destroy the vault and its salt. All entries are permanently lost.
    pub fn destroy(&mut self) -> VaultResult<()> {
        info!("Destroying vault - all data will be lost!");

        self.key = None;
        self.file = None;
        self.unlock_method = None;

        delete_vault(&self.data_dir)?;
        delete_salt(&self.data_dir)?;

        info!("Vault destroyed");
        Ok(())
    }

    // =========================================================================
    // Entry Operations
    // =========================================================================

    fn unlocked(&self) -> VaultResult<(&MasterKey, &VaultFile)> {
        match (&self.key, &self.file) {
            (Some(key), Some(file)) => Ok((key, file)),
            _ => Err(VaultError::Locked),
        }
    }

    fn unlocked_mut(&mut self) -> VaultResult<(&MasterKey, &mut VaultFile)> {
        match (&self.key, &mut self.file) {
            (Some(key), Some(file)) => Ok((key, file)),
            _ => Err(VaultError::Locked),
        }
    }

    /// Encrypt and add a record. Call `flush()` to persist.
    pub fn add_entry(&mut self, record: &VaultRecord, category: &str) -> VaultResult<EntrySummary> {
        let (key, file) = self.unlocked_mut()?;
        let entry = VaultEntry::seal(record, category, key)?;
        let summary = entry.summary();
        file.entries.push(entry);
        debug!("Added vault entry {} ({})", summary.id, summary.category);
        Ok(summary)
    }

    /// Replace an entry with its next version. Call `flush()` to persist.
    pub fn update_entry(&mut self, id: &str, record: &VaultRecord) -> VaultResult<EntrySummary> {
        let (key, file) = self.unlocked_mut()?;
        let slot = file
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| VaultError::EntryNotFound(id.to_string()))?;

        let next = slot.reseal(record, key)?;
        *slot = next;
        debug!("Updated vault entry {} to version {}", slot.id, slot.version);
        Ok(slot.summary())
    }

    /// Decrypt one entry.
    pub fn read_entry(&self, id: &str) -> VaultResult<VaultRecord> {
        let (key, file) = self.unlocked()?;
        let entry = file
            .entries
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| VaultError::EntryNotFound(id.to_string()))?;
        Ok(entry.open(key)?)
    }

    /// Metadata of every entry, without decrypting any of them.
    pub fn list_entries(&self) -> VaultResult<Vec<EntrySummary>> {
        let (_, file) = self.unlocked()?;
        Ok(file.entries.iter().map(VaultEntry::summary).collect())
    }

    /// Remove an entry. Call `flush()` to persist.
    pub fn remove_entry(&mut self, id: &str) -> VaultResult<()> {
        let (_, file) = self.unlocked_mut()?;
        let before = file.entries.len();
        file.entries.retain(|e| e.id != id);
        if file.entries.len() == before {
            return Err(VaultError::EntryNotFound(id.to_string()));
        }
        debug!("Removed vault entry {}", id);
        Ok(())
    }

    // =========================================================================
    // Persistence Operations
    // =========================================================================

    /// Write the in-memory vault to disk.
    pub fn flush(&self) -> VaultResult<()> {
        let (_, file) = self.unlocked()?;
        write_vault(&self.data_dir, file)?;
        debug!("Vault flushed to disk ({} entries)", file.entries.len());
        Ok(())
    }
}

fn validate_passphrase(passphrase: &str) -> VaultResult<()> {
    if passphrase.chars().count() < MIN_PASSPHRASE_LEN {
        return Err(VaultError::Invalid(format!(
            "Passphrase must be at least {} characters",
            MIN_PASSPHRASE_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const PASSPHRASE: &str = "correct horse battery";

    fn fast_kdf() -> KdfParams {
        KdfParams {
            memory_kib: 256,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn scratch_manager() -> VaultManager {
        let dir = std::env::temp_dir().join(format!("lastwill-vault-{}", Uuid::new_v4()));
        VaultManager::new(dir).with_kdf_params(fast_kdf())
    }

    fn cleanup(manager: &VaultManager) {
        let _ = std::fs::remove_dir_all(manager.data_dir());
    }

    #[test]
    fn test_derive_key_deterministic() {
        let salt = [1u8; 16];
        let key1 = VaultManager::derive_key(PASSPHRASE, &salt, &fast_kdf()).unwrap();
        let key2 = VaultManager::derive_key(PASSPHRASE, &salt, &fast_kdf()).unwrap();
        assert_eq!(key1, key2, "Same passphrase and salt should produce same key");
    }

    #[test]
    fn test_derive_key_different_inputs() {
        let key1 = VaultManager::derive_key(PASSPHRASE, &[1u8; 16], &fast_kdf()).unwrap();
        let key2 = VaultManager::derive_key("another passphrase", &[1u8; 16], &fast_kdf()).unwrap();
        let key3 = VaultManager::derive_key(PASSPHRASE, &[2u8; 16], &fast_kdf()).unwrap();
        assert_ne!(key1, key2);
        assert_ne!(key1, key3);
    }

    #[test]
    fn test_create_open_roundtrip() {
        let mut manager = scratch_manager();
        assert_eq!(manager.status(), VaultStatus::NotSetup);

        manager.create(PASSPHRASE).unwrap();
        assert_eq!(manager.status(), VaultStatus::Unlocked);
        let id = manager
            .add_entry(&VaultRecord::text("bank", "PIN 0000"), "finance")
            .unwrap()
            .id;
        manager.lock().unwrap();
        assert_eq!(manager.status(), VaultStatus::Locked);
        assert!(matches!(manager.read_entry(&id), Err(VaultError::Locked)));

        manager.open(PASSPHRASE).unwrap();
        assert_eq!(manager.unlock_method(), Some(UnlockMethod::Passphrase));
        assert_eq!(manager.read_entry(&id).unwrap().payload, "PIN 0000");
        cleanup(&manager);
    }

    #[test]
    fn test_wrong_passphrase() {
        let mut manager = scratch_manager();
        manager.create(PASSPHRASE).unwrap();
        manager.lock().unwrap();

        assert!(matches!(
            manager.open("definitely wrong"),
            Err(VaultError::InvalidPassphrase)
        ));
        assert!(!manager.is_open());
        cleanup(&manager);
    }

    #[test]
    fn test_create_twice_and_open_missing() {
        let mut manager = scratch_manager();
        assert!(matches!(manager.open(PASSPHRASE), Err(VaultError::NotSetup)));

        manager.create(PASSPHRASE).unwrap();
        assert!(matches!(
            manager.create(PASSPHRASE),
            Err(VaultError::AlreadyExists)
        ));
        cleanup(&manager);
    }

    #[test]
    fn test_short_passphrase_rejected() {
        let mut manager = scratch_manager();
        assert!(matches!(manager.create("short"), Err(VaultError::Invalid(_))));
        assert!(!manager.exists());
        cleanup(&manager);
    }

    #[test]
    fn test_update_and_remove_entries() {
        let mut manager = scratch_manager();
        manager.create(PASSPHRASE).unwrap();

        let summary = manager
            .add_entry(&VaultRecord::text("email", "old"), "passwords")
            .unwrap();
        let updated = manager
            .update_entry(&summary.id, &VaultRecord::text("email", "new"))
            .unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(manager.read_entry(&summary.id).unwrap().payload, "new");

        manager.flush().unwrap();
        manager.lock().unwrap();
        manager.open(PASSPHRASE).unwrap();
        assert_eq!(manager.list_entries().unwrap()[0].version, 2);

        manager.remove_entry(&summary.id).unwrap();
        assert!(manager.list_entries().unwrap().is_empty());
        assert!(matches!(
            manager.remove_entry(&summary.id),
            Err(VaultError::EntryNotFound(_))
        ));
        cleanup(&manager);
    }

    #[test]
    fn test_successor_unlocks_with_shares() {
        let mut owner = scratch_manager();
        owner.create(PASSPHRASE).unwrap();
        let id = owner
            .add_entry(&VaultRecord::text("letter", "to my heirs"), "letters")
            .unwrap()
            .id;
        let shares: Vec<Vec<u8>> = owner
            .split_master_key(5, 3)
            .unwrap()
            .iter()
            .map(|s| s.to_bytes().to_vec())
            .collect();
        owner.lock().unwrap();

        let mut successor = VaultManager::new(owner.data_dir());
        successor
            .unlock_with_shares(&[&shares[0], &shares[2], &shares[4]])
            .unwrap();
        assert_eq!(successor.unlock_method(), Some(UnlockMethod::Shares));
        assert_eq!(successor.read_entry(&id).unwrap().payload, "to my heirs");
        cleanup(&owner);
    }

    #[test]
    fn test_too_few_shares_detected_by_fingerprint() {
        let mut owner = scratch_manager();
        owner.create(PASSPHRASE).unwrap();
        let shares: Vec<[u8; 34]> = owner
            .split_master_key(5, 3)
            .unwrap()
            .iter()
            .map(SecretShare::to_bytes)
            .collect();
        owner.lock().unwrap();

        let mut successor = VaultManager::new(owner.data_dir());
        assert!(matches!(
            successor.unlock_with_shares(&shares[..2]),
            Err(VaultError::InvalidShares(_))
        ));
        assert!(matches!(
            successor.unlock_with_shares(&[shares[0], shares[0]]),
            Err(VaultError::InvalidShares(_))
        ));
        assert!(!successor.is_open());
        cleanup(&owner);
    }

    #[test]
    fn test_successor_sets_own_passphrase() {
        let mut owner = scratch_manager();
        owner.create(PASSPHRASE).unwrap();
        let key = MasterKey::from_slice(
            &sharing::reconstruct_shares(&owner.split_master_key(3, 2).unwrap()).unwrap(),
        )
        .unwrap();
        owner.lock().unwrap();

        let mut successor = VaultManager::new(owner.data_dir());
        successor.unlock_with_master_key(key).unwrap();
        successor.set_passphrase("successor passphrase").unwrap();
        successor.lock().unwrap();

        assert!(matches!(
            successor.open(PASSPHRASE),
            Err(VaultError::InvalidPassphrase)
        ));
        successor.open("successor passphrase").unwrap();
        cleanup(&owner);
    }

    #[test]
    fn test_foreign_master_key_rejected() {
        let mut manager = scratch_manager();
        manager.create(PASSPHRASE).unwrap();
        manager.lock().unwrap();

        assert!(matches!(
            manager.unlock_with_master_key(MasterKey::generate()),
            Err(VaultError::Invalid(_))
        ));
        cleanup(&manager);
    }

    #[test]
    fn test_destroy() {
        let mut manager = scratch_manager();
        manager.create(PASSPHRASE).unwrap();
        manager.destroy().unwrap();

        assert_eq!(manager.status(), VaultStatus::NotSetup);
        assert!(!manager.vault_path().exists());
        cleanup(&manager);
    }
}
