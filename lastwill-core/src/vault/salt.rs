//! Salt manager for Argon2 key derivation.
//!
//! Each vault directory holds a unique 16-byte salt in `salt.bin`, used with
//! Argon2id to derive the key that wraps the master key.

use aes_gcm::aead::{rand_core::RngCore, OsRng};
use std::path::{Path, PathBuf};

use super::error::{VaultError, VaultResult};

/// Salt size in bytes (128 bits)
pub const SALT_SIZE: usize = 16;

const SALT_FILE_NAME: &str = "salt.bin";

fn salt_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SALT_FILE_NAME)
}

/// Get the existing salt or create a new one.
///
/// # Errors
/// Returns an error if the stored salt has the wrong size or if file
/// operations fail.
pub fn get_or_create_salt(data_dir: &Path) -> VaultResult<[u8; SALT_SIZE]> {
    let path = salt_path(data_dir);

    if path.exists() {
        let bytes = std::fs::read(&path)?;
        let salt: [u8; SALT_SIZE] = bytes.as_slice().try_into().map_err(|_| {
            VaultError::Salt(format!(
                "Invalid salt file size: expected {} bytes, got {}",
                SALT_SIZE,
                bytes.len()
            ))
        })?;
        return Ok(salt);
    }

    // Generate new cryptographically secure salt
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);

    std::fs::create_dir_all(data_dir)?;
    std::fs::write(&path, salt)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&path)?.permissions();
        perms.set_mode(0o600);
        std::fs::set_permissions(&path, perms)?;
    }

    Ok(salt)
}

/// Load the salt of an existing vault without creating one.
pub fn load_salt(data_dir: &Path) -> VaultResult<[u8; SALT_SIZE]> {
    if !salt_path(data_dir).exists() {
        return Err(VaultError::Salt("Salt file is missing".into()));
    }
    get_or_create_salt(data_dir)
}

/// Delete the salt file.
///
/// Returns `Ok(())` if the file doesn't exist.
pub fn delete_salt(data_dir: &Path) -> VaultResult<()> {
    let path = salt_path(data_dir);

    if path.exists() {
        std::fs::remove_file(&path)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("lastwill-salt-{}", Uuid::new_v4()))
    }

    #[test]
    fn test_salt_persists() {
        let dir = scratch_dir();
        let first = get_or_create_salt(&dir).unwrap();
        let second = get_or_create_salt(&dir).unwrap();
        assert_eq!(first, second);
        assert_eq!(load_salt(&dir).unwrap(), first);

        delete_salt(&dir).unwrap();
        assert!(load_salt(&dir).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_bad_salt_size_rejected() {
        let dir = scratch_dir();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(SALT_FILE_NAME), [1u8; 5]).unwrap();

        assert!(matches!(get_or_create_salt(&dir), Err(VaultError::Salt(_))));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
