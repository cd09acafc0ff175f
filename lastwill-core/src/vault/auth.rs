//! Vault unlock state.

use serde::{Deserialize, Serialize};

/// Represents the current state of the vault.
///
/// The vault transitions between these states:
/// - `NotSetup` → `Unlocked` (after `create`)
/// - `Unlocked` → `Locked` (after `lock`)
/// - `Locked` → `Unlocked` (passphrase, master key, or successor shares)
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum VaultStatus {
    /// No vault file in the data directory
    #[default]
    NotSetup,
    /// Vault exists but the master key is not loaded
    Locked,
    /// Master key loaded, entries readable
    Unlocked,
}

/// How the master key was obtained for the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockMethod {
    /// Owner passphrase unwrapped the stored key.
    Passphrase,
    /// Key handed in directly by the caller.
    MasterKey,
    /// Key rebuilt from successor shares.
    Shares,
}

impl std::fmt::Display for VaultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotSetup => write!(f, "NotSetup"),
            Self::Locked => write!(f, "Locked"),
            Self::Unlocked => write!(f, "Unlocked"),
        }
    }
}

impl std::fmt::Display for UnlockMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passphrase => write!(f, "passphrase"),
            Self::MasterKey => write!(f, "master_key"),
            Self::Shares => write!(f, "shares"),
        }
    }
}
