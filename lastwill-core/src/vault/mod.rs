//! Encrypted vault storage.
//!
//! This module provides encrypted storage for the owner's estate:
//! - Account records and credentials
//! - Letters and attached files
//!
//! Entries are encrypted under the account master key. The key is wrapped
//! under an Argon2id-derived passphrase key for the owner, and can be rebuilt
//! from successor shares once a handover completes.

pub mod auth;
pub mod entry;
pub mod error;
pub mod manager;
pub mod salt;
pub mod storage;

pub use auth::{UnlockMethod, VaultStatus};
pub use entry::{EntrySummary, VaultEntry, VaultRecord};
pub use error::{VaultError, VaultResult};
pub use manager::VaultManager;
pub use storage::KdfParams;
