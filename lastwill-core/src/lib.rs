pub mod config;
pub mod envelope;
pub mod error;
pub mod handover;
pub mod sharing;
pub mod vault;

pub use config::{load_settings, save_settings, Settings, GRACE_PERIOD_DAYS};
pub use envelope::{decrypt, encrypt, Algorithm, EncryptOptions, EncryptedEnvelope, MasterKey};
pub use error::{LastWillError, ReconstructionError, Result};
pub use handover::{
    ConfirmationTally, FileStore, HandoverProcess, HandoverService, HandoverStatus,
    HandoverStore, InactivitySettings, InactivitySweeper, MemoryStore, SettingsUpdate,
    SweepReport,
};
pub use sharing::{reconstruct, split, SecretShare};
pub use vault::{VaultError, VaultManager, VaultRecord, VaultStatus};
