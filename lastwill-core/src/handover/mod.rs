//! Inactivity detection and the handover state machine.
//!
//! The sweep never touches key material. It only decides whether the access
//! layer may invite successors to submit their shares.

pub mod confirmation;
pub mod process;
pub mod service;
pub mod settings;
pub mod store;
pub mod sweeper;

pub use confirmation::ConfirmationTally;
pub use process::{HandoverEvent, HandoverProcess, HandoverStatus};
pub use service::{HandoverService, StopSignal, SweepReport};
pub use settings::{InactivitySettings, InactivityState, SettingsUpdate};
pub use store::{Escalation, FileStore, HandoverStore, Initiation, MemoryStore};
pub use sweeper::InactivitySweeper;
