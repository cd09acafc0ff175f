//! Threshold secret sharing of the account master key.
//!
//! The master key is split into one share per successor. Any `threshold`
//! of them recover it; fewer reveal nothing about it.

pub mod field;
pub mod shamir;
pub mod share;

pub use shamir::{reconstruct, reconstruct_shares, split, split_to_bytes, verify};
pub use share::{SecretShare, MAX_SECRET_LEN, MAX_SHARES, SHARE_LEN};
