use serde::{Deserialize, Serialize};

use crate::error::{LastWillError, Result};

/// Successor verification progress reported by the access layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationTally {
    pub verified: usize,
    pub total_successors: usize,
    /// Verifications needed when no majority is required
    pub threshold: usize,
}

impl ConfirmationTally {
    pub fn new(verified: usize, total_successors: usize, threshold: usize) -> Result<Self> {
        if total_successors == 0 {
            return Err(LastWillError::Validation(
                "At least one successor is required".into(),
            ));
        }
        if threshold == 0 || threshold > total_successors {
            return Err(LastWillError::Validation(format!(
                "Confirmation threshold {} must be within 1..={}",
                threshold, total_successors
            )));
        }
        if verified > total_successors {
            return Err(LastWillError::Validation(format!(
                "{} verifications reported for {} successors",
                verified, total_successors
            )));
        }

        Ok(Self {
            verified,
            total_successors,
            threshold,
        })
    }

    /// Strict majority of all successors with `require_majority`, otherwise
    /// the configured threshold.
    pub fn is_satisfied(&self, require_majority: bool) -> bool {
        if require_majority {
            self.verified > self.total_successors / 2
        } else {
            self.verified >= self.threshold
        }
    }
}
