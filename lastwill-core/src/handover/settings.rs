use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::{LastWillError, Result};

/// Per-user inactivity configuration, owned by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InactivitySettings {
    pub user_id: String,
    pub threshold_days: u32,
    /// How long before the threshold the user should be warned (0 = never)
    pub warning_days: u32,
    pub require_majority: bool,
    pub is_paused: bool,
    /// End of the pause window; `None` pauses indefinitely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_until: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
}

/// A single-field change applied by the store under its own lock, so
/// concurrent check-ins and pauses never overwrite each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsUpdate {
    Activity(DateTime<Utc>),
    Pause(Option<DateTime<Utc>>),
    Resume,
}

/// Where a user stands relative to their inactivity threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InactivityState {
    Active,
    Paused,
    /// Inside the warning window, threshold not yet crossed
    Warning,
    /// Threshold crossed
    Inactive,
}

impl InactivitySettings {
    pub fn new(user_id: impl Into<String>, defaults: &Settings, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            threshold_days: defaults.default_threshold_days,
            warning_days: defaults.default_warning_days,
            require_majority: false,
            is_paused: false,
            paused_until: None,
            last_activity: now,
        }
    }

    pub fn with_threshold(mut self, threshold_days: u32, warning_days: u32) -> Self {
        self.threshold_days = threshold_days;
        self.warning_days = warning_days;
        self
    }

    pub fn with_require_majority(mut self, require_majority: bool) -> Self {
        self.require_majority = require_majority;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.user_id.is_empty() {
            return Err(LastWillError::Validation("User id must not be empty".into()));
        }
        if self.threshold_days == 0 {
            return Err(LastWillError::Validation(
                "Inactivity threshold must be at least one day".into(),
            ));
        }
        if self.warning_days >= self.threshold_days {
            return Err(LastWillError::Validation(format!(
                "Warning period {} must be shorter than threshold {}",
                self.warning_days, self.threshold_days
            )));
        }
        Ok(())
    }

    /// Paused, and the pause window (if any) has not elapsed yet.
    pub fn is_paused_at(&self, now: DateTime<Utc>) -> bool {
        self.is_paused && self.paused_until.map_or(true, |until| now < until)
    }

    pub fn inactive_for(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.last_activity)
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> InactivityState {
        if self.is_paused_at(now) {
            return InactivityState::Paused;
        }

        let elapsed = self.inactive_for(now);
        let threshold = Duration::days(i64::from(self.threshold_days));
        if elapsed >= threshold {
            return InactivityState::Inactive;
        }

        let warn_from =
            Duration::days(i64::from(self.threshold_days.saturating_sub(self.warning_days)));
        if self.warning_days > 0 && elapsed >= warn_from {
            InactivityState::Warning
        } else {
            InactivityState::Active
        }
    }

    /// Check-in: resets the inactivity clock.
    pub fn record_activity(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    pub fn pause(&mut self, until: Option<DateTime<Utc>>) {
        self.is_paused = true;
        self.paused_until = until;
    }

    pub fn resume(&mut self) {
        self.is_paused = false;
        self.paused_until = None;
    }

    pub fn apply(&mut self, update: SettingsUpdate) {
        match update {
            SettingsUpdate::Activity(at) => self.record_activity(at),
            SettingsUpdate::Pause(until) => self.pause(until),
            SettingsUpdate::Resume => self.resume(),
        }
    }
}
