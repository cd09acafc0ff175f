use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LastWillError, Result};

/// Days a handover stays in its grace period unless configured otherwise.
pub const GRACE_PERIOD_DAYS: u32 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub grace_period_days: u32,
    pub sweep_interval_secs: u64,
    /// Applied to users registered without their own threshold
    pub default_threshold_days: u32,
    pub default_warning_days: u32,
    pub data_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            grace_period_days: GRACE_PERIOD_DAYS,
            sweep_interval_secs: 3600,
            default_threshold_days: 90,
            default_warning_days: 14,
            data_dir: None,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.grace_period_days == 0 {
            return Err(LastWillError::Config(
                "grace_period_days must be positive".into(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(LastWillError::Config(
                "sweep_interval_secs must be positive".into(),
            ));
        }
        if self.default_threshold_days == 0 {
            return Err(LastWillError::Config(
                "default_threshold_days must be positive".into(),
            ));
        }
        if self.default_warning_days >= self.default_threshold_days {
            return Err(LastWillError::Config(
                "default_warning_days must be below default_threshold_days".into(),
            ));
        }
        Ok(())
    }
}

/// Load settings from a JSON file, falling back to defaults if it is missing.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let content = std::fs::read_to_string(path)?;
    let settings: Settings = serde_json::from_str(&content)?;
    settings.validate()?;
    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, content)?;
    Ok(())
}
