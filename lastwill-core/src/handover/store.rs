//! Persistence for inactivity settings and handover processes.
//!
//! Every state change goes through the store under its write lock. Status
//! changes apply only while the stored status still matches what the caller
//! saw, and sweep decisions are re-checked against the stored settings, so
//! overlapping sweeps and check-ins never need a lock of their own.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

use super::process::{HandoverEvent, HandoverProcess, HandoverStatus};
use super::settings::{InactivitySettings, InactivityState, SettingsUpdate};
use crate::error::{LastWillError, Result};

/// Result of asking the store to start a handover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Initiation {
    Created(HandoverProcess),
    /// An active process already existed and was left untouched.
    Existing(HandoverProcess),
}

impl Initiation {
    pub fn process(&self) -> &HandoverProcess {
        match self {
            Self::Created(p) | Self::Existing(p) => p,
        }
    }

    pub fn into_process(self) -> HandoverProcess {
        match self {
            Self::Created(p) | Self::Existing(p) => p,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Result of an expired grace period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Escalation {
    /// Moved to `PendingConfirmation`.
    Escalated(HandoverProcess),
    /// The owner checked in after the handover started; cancelled instead.
    Aborted(HandoverProcess),
    /// Not due, not in `GracePeriod`, or the owner is paused.
    Unchanged,
}

#[async_trait]
pub trait HandoverStore: Send + Sync {
    async fn upsert_settings(&self, settings: InactivitySettings) -> Result<()>;

    /// Apply one field change to the stored settings. `None` for an unknown user.
    async fn update_settings(
        &self,
        user_id: &str,
        update: SettingsUpdate,
    ) -> Result<Option<InactivitySettings>>;

    async fn settings(&self, user_id: &str) -> Result<Option<InactivitySettings>>;

    /// All users, ordered by id.
    async fn list_settings(&self) -> Result<Vec<InactivitySettings>>;

    async fn process(&self, id: &str) -> Result<Option<HandoverProcess>>;

    /// The process in `GracePeriod` or `PendingConfirmation` for this user.
    async fn active_process(&self, user_id: &str) -> Result<Option<HandoverProcess>>;

    /// Most recently initiated process for this user, in any status.
    async fn latest_process(&self, user_id: &str) -> Result<Option<HandoverProcess>>;

    /// Insert `process` unless the user already has an active one.
    async fn insert_if_no_active(&self, process: HandoverProcess) -> Result<Initiation>;

    /// Insert `process` only if its owner's stored settings are inactive at
    /// `now` and no finished handover already covers this inactivity period.
    /// `None` when the owner is not due.
    async fn initiate_if_inactive(
        &self,
        process: HandoverProcess,
        now: DateTime<Utc>,
    ) -> Result<Option<Initiation>>;

    /// Processes in `GracePeriod` whose grace period ended at or before `now`.
    async fn due_grace_periods(&self, now: DateTime<Utc>) -> Result<Vec<HandoverProcess>>;

    /// Escalate process `id` if its grace period is over and its owner has
    /// stayed inactive since it started.
    async fn expire_grace_period(&self, id: &str, now: DateTime<Utc>) -> Result<Escalation>;

    /// Apply `event` to process `id` only if its stored status is `expected`
    /// and the transition is allowed. Returns the updated record, or `None`
    /// when nothing was written.
    async fn compare_and_set(
        &self,
        id: &str,
        expected: HandoverStatus,
        event: HandoverEvent,
        now: DateTime<Utc>,
    ) -> Result<Option<HandoverProcess>>;
}

/// Store contents, shared by both store implementations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreState {
    #[serde(default)]
    settings: BTreeMap<String, InactivitySettings>,
    #[serde(default)]
    processes: BTreeMap<String, HandoverProcess>,
}

impl StoreState {
    fn update_settings(
        &mut self,
        user_id: &str,
        update: SettingsUpdate,
    ) -> Option<InactivitySettings> {
        let settings = self.settings.get_mut(user_id)?;
        settings.apply(update);
        Some(settings.clone())
    }

    fn active_process(&self, user_id: &str) -> Option<&HandoverProcess> {
        self.processes
            .values()
            .find(|p| p.user_id == user_id && p.is_active())
    }

    fn latest_process(&self, user_id: &str) -> Option<&HandoverProcess> {
        self.processes
            .values()
            .filter(|p| p.user_id == user_id)
            .max_by_key(|p| p.initiated_at)
    }

    fn insert_if_no_active(&mut self, process: HandoverProcess) -> Initiation {
        if let Some(existing) = self.active_process(&process.user_id) {
            return Initiation::Existing(existing.clone());
        }
        self.processes.insert(process.id.clone(), process.clone());
        Initiation::Created(process)
    }

    fn initiate_if_inactive(
        &mut self,
        process: HandoverProcess,
        now: DateTime<Utc>,
    ) -> Option<Initiation> {
        let settings = self.settings.get(&process.user_id)?;
        if settings.state_at(now) != InactivityState::Inactive {
            debug!("User {} is no longer inactive", process.user_id);
            return None;
        }
        let last_activity = settings.last_activity;

        // One handover per inactivity period: a finished one is not restarted
        if let Some(latest) = self.latest_process(&process.user_id) {
            if latest.status.is_terminal() && latest.initiated_at >= last_activity {
                debug!(
                    "User {} already has a {} handover for this inactivity period",
                    process.user_id, latest.status
                );
                return None;
            }
        }

        Some(self.insert_if_no_active(process))
    }

    fn due_grace_periods(&self, now: DateTime<Utc>) -> Vec<HandoverProcess> {
        let mut due: Vec<_> = self
            .processes
            .values()
            .filter(|p| p.status == HandoverStatus::GracePeriod && p.grace_period_elapsed(now))
            .cloned()
            .collect();
        due.sort_by_key(|p| p.grace_period_ends);
        due
    }

    fn expire_grace_period(&mut self, id: &str, now: DateTime<Utc>) -> Escalation {
        let Some(process) = self.processes.get(id) else {
            return Escalation::Unchanged;
        };
        if !process.grace_period_elapsed(now) {
            return Escalation::Unchanged;
        }

        let event = match self.settings.get(&process.user_id) {
            Some(owner) if owner.last_activity > process.initiated_at => HandoverEvent::Cancel,
            Some(owner) if owner.is_paused_at(now) => {
                debug!("Owner of handover {} is paused; holding escalation", id);
                return Escalation::Unchanged;
            }
            _ => HandoverEvent::GraceExpired,
        };

        match self.compare_and_set(id, HandoverStatus::GracePeriod, event, now) {
            Some(p) if p.status == HandoverStatus::Cancelled => Escalation::Aborted(p),
            Some(p) => Escalation::Escalated(p),
            None => Escalation::Unchanged,
        }
    }

    fn compare_and_set(
        &mut self,
        id: &str,
        expected: HandoverStatus,
        event: HandoverEvent,
        now: DateTime<Utc>,
    ) -> Option<HandoverProcess> {
        let current = self.processes.get_mut(id)?;
        if current.status != expected {
            debug!(
                "Process {} is {}, expected {}; skipping {:?}",
                id, current.status, expected, event
            );
            return None;
        }

        let next = current.transition(event, now)?;
        *current = next.clone();
        Some(next)
    }
}

/// In-memory store guarded by a tokio `RwLock`.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HandoverStore for MemoryStore {
    async fn upsert_settings(&self, settings: InactivitySettings) -> Result<()> {
        let mut state = self.state.write().await;
        state.settings.insert(settings.user_id.clone(), settings);
        Ok(())
    }

    async fn update_settings(
        &self,
        user_id: &str,
        update: SettingsUpdate,
    ) -> Result<Option<InactivitySettings>> {
        Ok(self.state.write().await.update_settings(user_id, update))
    }

    async fn settings(&self, user_id: &str) -> Result<Option<InactivitySettings>> {
        Ok(self.state.read().await.settings.get(user_id).cloned())
    }

    async fn list_settings(&self) -> Result<Vec<InactivitySettings>> {
        Ok(self.state.read().await.settings.values().cloned().collect())
    }

    async fn process(&self, id: &str) -> Result<Option<HandoverProcess>> {
        Ok(self.state.read().await.processes.get(id).cloned())
    }

    async fn active_process(&self, user_id: &str) -> Result<Option<HandoverProcess>> {
        Ok(self.state.read().await.active_process(user_id).cloned())
    }

    async fn latest_process(&self, user_id: &str) -> Result<Option<HandoverProcess>> {
        Ok(self.state.read().await.latest_process(user_id).cloned())
    }

    async fn insert_if_no_active(&self, process: HandoverProcess) -> Result<Initiation> {
        Ok(self.state.write().await.insert_if_no_active(process))
    }

    async fn initiate_if_inactive(
        &self,
        process: HandoverProcess,
        now: DateTime<Utc>,
    ) -> Result<Option<Initiation>> {
        Ok(self.state.write().await.initiate_if_inactive(process, now))
    }

    async fn due_grace_periods(&self, now: DateTime<Utc>) -> Result<Vec<HandoverProcess>> {
        Ok(self.state.read().await.due_grace_periods(now))
    }

    async fn expire_grace_period(&self, id: &str, now: DateTime<Utc>) -> Result<Escalation> {
        Ok(self.state.write().await.expire_grace_period(id, now))
    }

    async fn compare_and_set(
        &self,
        id: &str,
        expected: HandoverStatus,
        event: HandoverEvent,
        now: DateTime<Utc>,
    ) -> Result<Option<HandoverProcess>> {
        Ok(self
            .state
            .write()
            .await
            .compare_and_set(id, expected, event, now))
    }
}

/// Store kept in memory and written to a JSON snapshot on every mutation.
///
/// A mutation is applied to a copy of the state, and the copy replaces the
/// in-memory state only after its snapshot is on disk. A failed write leaves
/// both untouched.
pub struct FileStore {
    path: PathBuf,
    state: RwLock<StoreState>,
}

impl FileStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = if tokio::fs::try_exists(&path).await? {
            let content = tokio::fs::read(&path).await?;
            serde_json::from_slice(&content)?
        } else {
            StoreState::default()
        };

        debug!(
            "Loaded handover store from {:?} ({} users, {} processes)",
            path,
            state.settings.len(),
            state.processes.len()
        );

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `change` against a copy of the state. When it reports a change,
    /// the copy is written out and then swapped in, all under the write lock.
    async fn commit<T>(&self, change: impl FnOnce(&mut StoreState) -> (T, bool)) -> Result<T> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        let (outcome, changed) = change(&mut next);
        if changed {
            self.write_snapshot(&next).await?;
            *state = next;
        }
        Ok(outcome)
    }

    async fn write_snapshot(&self, state: &StoreState) -> Result<()> {
        let content = serde_json::to_vec_pretty(state)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &content).await?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| LastWillError::Storage(format!("Failed to replace snapshot: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl HandoverStore for FileStore {
    async fn upsert_settings(&self, settings: InactivitySettings) -> Result<()> {
        self.commit(|state| {
            state.settings.insert(settings.user_id.clone(), settings);
            ((), true)
        })
        .await
    }

    async fn update_settings(
        &self,
        user_id: &str,
        update: SettingsUpdate,
    ) -> Result<Option<InactivitySettings>> {
        self.commit(|state| {
            let updated = state.update_settings(user_id, update);
            let changed = updated.is_some();
            (updated, changed)
        })
        .await
    }

    async fn settings(&self, user_id: &str) -> Result<Option<InactivitySettings>> {
        Ok(self.state.read().await.settings.get(user_id).cloned())
    }

    async fn list_settings(&self) -> Result<Vec<InactivitySettings>> {
        Ok(self.state.read().await.settings.values().cloned().collect())
    }

    async fn process(&self, id: &str) -> Result<Option<HandoverProcess>> {
        Ok(self.state.read().await.processes.get(id).cloned())
    }

    async fn active_process(&self, user_id: &str) -> Result<Option<HandoverProcess>> {
        Ok(self.state.read().await.active_process(user_id).cloned())
    }

    async fn latest_process(&self, user_id: &str) -> Result<Option<HandoverProcess>> {
        Ok(self.state.read().await.latest_process(user_id).cloned())
    }

    async fn insert_if_no_active(&self, process: HandoverProcess) -> Result<Initiation> {
        self.commit(|state| {
            let outcome = state.insert_if_no_active(process);
            let changed = outcome.is_created();
            (outcome, changed)
        })
        .await
    }

    async fn initiate_if_inactive(
        &self,
        process: HandoverProcess,
        now: DateTime<Utc>,
    ) -> Result<Option<Initiation>> {
        self.commit(|state| {
            let outcome = state.initiate_if_inactive(process, now);
            let changed = outcome.as_ref().is_some_and(Initiation::is_created);
            (outcome, changed)
        })
        .await
    }

    async fn due_grace_periods(&self, now: DateTime<Utc>) -> Result<Vec<HandoverProcess>> {
        Ok(self.state.read().await.due_grace_periods(now))
    }

    async fn expire_grace_period(&self, id: &str, now: DateTime<Utc>) -> Result<Escalation> {
        self.commit(|state| {
            let outcome = state.expire_grace_period(id, now);
            let changed = outcome != Escalation::Unchanged;
            (outcome, changed)
        })
        .await
    }

    async fn compare_and_set(
        &self,
        id: &str,
        expected: HandoverStatus,
        event: HandoverEvent,
        now: DateTime<Utc>,
    ) -> Result<Option<HandoverProcess>> {
        self.commit(|state| {
            let updated = state.compare_and_set(id, expected, event, now);
            let changed = updated.is_some();
            (updated, changed)
        })
        .await
    }
}
