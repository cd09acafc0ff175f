//! The handover state machine driven by the periodic sweep.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use super::confirmation::ConfirmationTally;
use super::process::{HandoverEvent, HandoverProcess, HandoverStatus};
use super::settings::{InactivitySettings, InactivityState, SettingsUpdate};
use super::store::{Escalation, HandoverStore, Initiation};
use crate::config::Settings;
use crate::error::{LastWillError, Result};

/// Cooperative stop request shared between the sweep and whoever owns it.
///
/// Checked between users, never in the middle of a transition.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    requested: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolves once `request` is called.
    pub async fn requested(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_requested() {
                return;
            }
            notified.await;
        }
    }
}

/// Counts from one sweep, for logs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Users inside their warning window
    pub warned: usize,
    /// New processes entering the grace period
    pub initiated: usize,
    /// Processes moved to confirmation
    pub escalated: usize,
    /// Users or processes skipped because of an error
    pub failed: usize,
    /// The sweep ended early on a stop request
    pub stopped: bool,
}

/// What the sweep did for one user.
enum UserOutcome {
    Idle,
    Warned,
    Initiated,
}

pub struct HandoverService<S: HandoverStore> {
    store: Arc<S>,
    grace_period: Duration,
    stop: StopSignal,
}

impl<S: HandoverStore> HandoverService<S> {
    pub fn new(store: Arc<S>, grace_period_days: u32) -> Self {
        Self {
            store,
            grace_period: Duration::days(i64::from(grace_period_days)),
            stop: StopSignal::new(),
        }
    }

    pub fn from_settings(store: Arc<S>, settings: &Settings) -> Self {
        Self::new(store, settings.grace_period_days)
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Stop signal consulted by [`sweep`](Self::sweep).
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Register a user or replace their inactivity settings.
    pub async fn upsert_settings(&self, settings: InactivitySettings) -> Result<()> {
        settings.validate()?;
        self.store.upsert_settings(settings).await
    }

    async fn require_settings(&self, user_id: &str) -> Result<InactivitySettings> {
        self.store
            .settings(user_id)
            .await?
            .ok_or_else(|| unknown_user(user_id))
    }

    async fn update_settings(
        &self,
        user_id: &str,
        update: SettingsUpdate,
    ) -> Result<InactivitySettings> {
        self.store
            .update_settings(user_id, update)
            .await?
            .ok_or_else(|| unknown_user(user_id))
    }

    /// Scheduler entry point: one sweep at the current time.
    pub async fn run_once(&self) {
        self.run_once_with(&self.stop).await;
    }

    pub async fn run_once_with(&self, stop: &StopSignal) {
        let report = self.sweep_with(Utc::now(), stop).await;
        info!(
            "Sweep finished: {} initiated, {} escalated, {} warned, {} failed{}",
            report.initiated,
            report.escalated,
            report.warned,
            report.failed,
            if report.stopped { " (stopped early)" } else { "" }
        );
    }

    /// Start handovers for inactive users, then escalate expired grace periods.
    ///
    /// Failures for one user or process are logged and counted; they never
    /// abort the rest of the batch.
    pub async fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        self.sweep_with(now, &self.stop).await
    }

    /// [`sweep`](Self::sweep) with a caller-owned stop signal.
    pub async fn sweep_with(&self, now: DateTime<Utc>, stop: &StopSignal) -> SweepReport {
        let mut report = SweepReport::default();

        self.initiate_inactive(now, stop, &mut report).await;
        if !report.stopped {
            self.expire_grace_periods(now, stop, &mut report).await;
        }

        report
    }

    async fn initiate_inactive(
        &self,
        now: DateTime<Utc>,
        stop: &StopSignal,
        report: &mut SweepReport,
    ) {
        let users = match self.store.list_settings().await {
            Ok(users) => users,
            Err(e) => {
                error!("Failed to list users for sweep: {}", e);
                report.failed += 1;
                return;
            }
        };

        for settings in users {
            if stop.is_requested() {
                info!("Stop requested, ending sweep before user {}", settings.user_id);
                report.stopped = true;
                return;
            }

            match self.sweep_user(&settings, now).await {
                Ok(UserOutcome::Idle) => {}
                Ok(UserOutcome::Warned) => report.warned += 1,
                Ok(UserOutcome::Initiated) => report.initiated += 1,
                Err(e) => {
                    warn!("Skipping user {} after sweep error: {}", settings.user_id, e);
                    report.failed += 1;
                }
            }
        }
    }

    async fn sweep_user(
        &self,
        settings: &InactivitySettings,
        now: DateTime<Utc>,
    ) -> Result<UserOutcome> {
        match settings.state_at(now) {
            InactivityState::Active => Ok(UserOutcome::Idle),
            InactivityState::Paused => {
                debug!("User {} is paused", settings.user_id);
                Ok(UserOutcome::Idle)
            }
            InactivityState::Warning => {
                debug!("User {} is inside the warning window", settings.user_id);
                Ok(UserOutcome::Warned)
            }
            InactivityState::Inactive => {
                // The listing may be stale; the store re-checks the owner
                let process = HandoverProcess::new(&settings.user_id, now, self.grace_period);
                match self.store.initiate_if_inactive(process, now).await? {
                    Some(initiation) => {
                        log_initiation(&initiation);
                        Ok(if initiation.is_created() {
                            UserOutcome::Initiated
                        } else {
                            UserOutcome::Idle
                        })
                    }
                    None => Ok(UserOutcome::Idle),
                }
            }
        }
    }

    /// Start a handover for `user_id` now, regardless of inactivity, or
    /// return the one already active.
    pub async fn initiate(&self, user_id: &str, now: DateTime<Utc>) -> Result<Initiation> {
        let process = HandoverProcess::new(user_id, now, self.grace_period);
        let initiation = self.store.insert_if_no_active(process).await?;
        log_initiation(&initiation);
        Ok(initiation)
    }

    async fn expire_grace_periods(
        &self,
        now: DateTime<Utc>,
        stop: &StopSignal,
        report: &mut SweepReport,
    ) {
        let due = match self.store.due_grace_periods(now).await {
            Ok(due) => due,
            Err(e) => {
                error!("Failed to list expired grace periods: {}", e);
                report.failed += 1;
                return;
            }
        };

        for process in due {
            if stop.is_requested() {
                info!("Stop requested, leaving handover {} in grace period", process.id);
                report.stopped = true;
                return;
            }

            match self.expire_grace_period(&process.id, now).await {
                Ok(true) => report.escalated += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!("Failed to escalate handover {}: {}", process.id, e);
                    report.failed += 1;
                }
            }
        }
    }

    /// Move one process from `GracePeriod` to `PendingConfirmation`.
    ///
    /// `false` if the process was cancelled concurrently, is not due yet, or
    /// its owner is paused. A process whose owner checked in after it started
    /// is cancelled here instead.
    pub async fn expire_grace_period(&self, process_id: &str, now: DateTime<Utc>) -> Result<bool> {
        match self.store.expire_grace_period(process_id, now).await? {
            Escalation::Escalated(p) => {
                info!(
                    "Handover {} for user {} is awaiting successor confirmation",
                    p.id, p.user_id
                );
                Ok(true)
            }
            Escalation::Aborted(p) => {
                info!(
                    "Handover {} for user {} cancelled: owner active since it started",
                    p.id, p.user_id
                );
                Ok(false)
            }
            Escalation::Unchanged => {
                debug!("Handover {} was not escalated", process_id);
                Ok(false)
            }
        }
    }

    /// Cancel an active process. `false` if it was already terminal.
    pub async fn cancel(&self, process_id: &str, now: DateTime<Utc>) -> Result<bool> {
        // A concurrent escalation between the two attempts is caught by the second
        for expected in [HandoverStatus::GracePeriod, HandoverStatus::PendingConfirmation] {
            let updated = self
                .store
                .compare_and_set(process_id, expected, HandoverEvent::Cancel, now)
                .await?;
            if let Some(p) = updated {
                info!("Handover {} for user {} cancelled", p.id, p.user_id);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Complete a process once successor verification satisfies the user's
    /// confirmation policy. `false` if the policy is not met or the process is
    /// not in `PendingConfirmation`.
    pub async fn complete(
        &self,
        process_id: &str,
        tally: &ConfirmationTally,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(process) = self.store.process(process_id).await? else {
            return Ok(false);
        };
        let settings = self.require_settings(&process.user_id).await?;

        if !tally.is_satisfied(settings.require_majority) {
            debug!(
                "Handover {}: {}/{} verifications do not satisfy the policy yet",
                process_id, tally.verified, tally.total_successors
            );
            return Ok(false);
        }

        let updated = self
            .store
            .compare_and_set(
                process_id,
                HandoverStatus::PendingConfirmation,
                HandoverEvent::Confirmed,
                now,
            )
            .await?;

        match updated {
            Some(p) => {
                info!("Handover {} for user {} completed", p.id, p.user_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Owner check-in: resets the inactivity clock and cancels any active
    /// handover. Returns whether a handover was cancelled.
    pub async fn record_activity(&self, user_id: &str, now: DateTime<Utc>) -> Result<bool> {
        self.update_settings(user_id, SettingsUpdate::Activity(now)).await?;
        debug!("Recorded activity for user {}", user_id);

        match self.store.active_process(user_id).await? {
            Some(process) => self.cancel(&process.id, now).await,
            None => Ok(false),
        }
    }

    /// Suspend inactivity tracking until `until`, or indefinitely.
    pub async fn pause(&self, user_id: &str, until: Option<DateTime<Utc>>) -> Result<()> {
        self.update_settings(user_id, SettingsUpdate::Pause(until)).await?;
        info!("Inactivity tracking paused for user {}", user_id);
        Ok(())
    }

    pub async fn resume(&self, user_id: &str) -> Result<()> {
        self.update_settings(user_id, SettingsUpdate::Resume).await?;
        info!("Inactivity tracking resumed for user {}", user_id);
        Ok(())
    }

    /// The user's most recent handover, for the notification and access layers.
    pub async fn current_process(&self, user_id: &str) -> Result<Option<HandoverProcess>> {
        self.store.latest_process(user_id).await
    }
}

fn unknown_user(user_id: &str) -> LastWillError {
    LastWillError::Validation(format!("Unknown user {}", user_id))
}

fn log_initiation(initiation: &Initiation) {
    match initiation {
        Initiation::Created(p) => info!(
            "Handover {} started for user {}, grace period ends {}",
            p.id, p.user_id, p.grace_period_ends
        ),
        Initiation::Existing(p) => debug!(
            "Handover {} already active for user {} ({})",
            p.id, p.user_id, p.status
        ),
    }
}
