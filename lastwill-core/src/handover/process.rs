use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a handover.
///
/// `GracePeriod -> PendingConfirmation -> Completed`, with `Cancelled`
/// reachable from both active states. Nothing is re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandoverStatus {
    GracePeriod,
    PendingConfirmation,
    Completed,
    Cancelled,
}

impl HandoverStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::GracePeriod | Self::PendingConfirmation)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Next status for `event`, or `None` if the event is not allowed here.
    pub fn apply(self, event: HandoverEvent) -> Option<Self> {
        match (self, event) {
            (Self::GracePeriod, HandoverEvent::GraceExpired) => Some(Self::PendingConfirmation),
            (Self::PendingConfirmation, HandoverEvent::Confirmed) => Some(Self::Completed),
            (Self::GracePeriod | Self::PendingConfirmation, HandoverEvent::Cancel) => {
                Some(Self::Cancelled)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for HandoverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GracePeriod => write!(f, "GRACE_PERIOD"),
            Self::PendingConfirmation => write!(f, "PENDING_CONFIRMATION"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Things that move a handover forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoverEvent {
    /// The grace period ran out without a check-in.
    GraceExpired,
    /// Successor verification met the confirmation policy.
    Confirmed,
    /// Owner check-in or explicit abort.
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoverProcess {
    pub id: String,
    pub user_id: String,
    pub status: HandoverStatus,
    pub initiated_at: DateTime<Utc>,
    pub grace_period_ends: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl HandoverProcess {
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>, grace_period: Duration) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            status: HandoverStatus::GracePeriod,
            initiated_at: now,
            grace_period_ends: now + grace_period,
            completed_at: None,
            cancelled_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn grace_period_elapsed(&self, now: DateTime<Utc>) -> bool {
        now >= self.grace_period_ends
    }

    /// The record this process becomes after `event`, if the event applies.
    ///
    /// Pure: the store decides whether to write it, and only does so while
    /// the stored status still equals `self.status`.
    pub fn transition(&self, event: HandoverEvent, now: DateTime<Utc>) -> Option<Self> {
        if event == HandoverEvent::GraceExpired && !self.grace_period_elapsed(now) {
            return None;
        }

        let status = self.status.apply(event)?;
        let mut next = self.clone();
        next.status = status;
        match status {
            HandoverStatus::Completed => next.completed_at = Some(now),
            HandoverStatus::Cancelled => next.cancelled_at = Some(now),
            _ => {}
        }
        Some(next)
    }
}
