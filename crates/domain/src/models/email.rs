//! Email queue models and retry policy.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which workflow email this is. Determines the template and, for some
/// types, the recipient role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailType {
    /// Registration or promotion-offer confirmation to the presenter.
    StudentConfirmation,
    /// Approval link to the supervisor.
    SupervisorApproval,
    /// Re-sent approval link after a quiet period.
    SupervisorReminder,
    /// Approval window lapsed without a decision.
    ExpirationWarning,
    /// Supervisor decision outcome to the presenter.
    ApprovalNotification,
    ExportEmail,
    /// Informational notice to the presenter (e.g. reminder was sent).
    SupervisorNotification,
    BugReport,
}

/// Delivery state of a queued email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    Pending,
    /// Claimed by a worker; reset back to pending if the worker dies.
    Processing,
    Sent,
    Failed,
    Cancelled,
}

impl EmailStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EmailStatus::Sent | EmailStatus::Failed | EmailStatus::Cancelled
        )
    }
}

/// A queued outbound email.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct QueuedEmail {
    pub id: Uuid,
    pub email_type: EmailType,
    pub to_email: String,
    pub cc_email: Option<String>,
    pub bcc_email: Option<String>,
    pub subject: String,
    pub html_body: String,
    pub status: EmailStatus,
    pub retry_count: i32,
    pub max_retries: i32,
    pub last_error: Option<String>,
    pub last_error_code: Option<String>,
    pub registration_id: Option<Uuid>,
    pub slot_id: Option<Uuid>,
    pub presenter_username: Option<String>,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// A new email to enqueue. `scheduled_at = None` means deliver as soon as
/// the worker picks it up.
#[derive(Debug, Clone)]
pub struct NewEmail {
    pub email_type: EmailType,
    pub to_email: String,
    pub cc_email: Option<String>,
    pub bcc_email: Option<String>,
    pub subject: String,
    pub html_body: String,
    pub registration_id: Option<Uuid>,
    pub slot_id: Option<Uuid>,
    pub presenter_username: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl NewEmail {
    pub fn new(email_type: EmailType, to_email: impl Into<String>) -> Self {
        Self {
            email_type,
            to_email: to_email.into(),
            cc_email: None,
            bcc_email: None,
            subject: String::new(),
            html_body: String::new(),
            registration_id: None,
            slot_id: None,
            presenter_username: None,
            scheduled_at: None,
        }
    }
}

/// What to do with an email after a delivery failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    /// Re-queue with the given delay.
    Retry { delay_seconds: i64 },
    /// Retry budget spent, mark failed.
    Exhausted,
}

/// Backoff schedule for failed deliveries.
///
/// The delay before retry `n` (1-based) is
/// `initial_backoff_minutes * multiplier^(n-1)`. A multiplier of 1.0 gives a
/// fixed delay; 3.0 with a 5-minute initial gives 5/15/45 minutes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryPolicy {
    pub max_retries: i32,
    pub initial_backoff_minutes: i64,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_minutes: 5,
            multiplier: 1.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry attempt (1-based).
    pub fn backoff(&self, retry_count: i32) -> Duration {
        let exponent = (retry_count - 1).max(0);
        let minutes = self.initial_backoff_minutes as f64 * self.multiplier.powi(exponent);
        Duration::seconds((minutes * 60.0) as i64)
    }

    /// Decide the disposition after a failure has bumped `retry_count`.
    /// `max_retries` is taken per-row so individual emails can override it.
    pub fn after_failure(&self, retry_count: i32, max_retries: i32) -> RetryDisposition {
        if retry_count >= max_retries {
            RetryDisposition::Exhausted
        } else {
            RetryDisposition::Retry {
                delay_seconds: self.backoff(retry_count).num_seconds(),
            }
        }
    }
}
