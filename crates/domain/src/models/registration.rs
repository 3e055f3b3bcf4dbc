//! Registration ledger models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Degree of the presenter, determines seat weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Degree {
    Phd,
    Msc,
}

/// Supervisor approval state of a registration.
///
/// `Declined` and `Expired` are terminal; rows in those states are kept for
/// audit but no longer count toward slot capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Declined,
    Expired,
}

impl ApprovalStatus {
    /// Active rows consume capacity and block duplicate registration.
    pub fn is_active(&self) -> bool {
        matches!(self, ApprovalStatus::Pending | ApprovalStatus::Approved)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

/// Supervisor decision carried by an approval link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approve,
    Decline,
}

/// A presenter's registration for a seminar slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Registration {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub presenter_username: String,
    pub degree: Degree,
    pub topic: String,
    pub supervisor_name: String,
    pub supervisor_email: String,
    pub approval_status: ApprovalStatus,
    /// Retained after resolution so a repeated approval-link click maps to
    /// a stable outcome instead of a lookup miss.
    pub approval_token: String,
    pub approval_token_expires_at: DateTime<Utc>,
    pub last_reminder_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Request to register a presenter into a slot.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 64, message = "presenter_username is required"))]
    pub presenter_username: String,

    pub degree: Degree,

    #[validate(length(min = 1, max = 500, message = "topic must be 1-500 characters"))]
    pub topic: String,

    #[validate(length(min = 1, max = 200, message = "supervisor_name is required"))]
    pub supervisor_name: String,

    #[validate(email(message = "supervisor_email must be a valid email address"))]
    pub supervisor_email: String,
}

/// Outcome of a registration attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum RegisterOutcome {
    /// A seat was free: registration created, awaiting supervisor approval.
    Registered { registration_id: Uuid },
    /// The slot was full: appended to the waiting list.
    Waitlisted { position: i32 },
}
