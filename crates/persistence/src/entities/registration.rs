//! Registration entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::models::{ApprovalStatus, Degree, Registration};

/// Database representation of a presenter degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "degree", rename_all = "lowercase")]
pub enum DegreeDb {
    Phd,
    Msc,
}

impl From<DegreeDb> for Degree {
    fn from(db: DegreeDb) -> Self {
        match db {
            DegreeDb::Phd => Degree::Phd,
            DegreeDb::Msc => Degree::Msc,
        }
    }
}

impl From<Degree> for DegreeDb {
    fn from(degree: Degree) -> Self {
        match degree {
            Degree::Phd => DegreeDb::Phd,
            Degree::Msc => DegreeDb::Msc,
        }
    }
}

/// Database representation of the approval status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "approval_status", rename_all = "lowercase")]
pub enum ApprovalStatusDb {
    Pending,
    Approved,
    Declined,
    Expired,
}

impl From<ApprovalStatusDb> for ApprovalStatus {
    fn from(db: ApprovalStatusDb) -> Self {
        match db {
            ApprovalStatusDb::Pending => ApprovalStatus::Pending,
            ApprovalStatusDb::Approved => ApprovalStatus::Approved,
            ApprovalStatusDb::Declined => ApprovalStatus::Declined,
            ApprovalStatusDb::Expired => ApprovalStatus::Expired,
        }
    }
}

impl From<ApprovalStatus> for ApprovalStatusDb {
    fn from(status: ApprovalStatus) -> Self {
        match status {
            ApprovalStatus::Pending => ApprovalStatusDb::Pending,
            ApprovalStatus::Approved => ApprovalStatusDb::Approved,
            ApprovalStatus::Declined => ApprovalStatusDb::Declined,
            ApprovalStatus::Expired => ApprovalStatusDb::Expired,
        }
    }
}

/// Database row mapping for the slot_registrations table.
#[derive(Debug, Clone, FromRow)]
pub struct RegistrationEntity {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub presenter_username: String,
    pub degree: DegreeDb,
    pub topic: String,
    pub supervisor_name: String,
    pub supervisor_email: String,
    pub approval_status: ApprovalStatusDb,
    pub approval_token: String,
    pub approval_token_expires_at: DateTime<Utc>,
    pub last_reminder_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<RegistrationEntity> for Registration {
    fn from(entity: RegistrationEntity) -> Self {
        Self {
            id: entity.id,
            slot_id: entity.slot_id,
            presenter_username: entity.presenter_username,
            degree: entity.degree.into(),
            topic: entity.topic,
            supervisor_name: entity.supervisor_name,
            supervisor_email: entity.supervisor_email,
            approval_status: entity.approval_status.into(),
            approval_token: entity.approval_token,
            approval_token_expires_at: entity.approval_token_expires_at,
            last_reminder_sent_at: entity.last_reminder_sent_at,
            created_at: entity.created_at,
        }
    }
}
