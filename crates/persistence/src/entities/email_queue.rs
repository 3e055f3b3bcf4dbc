//! Email queue entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::models::{EmailStatus, EmailType, QueuedEmail};

/// Database representation of an email workflow type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "email_type", rename_all = "snake_case")]
pub enum EmailTypeDb {
    StudentConfirmation,
    SupervisorApproval,
    SupervisorReminder,
    ExpirationWarning,
    ApprovalNotification,
    ExportEmail,
    SupervisorNotification,
    BugReport,
}

impl From<EmailTypeDb> for EmailType {
    fn from(db: EmailTypeDb) -> Self {
        match db {
            EmailTypeDb::StudentConfirmation => EmailType::StudentConfirmation,
            EmailTypeDb::SupervisorApproval => EmailType::SupervisorApproval,
            EmailTypeDb::SupervisorReminder => EmailType::SupervisorReminder,
            EmailTypeDb::ExpirationWarning => EmailType::ExpirationWarning,
            EmailTypeDb::ApprovalNotification => EmailType::ApprovalNotification,
            EmailTypeDb::ExportEmail => EmailType::ExportEmail,
            EmailTypeDb::SupervisorNotification => EmailType::SupervisorNotification,
            EmailTypeDb::BugReport => EmailType::BugReport,
        }
    }
}

impl From<EmailType> for EmailTypeDb {
    fn from(email_type: EmailType) -> Self {
        match email_type {
            EmailType::StudentConfirmation => EmailTypeDb::StudentConfirmation,
            EmailType::SupervisorApproval => EmailTypeDb::SupervisorApproval,
            EmailType::SupervisorReminder => EmailTypeDb::SupervisorReminder,
            EmailType::ExpirationWarning => EmailTypeDb::ExpirationWarning,
            EmailType::ApprovalNotification => EmailTypeDb::ApprovalNotification,
            EmailType::ExportEmail => EmailTypeDb::ExportEmail,
            EmailType::SupervisorNotification => EmailTypeDb::SupervisorNotification,
            EmailType::BugReport => EmailTypeDb::BugReport,
        }
    }
}

/// Database representation of a delivery status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "email_status", rename_all = "lowercase")]
pub enum EmailStatusDb {
    Pending,
    Processing,
    Sent,
    Failed,
    Cancelled,
}

impl From<EmailStatusDb> for EmailStatus {
    fn from(db: EmailStatusDb) -> Self {
        match db {
            EmailStatusDb::Pending => EmailStatus::Pending,
            EmailStatusDb::Processing => EmailStatus::Processing,
            EmailStatusDb::Sent => EmailStatus::Sent,
            EmailStatusDb::Failed => EmailStatus::Failed,
            EmailStatusDb::Cancelled => EmailStatus::Cancelled,
        }
    }
}

impl From<EmailStatus> for EmailStatusDb {
    fn from(status: EmailStatus) -> Self {
        match status {
            EmailStatus::Pending => EmailStatusDb::Pending,
            EmailStatus::Processing => EmailStatusDb::Processing,
            EmailStatus::Sent => EmailStatusDb::Sent,
            EmailStatus::Failed => EmailStatusDb::Failed,
            EmailStatus::Cancelled => EmailStatusDb::Cancelled,
        }
    }
}

/// Database row mapping for the email_queue table.
#[derive(Debug, Clone, FromRow)]
pub struct EmailQueueEntity {
    pub id: Uuid,
    pub email_type: EmailTypeDb,
    pub to_email: String,
    pub cc_email: Option<String>,
    pub bcc_email: Option<String>,
    pub subject: String,
    pub html_body: String,
    pub status: EmailStatusDb,
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

impl From<EmailQueueEntity> for QueuedEmail {
    fn from(entity: EmailQueueEntity) -> Self {
        Self {
            id: entity.id,
            email_type: entity.email_type.into(),
            to_email: entity.to_email,
            cc_email: entity.cc_email,
            bcc_email: entity.bcc_email,
            subject: entity.subject,
            html_body: entity.html_body,
            status: entity.status.into(),
            retry_count: entity.retry_count,
            max_retries: entity.max_retries,
            last_error: entity.last_error,
            last_error_code: entity.last_error_code,
            registration_id: entity.registration_id,
            slot_id: entity.slot_id,
            presenter_username: entity.presenter_username,
            created_at: entity.created_at,
            scheduled_at: entity.scheduled_at,
            last_attempt_at: entity.last_attempt_at,
            sent_at: entity.sent_at,
        }
    }
}
