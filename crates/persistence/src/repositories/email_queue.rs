//! Email queue repository.
//!
//! Implements the durable queue semantics: atomic batch claiming with
//! `FOR UPDATE SKIP LOCKED`, compare-and-set transitions out of the
//! processing state, and stuck-row recovery.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use domain::models::NewEmail;

use crate::entities::{EmailQueueEntity, EmailStatusDb, EmailTypeDb};
use crate::metrics::QueryTimer;

const EMAIL_COLUMNS: &str = "id, email_type, to_email, cc_email, bcc_email, subject, html_body, \
     status, retry_count, max_retries, last_error, last_error_code, registration_id, slot_id, \
     presenter_username, created_at, scheduled_at, last_attempt_at, sent_at";

/// Repository for email queue operations.
#[derive(Clone)]
pub struct EmailQueueRepository {
    pool: PgPool,
}

impl EmailQueueRepository {
    /// Creates a new EmailQueueRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a new pending email. `scheduled_at` defaults to now.
    pub async fn enqueue(
        &self,
        email: &NewEmail,
        max_retries: i32,
    ) -> Result<EmailQueueEntity, sqlx::Error> {
        let timer = QueryTimer::new("enqueue_email");
        let sql = format!(
            r#"
            INSERT INTO email_queue
                (email_type, to_email, cc_email, bcc_email, subject, html_body,
                 max_retries, registration_id, slot_id, presenter_username, scheduled_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, COALESCE($11, NOW()))
            RETURNING {EMAIL_COLUMNS}
            "#
        );
        let result = sqlx::query_as::<_, EmailQueueEntity>(&sql)
            .bind(EmailTypeDb::from(email.email_type))
            .bind(&email.to_email)
            .bind(&email.cc_email)
            .bind(&email.bcc_email)
            .bind(&email.subject)
            .bind(&email.html_body)
            .bind(max_retries)
            .bind(email.registration_id)
            .bind(email.slot_id)
            .bind(&email.presenter_username)
            .bind(email.scheduled_at)
            .fetch_one(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Find a queued email by ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<EmailQueueEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_email_by_id");
        let sql = format!(
            r#"
            SELECT {EMAIL_COLUMNS}
            FROM email_queue
            WHERE id = $1
            "#
        );
        let result = sqlx::query_as::<_, EmailQueueEntity>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Reset processing rows whose worker died back to pending. A row is
    /// considered stuck once its last attempt is older than the cutoff.
    pub async fn reset_stuck(&self, stuck_before: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("reset_stuck_emails");
        let result = sqlx::query(
            r#"
            UPDATE email_queue
            SET status = 'pending'
            WHERE status = 'processing'
              AND last_attempt_at < $1
            "#,
        )
        .bind(stuck_before)
        .execute(&self.pool)
        .await;
        timer.record();
        result.map(|r| r.rows_affected())
    }

    /// Atomically claim a batch of due pending emails, oldest scheduled
    /// first. `FOR UPDATE SKIP LOCKED` keeps concurrent workers from
    /// claiming the same rows.
    pub async fn claim_batch(
        &self,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<EmailQueueEntity>, sqlx::Error> {
        let timer = QueryTimer::new("claim_email_batch");
        let sql = format!(
            r#"
            UPDATE email_queue
            SET status = 'processing', last_attempt_at = $2
            WHERE id IN (
                SELECT id FROM email_queue
                WHERE status = 'pending' AND scheduled_at <= $2
                ORDER BY scheduled_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {EMAIL_COLUMNS}
            "#
        );
        let result = sqlx::query_as::<_, EmailQueueEntity>(&sql)
            .bind(limit)
            .bind(now)
            .fetch_all(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Mark a claimed email as sent.
    pub async fn mark_sent(
        &self,
        id: Uuid,
        sent_at: DateTime<Utc>,
    ) -> Result<Option<EmailQueueEntity>, sqlx::Error> {
        let timer = QueryTimer::new("mark_email_sent");
        let sql = format!(
            r#"
            UPDATE email_queue
            SET status = 'sent', sent_at = $2, last_error = NULL, last_error_code = NULL
            WHERE id = $1 AND status = 'processing'
            RETURNING {EMAIL_COLUMNS}
            "#
        );
        let result = sqlx::query_as::<_, EmailQueueEntity>(&sql)
            .bind(id)
            .bind(sent_at)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Re-queue a claimed email for a later retry after a failure.
    pub async fn schedule_retry(
        &self,
        id: Uuid,
        retry_count: i32,
        last_error: &str,
        last_error_code: Option<&str>,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<Option<EmailQueueEntity>, sqlx::Error> {
        let timer = QueryTimer::new("schedule_email_retry");
        let sql = format!(
            r#"
            UPDATE email_queue
            SET status = 'pending', retry_count = $2, last_error = $3,
                last_error_code = $4, scheduled_at = $5
            WHERE id = $1 AND status = 'processing'
            RETURNING {EMAIL_COLUMNS}
            "#
        );
        let result = sqlx::query_as::<_, EmailQueueEntity>(&sql)
            .bind(id)
            .bind(retry_count)
            .bind(last_error)
            .bind(last_error_code)
            .bind(next_attempt_at)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Mark a claimed email as permanently failed.
    pub async fn mark_failed(
        &self,
        id: Uuid,
        retry_count: i32,
        last_error: &str,
        last_error_code: Option<&str>,
    ) -> Result<Option<EmailQueueEntity>, sqlx::Error> {
        let timer = QueryTimer::new("mark_email_failed");
        let sql = format!(
            r#"
            UPDATE email_queue
            SET status = 'failed', retry_count = $2, last_error = $3, last_error_code = $4
            WHERE id = $1 AND status = 'processing'
            RETURNING {EMAIL_COLUMNS}
            "#
        );
        let result = sqlx::query_as::<_, EmailQueueEntity>(&sql)
            .bind(id)
            .bind(retry_count)
            .bind(last_error)
            .bind(last_error_code)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Cancel all still-pending emails tied to a registration.
    pub async fn cancel_pending_for_registration(
        &self,
        registration_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("cancel_pending_emails_for_registration");
        let result = sqlx::query(
            r#"
            UPDATE email_queue
            SET status = 'cancelled'
            WHERE registration_id = $1 AND status = 'pending'
            "#,
        )
        .bind(registration_id)
        .execute(&self.pool)
        .await;
        timer.record();
        result.map(|r| r.rows_affected())
    }

    /// Count queue rows in the given status, for queue-depth gauges.
    pub async fn count_by_status(&self, status: EmailStatusDb) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_emails_by_status");
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM email_queue WHERE status = $1
            "#,
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }
}
