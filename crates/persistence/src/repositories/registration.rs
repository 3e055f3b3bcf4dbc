//! Registration ledger repository.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::{ApprovalStatusDb, DegreeDb, RegistrationEntity};
use crate::metrics::QueryTimer;

const REGISTRATION_COLUMNS: &str = "id, slot_id, presenter_username, degree, topic, \
     supervisor_name, supervisor_email, approval_status, approval_token, \
     approval_token_expires_at, last_reminder_sent_at, created_at";

/// Repository for registration ledger operations.
#[derive(Clone)]
pub struct RegistrationRepository {
    pool: PgPool,
}

impl RegistrationRepository {
    /// Creates a new RegistrationRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a new pending registration. Must run inside the transaction
    /// that holds the slot row lock.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        conn: &mut PgConnection,
        slot_id: Uuid,
        presenter_username: &str,
        degree: DegreeDb,
        topic: &str,
        supervisor_name: &str,
        supervisor_email: &str,
        approval_token: &str,
        approval_token_expires_at: DateTime<Utc>,
    ) -> Result<RegistrationEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_registration");
        let sql = format!(
            r#"
            INSERT INTO slot_registrations
                (slot_id, presenter_username, degree, topic, supervisor_name,
                 supervisor_email, approval_token, approval_token_expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {REGISTRATION_COLUMNS}
            "#
        );
        let result = sqlx::query_as::<_, RegistrationEntity>(&sql)
            .bind(slot_id)
            .bind(presenter_username)
            .bind(degree)
            .bind(topic)
            .bind(supervisor_name)
            .bind(supervisor_email)
            .bind(approval_token)
            .bind(approval_token_expires_at)
            .fetch_one(conn)
            .await;
        timer.record();
        result
    }

    /// Insert a registration created by an accepted promotion offer. Runs
    /// under the slot lock; the status is set by the promotion policy.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_with_status(
        &self,
        conn: &mut PgConnection,
        slot_id: Uuid,
        presenter_username: &str,
        degree: DegreeDb,
        topic: &str,
        supervisor_name: &str,
        supervisor_email: &str,
        status: ApprovalStatusDb,
        approval_token: &str,
        approval_token_expires_at: DateTime<Utc>,
    ) -> Result<RegistrationEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_registration_with_status");
        let sql = format!(
            r#"
            INSERT INTO slot_registrations
                (slot_id, presenter_username, degree, topic, supervisor_name,
                 supervisor_email, approval_status, approval_token, approval_token_expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {REGISTRATION_COLUMNS}
            "#
        );
        let result = sqlx::query_as::<_, RegistrationEntity>(&sql)
            .bind(slot_id)
            .bind(presenter_username)
            .bind(degree)
            .bind(topic)
            .bind(supervisor_name)
            .bind(supervisor_email)
            .bind(status)
            .bind(approval_token)
            .bind(approval_token_expires_at)
            .fetch_one(conn)
            .await;
        timer.record();
        result
    }

    /// Find a registration by ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_registration_by_id");
        let sql = format!(
            r#"
            SELECT {REGISTRATION_COLUMNS}
            FROM slot_registrations
            WHERE id = $1
            "#
        );
        let result = sqlx::query_as::<_, RegistrationEntity>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Find a registration by its approval token. Tokens are retained on
    /// resolved rows, so this also matches terminal registrations.
    pub async fn find_by_token(
        &self,
        token: &str,
    ) -> Result<Option<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_registration_by_token");
        let sql = format!(
            r#"
            SELECT {REGISTRATION_COLUMNS}
            FROM slot_registrations
            WHERE approval_token = $1
            "#
        );
        let result = sqlx::query_as::<_, RegistrationEntity>(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Whether the presenter has an active registration for this slot.
    pub async fn exists_active(
        &self,
        conn: &mut PgConnection,
        slot_id: Uuid,
        presenter_username: &str,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("registration_exists_active");
        let result = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM slot_registrations
                WHERE slot_id = $1
                  AND presenter_username = $2
                  AND approval_status IN ('pending', 'approved')
            )
            "#,
        )
        .bind(slot_id)
        .bind(presenter_username)
        .fetch_one(conn)
        .await;
        timer.record();
        result
    }

    /// Whether the presenter has an active registration for any slot.
    pub async fn exists_active_anywhere(
        &self,
        conn: &mut PgConnection,
        presenter_username: &str,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("registration_exists_active_anywhere");
        let result = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM slot_registrations
                WHERE presenter_username = $1
                  AND approval_status IN ('pending', 'approved')
            )
            "#,
        )
        .bind(presenter_username)
        .fetch_one(conn)
        .await;
        timer.record();
        result
    }

    /// Degrees of all active registrations for a slot. The caller sums the
    /// weights; must run under the slot lock for any mutation path.
    pub async fn active_degrees(
        &self,
        conn: &mut PgConnection,
        slot_id: Uuid,
    ) -> Result<Vec<DegreeDb>, sqlx::Error> {
        let timer = QueryTimer::new("registration_active_degrees");
        let result = sqlx::query_scalar::<_, DegreeDb>(
            r#"
            SELECT degree FROM slot_registrations
            WHERE slot_id = $1
              AND approval_status IN ('pending', 'approved')
            "#,
        )
        .bind(slot_id)
        .fetch_all(conn)
        .await;
        timer.record();
        result
    }

    /// Transition a pending registration to a terminal decision. Returns
    /// `None` if the row was no longer pending (already resolved elsewhere).
    pub async fn resolve_pending(
        &self,
        id: Uuid,
        to: ApprovalStatusDb,
    ) -> Result<Option<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("resolve_pending_registration");
        let sql = format!(
            r#"
            UPDATE slot_registrations
            SET approval_status = $2
            WHERE id = $1 AND approval_status = 'pending'
            RETURNING {REGISTRATION_COLUMNS}
            "#
        );
        let result = sqlx::query_as::<_, RegistrationEntity>(&sql)
            .bind(id)
            .bind(to)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Delete the presenter's active registration for a slot (withdrawal).
    pub async fn delete_active(
        &self,
        slot_id: Uuid,
        presenter_username: &str,
    ) -> Result<Option<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("delete_active_registration");
        let sql = format!(
            r#"
            DELETE FROM slot_registrations
            WHERE slot_id = $1
              AND presenter_username = $2
              AND approval_status IN ('pending', 'approved')
            RETURNING {REGISTRATION_COLUMNS}
            "#
        );
        let result = sqlx::query_as::<_, RegistrationEntity>(&sql)
            .bind(slot_id)
            .bind(presenter_username)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Expire all pending registrations whose approval window has lapsed.
    /// Compare-and-set on the pending status, so safe to run concurrently
    /// with supervisor decisions.
    pub async fn expire_due(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("expire_due_registrations");
        let sql = format!(
            r#"
            UPDATE slot_registrations
            SET approval_status = 'expired'
            WHERE approval_status = 'pending'
              AND approval_token_expires_at <= $1
            RETURNING {REGISTRATION_COLUMNS}
            "#
        );
        let result = sqlx::query_as::<_, RegistrationEntity>(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Pending registrations whose supervisor has been quiet for longer than
    /// the reminder interval and whose token is still valid.
    pub async fn find_reminder_due(
        &self,
        quiet_since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_reminder_due_registrations");
        let sql = format!(
            r#"
            SELECT {REGISTRATION_COLUMNS}
            FROM slot_registrations
            WHERE approval_status = 'pending'
              AND approval_token_expires_at > $2
              AND COALESCE(last_reminder_sent_at, created_at) <= $1
            ORDER BY created_at ASC
            "#
        );
        let result = sqlx::query_as::<_, RegistrationEntity>(&sql)
            .bind(quiet_since)
            .bind(now)
            .fetch_all(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Record that a supervisor reminder was sent.
    pub async fn mark_reminder_sent(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("mark_reminder_sent");
        let result = sqlx::query(
            r#"
            UPDATE slot_registrations
            SET last_reminder_sent_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await;
        timer.record();
        result.map(|_| ())
    }
}
