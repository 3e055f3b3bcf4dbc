//! Waiting list repository.
//!
//! Covers both the ordered entries and the promotion offer audit records.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::{
    DegreeDb, PromotionStatusDb, WaitingListEntryEntity, WaitingListPromotionEntity,
};
use crate::metrics::QueryTimer;

const ENTRY_COLUMNS: &str = "id, slot_id, presenter_username, degree, topic, supervisor_name, \
     supervisor_email, position, promotion_token, promotion_token_expires_at, created_at";

const PROMOTION_COLUMNS: &str = "id, slot_id, presenter_username, promotion_token, status, \
     offered_at, expires_at, resolved_at";

/// Repository for waiting list operations.
#[derive(Clone)]
pub struct WaitingListRepository {
    pool: PgPool,
}

impl WaitingListRepository {
    /// Creates a new WaitingListRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Append an entry at the tail of a slot's waiting list. Must run under
    /// the slot lock so the computed position is race-free.
    #[allow(clippy::too_many_arguments)]
    pub async fn append(
        &self,
        conn: &mut PgConnection,
        slot_id: Uuid,
        presenter_username: &str,
        degree: DegreeDb,
        topic: &str,
        supervisor_name: &str,
        supervisor_email: &str,
    ) -> Result<WaitingListEntryEntity, sqlx::Error> {
        let timer = QueryTimer::new("append_waiting_list_entry");
        let sql = format!(
            r#"
            INSERT INTO waiting_list_entries
                (slot_id, presenter_username, degree, topic, supervisor_name,
                 supervisor_email, position)
            VALUES ($1, $2, $3, $4, $5, $6,
                    (SELECT COALESCE(MAX(position), 0) + 1
                     FROM waiting_list_entries WHERE slot_id = $1))
            RETURNING {ENTRY_COLUMNS}
            "#
        );
        let result = sqlx::query_as::<_, WaitingListEntryEntity>(&sql)
            .bind(slot_id)
            .bind(presenter_username)
            .bind(degree)
            .bind(topic)
            .bind(supervisor_name)
            .bind(supervisor_email)
            .fetch_one(conn)
            .await;
        timer.record();
        result
    }

    /// Find the presenter's entry for a slot.
    pub async fn find_entry(
        &self,
        slot_id: Uuid,
        presenter_username: &str,
    ) -> Result<Option<WaitingListEntryEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_waiting_list_entry");
        let sql = format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM waiting_list_entries
            WHERE slot_id = $1 AND presenter_username = $2
            "#
        );
        let result = sqlx::query_as::<_, WaitingListEntryEntity>(&sql)
            .bind(slot_id)
            .bind(presenter_username)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Find the presenter's entry for a slot inside the caller's
    /// slot-locked transaction.
    pub async fn find_entry_locked(
        &self,
        conn: &mut PgConnection,
        slot_id: Uuid,
        presenter_username: &str,
    ) -> Result<Option<WaitingListEntryEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_waiting_list_entry_locked");
        let sql = format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM waiting_list_entries
            WHERE slot_id = $1 AND presenter_username = $2
            "#
        );
        let result = sqlx::query_as::<_, WaitingListEntryEntity>(&sql)
            .bind(slot_id)
            .bind(presenter_username)
            .fetch_optional(conn)
            .await;
        timer.record();
        result
    }

    /// Clear a lapsed or withdrawn offer from an entry.
    pub async fn clear_offer(
        &self,
        conn: &mut PgConnection,
        entry_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("clear_waiting_list_offer");
        let result = sqlx::query(
            r#"
            UPDATE waiting_list_entries
            SET promotion_token = NULL, promotion_token_expires_at = NULL
            WHERE id = $1
            "#,
        )
        .bind(entry_id)
        .execute(conn)
        .await;
        timer.record();
        result.map(|_| ())
    }

    /// Whether the presenter is waiting on any slot.
    pub async fn exists_waiting_anywhere(
        &self,
        conn: &mut PgConnection,
        presenter_username: &str,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("waiting_list_exists_anywhere");
        let result = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM waiting_list_entries
                WHERE presenter_username = $1
            )
            "#,
        )
        .bind(presenter_username)
        .fetch_one(conn)
        .await;
        timer.record();
        result
    }

    /// All entries for a slot in position order.
    pub async fn entries_for_slot(
        &self,
        slot_id: Uuid,
    ) -> Result<Vec<WaitingListEntryEntity>, sqlx::Error> {
        let timer = QueryTimer::new("waiting_list_entries_for_slot");
        let sql = format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM waiting_list_entries
            WHERE slot_id = $1
            ORDER BY position ASC
            "#
        );
        let result = sqlx::query_as::<_, WaitingListEntryEntity>(&sql)
            .bind(slot_id)
            .fetch_all(&self.pool)
            .await;
        timer.record();
        result
    }

    /// First entry in position order without an outstanding offer. Entries
    /// whose offer has lapsed are excluded; the expiry sweep removes them.
    pub async fn next_candidate(
        &self,
        conn: &mut PgConnection,
        slot_id: Uuid,
    ) -> Result<Option<WaitingListEntryEntity>, sqlx::Error> {
        let timer = QueryTimer::new("next_waiting_list_candidate");
        let sql = format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM waiting_list_entries
            WHERE slot_id = $1 AND promotion_token IS NULL
            ORDER BY position ASC
            LIMIT 1
            "#
        );
        let result = sqlx::query_as::<_, WaitingListEntryEntity>(&sql)
            .bind(slot_id)
            .fetch_optional(conn)
            .await;
        timer.record();
        result
    }

    /// Attach a promotion offer token to an entry.
    pub async fn set_offer(
        &self,
        conn: &mut PgConnection,
        entry_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("set_waiting_list_offer");
        let result = sqlx::query(
            r#"
            UPDATE waiting_list_entries
            SET promotion_token = $2, promotion_token_expires_at = $3
            WHERE id = $1
            "#,
        )
        .bind(entry_id)
        .bind(token)
        .bind(expires_at)
        .execute(conn)
        .await;
        timer.record();
        result.map(|_| ())
    }

    /// Remove an entry and close the position gap behind it. Must run under
    /// the slot lock; positions stay dense and contiguous.
    pub async fn remove_and_compact(
        &self,
        conn: &mut PgConnection,
        entry_id: Uuid,
    ) -> Result<Option<WaitingListEntryEntity>, sqlx::Error> {
        let timer = QueryTimer::new("remove_waiting_list_entry");
        let sql = format!(
            r#"
            DELETE FROM waiting_list_entries
            WHERE id = $1
            RETURNING {ENTRY_COLUMNS}
            "#
        );
        let removed = sqlx::query_as::<_, WaitingListEntryEntity>(&sql)
            .bind(entry_id)
            .fetch_optional(&mut *conn)
            .await?;

        if let Some(ref entry) = removed {
            sqlx::query(
                r#"
                UPDATE waiting_list_entries
                SET position = position - 1
                WHERE slot_id = $1 AND position > $2
                "#,
            )
            .bind(entry.slot_id)
            .bind(entry.position)
            .execute(conn)
            .await?;
        }
        timer.record();
        Ok(removed)
    }

    /// Record a new promotion offer.
    pub async fn create_promotion(
        &self,
        conn: &mut PgConnection,
        slot_id: Uuid,
        presenter_username: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<WaitingListPromotionEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_promotion");
        let sql = format!(
            r#"
            INSERT INTO waiting_list_promotions
                (slot_id, presenter_username, promotion_token, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING {PROMOTION_COLUMNS}
            "#
        );
        let result = sqlx::query_as::<_, WaitingListPromotionEntity>(&sql)
            .bind(slot_id)
            .bind(presenter_username)
            .bind(token)
            .bind(expires_at)
            .fetch_one(conn)
            .await;
        timer.record();
        result
    }

    /// Find a promotion by its token. Tokens are retained after resolution.
    pub async fn find_promotion_by_token(
        &self,
        token: &str,
    ) -> Result<Option<WaitingListPromotionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_promotion_by_token");
        let sql = format!(
            r#"
            SELECT {PROMOTION_COLUMNS}
            FROM waiting_list_promotions
            WHERE promotion_token = $1
            "#
        );
        let result = sqlx::query_as::<_, WaitingListPromotionEntity>(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Transition a pending promotion to a terminal status. Returns `None`
    /// if it was already resolved.
    pub async fn resolve_promotion(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        to: PromotionStatusDb,
        resolved_at: DateTime<Utc>,
    ) -> Result<Option<WaitingListPromotionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("resolve_promotion");
        let sql = format!(
            r#"
            UPDATE waiting_list_promotions
            SET status = $2, resolved_at = $3
            WHERE id = $1 AND status = 'pending'
            RETURNING {PROMOTION_COLUMNS}
            "#
        );
        let result = sqlx::query_as::<_, WaitingListPromotionEntity>(&sql)
            .bind(id)
            .bind(to)
            .bind(resolved_at)
            .fetch_optional(conn)
            .await;
        timer.record();
        result
    }

    /// Expire all pending promotions past their window. Compare-and-set on
    /// the pending status.
    pub async fn expire_due_promotions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<WaitingListPromotionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("expire_due_promotions");
        let sql = format!(
            r#"
            UPDATE waiting_list_promotions
            SET status = 'expired', resolved_at = $1
            WHERE status = 'pending' AND expires_at <= $1
            RETURNING {PROMOTION_COLUMNS}
            "#
        );
        let result = sqlx::query_as::<_, WaitingListPromotionEntity>(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Expire the presenter's live promotion for a slot, if any (withdrawal).
    pub async fn expire_live_promotion(
        &self,
        conn: &mut PgConnection,
        slot_id: Uuid,
        presenter_username: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<WaitingListPromotionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("expire_live_promotion");
        let sql = format!(
            r#"
            UPDATE waiting_list_promotions
            SET status = 'expired', resolved_at = $3
            WHERE slot_id = $1 AND presenter_username = $2 AND status = 'pending'
            RETURNING {PROMOTION_COLUMNS}
            "#
        );
        let result = sqlx::query_as::<_, WaitingListPromotionEntity>(&sql)
            .bind(slot_id)
            .bind(presenter_username)
            .bind(now)
            .fetch_optional(conn)
            .await;
        timer.record();
        result
    }
}
