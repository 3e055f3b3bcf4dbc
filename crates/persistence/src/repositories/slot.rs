//! Seminar slot repository.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::SeminarSlotEntity;
use crate::metrics::QueryTimer;

/// Repository for seminar slot operations.
#[derive(Clone)]
pub struct SlotRepository {
    pool: PgPool,
}

impl SlotRepository {
    /// Creates a new SlotRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create a new seminar slot.
    pub async fn create(
        &self,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        room: &str,
        capacity: i32,
    ) -> Result<SeminarSlotEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_slot");
        let result = sqlx::query_as::<_, SeminarSlotEntity>(
            r#"
            INSERT INTO seminar_slots (starts_at, ends_at, room, capacity)
            VALUES ($1, $2, $3, $4)
            RETURNING id, starts_at, ends_at, room, capacity, created_at
            "#,
        )
        .bind(starts_at)
        .bind(ends_at)
        .bind(room)
        .bind(capacity)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find a slot by ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<SeminarSlotEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_slot_by_id");
        let result = sqlx::query_as::<_, SeminarSlotEntity>(
            r#"
            SELECT id, starts_at, ends_at, room, capacity, created_at
            FROM seminar_slots
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Lock the slot row for the duration of the caller's transaction.
    ///
    /// Every check-then-act sequence against a slot (capacity check, waiting
    /// list append, promotion) must hold this lock so concurrent requests
    /// serialize per slot.
    pub async fn lock_for_update(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<SeminarSlotEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_slot_for_update");
        let result = sqlx::query_as::<_, SeminarSlotEntity>(
            r#"
            SELECT id, starts_at, ends_at, room, capacity, created_at
            FROM seminar_slots
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await;
        timer.record();
        result
    }
}
