//! Seminar slot entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the seminar_slots table.
#[derive(Debug, Clone, FromRow)]
pub struct SeminarSlotEntity {
    pub id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub room: String,
    pub capacity: i32,
    pub created_at: DateTime<Utc>,
}

impl From<SeminarSlotEntity> for domain::models::SeminarSlot {
    fn from(entity: SeminarSlotEntity) -> Self {
        Self {
            id: entity.id,
            starts_at: entity.starts_at,
            ends_at: entity.ends_at,
            room: entity.room,
            capacity: entity.capacity,
            created_at: entity.created_at,
        }
    }
}
