//! Waiting list entities (database row mappings).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::models::{PromotionStatus, WaitingListEntry, WaitingListPromotion};

use super::registration::DegreeDb;

/// Database representation of a promotion offer status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "promotion_status", rename_all = "lowercase")]
pub enum PromotionStatusDb {
    Pending,
    Accepted,
    Expired,
    Declined,
}

impl From<PromotionStatusDb> for PromotionStatus {
    fn from(db: PromotionStatusDb) -> Self {
        match db {
            PromotionStatusDb::Pending => PromotionStatus::Pending,
            PromotionStatusDb::Accepted => PromotionStatus::Accepted,
            PromotionStatusDb::Expired => PromotionStatus::Expired,
            PromotionStatusDb::Declined => PromotionStatus::Declined,
        }
    }
}

impl From<PromotionStatus> for PromotionStatusDb {
    fn from(status: PromotionStatus) -> Self {
        match status {
            PromotionStatus::Pending => PromotionStatusDb::Pending,
            PromotionStatus::Accepted => PromotionStatusDb::Accepted,
            PromotionStatus::Expired => PromotionStatusDb::Expired,
            PromotionStatus::Declined => PromotionStatusDb::Declined,
        }
    }
}

/// Database row mapping for the waiting_list_entries table.
#[derive(Debug, Clone, FromRow)]
pub struct WaitingListEntryEntity {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub presenter_username: String,
    pub degree: DegreeDb,
    pub topic: String,
    pub supervisor_name: String,
    pub supervisor_email: String,
    pub position: i32,
    pub promotion_token: Option<String>,
    pub promotion_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<WaitingListEntryEntity> for WaitingListEntry {
    fn from(entity: WaitingListEntryEntity) -> Self {
        Self {
            id: entity.id,
            slot_id: entity.slot_id,
            presenter_username: entity.presenter_username,
            degree: entity.degree.into(),
            topic: entity.topic,
            supervisor_name: entity.supervisor_name,
            supervisor_email: entity.supervisor_email,
            position: entity.position,
            promotion_token: entity.promotion_token,
            promotion_token_expires_at: entity.promotion_token_expires_at,
            created_at: entity.created_at,
        }
    }
}

/// Database row mapping for the waiting_list_promotions table.
#[derive(Debug, Clone, FromRow)]
pub struct WaitingListPromotionEntity {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub presenter_username: String,
    pub promotion_token: String,
    pub status: PromotionStatusDb,
    pub offered_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl From<WaitingListPromotionEntity> for WaitingListPromotion {
    fn from(entity: WaitingListPromotionEntity) -> Self {
        Self {
            id: entity.id,
            slot_id: entity.slot_id,
            presenter_username: entity.presenter_username,
            promotion_token: entity.promotion_token,
            status: entity.status.into(),
            offered_at: entity.offered_at,
            expires_at: entity.expires_at,
            resolved_at: entity.resolved_at,
        }
    }
}
