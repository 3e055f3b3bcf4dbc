//! Waiting list models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::registration::Degree;

/// An entry on a slot's waiting list.
///
/// Positions are 1-based and contiguous per slot; removing an entry shifts
/// everyone behind it forward.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WaitingListEntry {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub presenter_username: String,
    pub degree: Degree,
    pub topic: String,
    pub supervisor_name: String,
    pub supervisor_email: String,
    pub position: i32,
    /// Set while a promotion offer is live for this entry.
    pub promotion_token: Option<String>,
    pub promotion_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl WaitingListEntry {
    pub fn has_live_offer(&self, now: DateTime<Utc>) -> bool {
        match (self.promotion_token.as_ref(), self.promotion_token_expires_at) {
            (Some(_), Some(expires_at)) => expires_at > now,
            _ => false,
        }
    }
}

/// State of a promotion offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionStatus {
    Pending,
    Accepted,
    Expired,
    Declined,
}

impl PromotionStatus {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, PromotionStatus::Pending)
    }
}

/// Audit record of one promotion offer cycle.
///
/// The token is retained after resolution so repeated clicks on the accept
/// link resolve to a stable outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WaitingListPromotion {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub presenter_username: String,
    pub promotion_token: String,
    pub status: PromotionStatus,
    pub offered_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(token: Option<&str>, expires_in: Option<Duration>) -> WaitingListEntry {
        let now = Utc::now();
        WaitingListEntry {
            id: Uuid::new_v4(),
            slot_id: Uuid::new_v4(),
            presenter_username: "jdoe".to_string(),
            degree: Degree::Msc,
            topic: "Topic".to_string(),
            supervisor_name: "Prof. Example".to_string(),
            supervisor_email: "prof@university.edu".to_string(),
            position: 1,
            promotion_token: token.map(String::from),
            promotion_token_expires_at: expires_in.map(|d| now + d),
            created_at: now,
        }
    }

    #[test]
    fn test_live_offer_requires_token_and_future_expiry() {
        let now = Utc::now();
        assert!(entry(Some("tok"), Some(Duration::hours(1))).has_live_offer(now));
        assert!(!entry(Some("tok"), Some(Duration::hours(-1))).has_live_offer(now));
        assert!(!entry(None, None).has_live_offer(now));
    }

    #[test]
    fn test_promotion_resolution() {
        assert!(!PromotionStatus::Pending.is_resolved());
        assert!(PromotionStatus::Accepted.is_resolved());
        assert!(PromotionStatus::Expired.is_resolved());
        assert!(PromotionStatus::Declined.is_resolved());
    }
}
