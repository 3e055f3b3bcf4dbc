//! Promotion offer expiry sweep.

use tracing::info;

use crate::services::WaitingListService;

use super::scheduler::{Job, JobFrequency};

/// Background job that expires lapsed promotion offers, removes the
/// forfeiting entries and re-offers the freed seats.
pub struct PromotionExpiryJob {
    service: WaitingListService,
}

impl PromotionExpiryJob {
    pub fn new(service: WaitingListService) -> Self {
        Self { service }
    }
}

#[async_trait::async_trait]
impl Job for PromotionExpiryJob {
    fn name(&self) -> &'static str {
        "promotion_expiry"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(5)
    }

    async fn execute(&self) -> Result<(), String> {
        let expired = self
            .service
            .expire_due_offers()
            .await
            .map_err(|e| format!("Failed to expire promotion offers: {}", e))?;

        if expired > 0 {
            info!(expired = expired, "Expired lapsed promotion offers");
        }

        Ok(())
    }
}
