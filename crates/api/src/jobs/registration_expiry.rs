//! Approval window expiry sweep.

use tracing::info;

use crate::services::RegistrationService;

use super::scheduler::{Job, JobFrequency};

/// Background job that expires pending registrations whose approval window
/// has lapsed and passes freed seats to the waiting list.
pub struct RegistrationExpiryJob {
    service: RegistrationService,
}

impl RegistrationExpiryJob {
    pub fn new(service: RegistrationService) -> Self {
        Self { service }
    }
}

#[async_trait::async_trait]
impl Job for RegistrationExpiryJob {
    fn name(&self) -> &'static str {
        "registration_expiry"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(5)
    }

    async fn execute(&self) -> Result<(), String> {
        let expired = self
            .service
            .expire_due()
            .await
            .map_err(|e| format!("Failed to expire registrations: {}", e))?;

        if expired > 0 {
            info!(expired = expired, "Expired lapsed registrations");
        }

        Ok(())
    }
}
