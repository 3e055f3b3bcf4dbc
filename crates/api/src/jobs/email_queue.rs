//! Email queue worker job.
//!
//! Drives one delivery cycle per tick: stuck-row recovery, batch claim,
//! send, retry bookkeeping.

use tracing::info;

use crate::services::EmailQueueService;

use super::scheduler::{Job, JobFrequency};

/// Background job that processes the outbound email queue.
pub struct EmailQueueJob {
    service: EmailQueueService,
}

impl EmailQueueJob {
    pub fn new(service: EmailQueueService) -> Self {
        Self { service }
    }
}

#[async_trait::async_trait]
impl Job for EmailQueueJob {
    fn name(&self) -> &'static str {
        "email_queue"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(1)
    }

    async fn execute(&self) -> Result<(), String> {
        let stats = self
            .service
            .process_queue()
            .await
            .map_err(|e| format!("Failed to process email queue: {}", e))?;

        if stats.claimed > 0 || stats.recovered > 0 {
            info!(
                claimed = stats.claimed,
                sent = stats.sent,
                retried = stats.retried,
                failed = stats.failed,
                recovered = stats.recovered,
                "Processed email queue"
            );
        }

        Ok(())
    }
}
