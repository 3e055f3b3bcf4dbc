//! Supervisor reminder job.

use tracing::info;

use crate::services::RegistrationService;

use super::scheduler::{Job, JobFrequency};

/// Background job that re-sends approval requests for registrations the
/// supervisor has been quiet on.
pub struct SupervisorReminderJob {
    service: RegistrationService,
}

impl SupervisorReminderJob {
    pub fn new(service: RegistrationService) -> Self {
        Self { service }
    }
}

#[async_trait::async_trait]
impl Job for SupervisorReminderJob {
    fn name(&self) -> &'static str {
        "supervisor_reminder"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Hourly
    }

    async fn execute(&self) -> Result<(), String> {
        let sent = self
            .service
            .send_reminders()
            .await
            .map_err(|e| format!("Failed to send supervisor reminders: {}", e))?;

        if sent > 0 {
            info!(sent = sent, "Sent supervisor reminders");
        }

        Ok(())
    }
}
