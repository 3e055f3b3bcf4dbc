//! Background job scheduler and job implementations.

mod email_queue;
mod pool_metrics;
mod promotion_expiry;
mod registration_expiry;
mod scheduler;
mod supervisor_reminder;

pub use email_queue::EmailQueueJob;
pub use pool_metrics::PoolMetricsJob;
pub use promotion_expiry::PromotionExpiryJob;
pub use registration_expiry::RegistrationExpiryJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
pub use supervisor_reminder::SupervisorReminderJob;
