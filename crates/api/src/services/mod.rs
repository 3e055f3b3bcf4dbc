//! Service layer: registration workflow, waiting list, capacity accounting,
//! email queue and mail transport.

pub mod capacity;
pub mod email_queue;
pub mod mailer;
pub mod registration;
pub mod templates;
pub mod waiting_list;

pub use capacity::CapacityService;
pub use email_queue::EmailQueueService;
pub use mailer::MailService;
pub use registration::RegistrationService;
pub use waiting_list::WaitingListService;

use sqlx::PgPool;
use std::sync::Arc;

use crate::config::Config;

/// Wires up the full service graph from a pool and configuration.
#[derive(Clone)]
pub struct ServiceRegistry {
    pub email_queue: EmailQueueService,
    pub capacity: CapacityService,
    pub waiting_list: WaitingListService,
    pub registrations: RegistrationService,
}

impl ServiceRegistry {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let config = Arc::new(config);

        let mailer = MailService::new(config.mail.clone());
        let email_queue = EmailQueueService::new(pool.clone(), mailer, &config.email_queue);
        let capacity = CapacityService::new(pool.clone(), config.registration.capacity_policy());
        let waiting_list = WaitingListService::new(pool.clone(), email_queue.clone(), config.clone());
        let registrations = RegistrationService::new(
            pool,
            email_queue.clone(),
            waiting_list.clone(),
            config,
        );

        Self {
            email_queue,
            capacity,
            waiting_list,
            registrations,
        }
    }
}

/// Presenter addresses are derived from the university username.
pub(crate) fn presenter_address(username: &str, domain: &str) -> String {
    format!("{username}@{domain}")
}

/// Whether a database error is a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}
