//! Email delivery queue service.
//!
//! Enqueues workflow emails and drives the periodic worker cycle: stuck-row
//! recovery, atomic batch claiming, delivery, and retry/backoff bookkeeping.

use chrono::{Duration, Utc};
use metrics::{counter, gauge};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use domain::models::{NewEmail, QueuedEmail, RetryDisposition, RetryPolicy};
use domain::ServiceError;
use persistence::entities::{EmailQueueEntity, EmailStatusDb};
use persistence::repositories::EmailQueueRepository;
use shared::validation::{mask_email, validate_email};

use crate::config::EmailQueueConfig;
use crate::services::mailer::{MailService, OutboundMessage};

/// Outcome counts of one worker cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    pub recovered: u64,
    pub claimed: usize,
    pub sent: usize,
    pub retried: usize,
    pub failed: usize,
}

/// Durable outbound email queue.
#[derive(Clone)]
pub struct EmailQueueService {
    repo: EmailQueueRepository,
    mailer: MailService,
    policy: RetryPolicy,
    batch_size: i64,
    stuck_cutoff_minutes: i64,
}

impl EmailQueueService {
    pub fn new(pool: PgPool, mailer: MailService, config: &EmailQueueConfig) -> Self {
        Self {
            repo: EmailQueueRepository::new(pool),
            mailer,
            policy: config.retry_policy(),
            batch_size: config.batch_size,
            stuck_cutoff_minutes: config.stuck_cutoff_minutes,
        }
    }

    /// Validate recipients and insert a pending email.
    pub async fn enqueue(&self, email: NewEmail) -> Result<QueuedEmail, ServiceError> {
        validate_email(&email.to_email)?;
        if let Some(cc) = &email.cc_email {
            validate_email(cc)?;
        }
        if let Some(bcc) = &email.bcc_email {
            validate_email(bcc)?;
        }

        let entity = self.repo.enqueue(&email, self.policy.max_retries).await?;
        info!(
            email_id = %entity.id,
            email_type = ?email.email_type,
            to = %mask_email(&email.to_email),
            "Email enqueued"
        );
        counter!("email_queue_enqueued_total").increment(1);
        Ok(entity.into())
    }

    /// One worker cycle: recover stuck rows, claim a due batch, deliver.
    pub async fn process_queue(&self) -> Result<CycleStats, ServiceError> {
        let now = Utc::now();
        let mut stats = CycleStats::default();

        let stuck_before = now - Duration::minutes(self.stuck_cutoff_minutes);
        stats.recovered = self.repo.reset_stuck(stuck_before).await?;
        if stats.recovered > 0 {
            warn!(
                recovered = stats.recovered,
                "Recovered stuck emails back to pending"
            );
            counter!("email_queue_recovered_total").increment(stats.recovered);
        }

        let batch = self.repo.claim_batch(self.batch_size, now).await?;
        stats.claimed = batch.len();

        for email in batch {
            self.deliver(email, &mut stats).await?;
        }

        if stats.claimed > 0 {
            info!(
                claimed = stats.claimed,
                sent = stats.sent,
                retried = stats.retried,
                failed = stats.failed,
                "Email queue cycle completed"
            );
        }

        let pending = self.repo.count_by_status(EmailStatusDb::Pending).await?;
        gauge!("email_queue_pending").set(pending as f64);

        Ok(stats)
    }

    /// Cancel still-pending emails tied to a withdrawn registration.
    pub async fn cancel_for_registration(&self, registration_id: Uuid) -> Result<u64, ServiceError> {
        let cancelled = self
            .repo
            .cancel_pending_for_registration(registration_id)
            .await?;
        if cancelled > 0 {
            info!(
                registration_id = %registration_id,
                cancelled = cancelled,
                "Cancelled queued emails for registration"
            );
        }
        Ok(cancelled)
    }

    async fn deliver(
        &self,
        email: EmailQueueEntity,
        stats: &mut CycleStats,
    ) -> Result<(), ServiceError> {
        let message = OutboundMessage {
            to: email.to_email.clone(),
            cc: email.cc_email.clone(),
            bcc: email.bcc_email.clone(),
            subject: email.subject.clone(),
            html_body: email.html_body.clone(),
        };

        match self.mailer.send(&message).await {
            Ok(()) => {
                self.repo.mark_sent(email.id, Utc::now()).await?;
                counter!("email_queue_sent_total").increment(1);
                stats.sent += 1;
            }
            Err(err) => {
                // Retry count tracks completed failed attempts, so a later
                // success reports how many retries it took.
                let retry_count = email.retry_count + 1;
                let reason = err.to_string();
                let code = err.code();

                match self.policy.after_failure(retry_count, email.max_retries) {
                    RetryDisposition::Retry { delay_seconds } => {
                        let next_attempt_at = Utc::now() + Duration::seconds(delay_seconds);
                        self.repo
                            .schedule_retry(
                                email.id,
                                retry_count,
                                &reason,
                                code.as_deref(),
                                next_attempt_at,
                            )
                            .await?;
                        warn!(
                            email_id = %email.id,
                            to = %mask_email(&email.to_email),
                            retry_count = retry_count,
                            next_attempt_at = %next_attempt_at,
                            error = %reason,
                            "Email delivery failed, retry scheduled"
                        );
                        counter!("email_queue_retried_total").increment(1);
                        stats.retried += 1;
                    }
                    RetryDisposition::Exhausted => {
                        self.repo
                            .mark_failed(email.id, retry_count, &reason, code.as_deref())
                            .await?;
                        warn!(
                            email_id = %email.id,
                            to = %mask_email(&email.to_email),
                            retries = retry_count,
                            error = %reason,
                            "Email delivery permanently failed"
                        );
                        counter!("email_queue_failed_total").increment(1);
                        stats.failed += 1;
                    }
                }
            }
        }

        Ok(())
    }
}
