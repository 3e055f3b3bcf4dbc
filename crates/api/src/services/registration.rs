//! Registration ledger service.
//!
//! Owns the per-slot approval state machine: registering with a weighted
//! capacity check, supervisor token resolution, withdrawal, the approval
//! expiry sweep, and supervisor reminders.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use domain::models::{
    ApprovalDecision, ApprovalStatus, CapacityPolicy, Degree, EmailType, NewEmail, RegisterOutcome,
    RegisterRequest, Registration,
};
use domain::ServiceError;
use persistence::entities::{ApprovalStatusDb, RegistrationEntity};
use persistence::repositories::{RegistrationRepository, SlotRepository};
use shared::token::generate_token;

use crate::config::Config;
use crate::services::{
    email_queue::EmailQueueService, presenter_address, templates, waiting_list::WaitingListService,
};

/// Service for registration ledger operations.
#[derive(Clone)]
pub struct RegistrationService {
    pool: PgPool,
    slots: SlotRepository,
    registrations: RegistrationRepository,
    emails: EmailQueueService,
    waiting_list: WaitingListService,
    config: Arc<Config>,
}

impl RegistrationService {
    pub fn new(
        pool: PgPool,
        emails: EmailQueueService,
        waiting_list: WaitingListService,
        config: Arc<Config>,
    ) -> Self {
        Self {
            slots: SlotRepository::new(pool.clone()),
            registrations: RegistrationRepository::new(pool.clone()),
            pool,
            emails,
            waiting_list,
            config,
        }
    }

    fn policy(&self) -> CapacityPolicy {
        self.config.registration.capacity_policy()
    }

    /// Register a presenter into a slot. On a free seat this creates a
    /// pending registration and mails the supervisor; on a full slot it
    /// either falls back to the waiting list or fails with `SlotFull`.
    pub async fn register(
        &self,
        slot_id: Uuid,
        request: RegisterRequest,
        allow_waitlist: bool,
    ) -> Result<RegisterOutcome, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;
        shared::validation::validate_email(&request.supervisor_email)?;

        let now = Utc::now();
        let approval_window = Duration::hours(self.config.registration.approval_window_hours);

        let mut tx = self.pool.begin().await?;
        let slot = self
            .slots
            .lock_for_update(&mut tx, slot_id)
            .await?
            .ok_or(ServiceError::SlotNotFound)?;

        if self
            .registrations
            .exists_active(&mut tx, slot_id, &request.presenter_username)
            .await?
        {
            return Err(ServiceError::DuplicateRegistration);
        }
        if !self.config.registration.allow_multiple_active
            && self
                .registrations
                .exists_active_anywhere(&mut tx, &request.presenter_username)
                .await?
        {
            return Err(ServiceError::DuplicateRegistration);
        }

        let degrees = self.registrations.active_degrees(&mut tx, slot_id).await?;
        let used = self.policy().usage(degrees.into_iter().map(Degree::from));

        if self.policy().fits(slot.capacity, used, request.degree) {
            let registration = self
                .registrations
                .create(
                    &mut tx,
                    slot_id,
                    &request.presenter_username,
                    request.degree.into(),
                    &request.topic,
                    &request.supervisor_name,
                    &request.supervisor_email,
                    &generate_token(),
                    now + approval_window,
                )
                .await?;
            tx.commit().await?;

            info!(
                slot_id = %slot_id,
                presenter = %registration.presenter_username,
                degree = ?request.degree,
                "Registration created, awaiting supervisor approval"
            );

            self.notify_registered(&registration).await;
            return Ok(RegisterOutcome::Registered {
                registration_id: registration.id,
            });
        }

        if !allow_waitlist {
            return Err(ServiceError::SlotFull);
        }

        let entry = self
            .waiting_list
            .append_locked(&mut tx, slot_id, &request)
            .await?;
        tx.commit().await?;

        self.waiting_list.notify_waitlisted(&entry).await;
        Ok(RegisterOutcome::Waitlisted {
            position: entry.position,
        })
    }

    /// Resolve an approval link click. Idempotent: a repeated click on a
    /// resolved token reports `AlreadyResolved` rather than a lookup miss.
    pub async fn resolve_by_token(
        &self,
        token: &str,
        decision: ApprovalDecision,
    ) -> Result<Registration, ServiceError> {
        let registration = self
            .registrations
            .find_by_token(token)
            .await?
            .ok_or(ServiceError::TokenNotFound)?;

        if ApprovalStatus::from(registration.approval_status) != ApprovalStatus::Pending {
            return Err(ServiceError::AlreadyResolved);
        }

        let now = Utc::now();
        if registration.approval_token_expires_at <= now {
            // Lapsed but not yet swept: expire it here and free the seat.
            if let Some(expired) = self
                .registrations
                .resolve_pending(registration.id, ApprovalStatusDb::Expired)
                .await?
            {
                self.notify_expired(&expired).await;
                self.waiting_list.offer_next_seat(expired.slot_id).await?;
            }
            return Err(ServiceError::TokenExpired);
        }

        let to = match decision {
            ApprovalDecision::Approve => ApprovalStatusDb::Approved,
            ApprovalDecision::Decline => ApprovalStatusDb::Declined,
        };
        let resolved = self
            .registrations
            .resolve_pending(registration.id, to)
            .await?
            .ok_or(ServiceError::AlreadyResolved)?;

        let approved = matches!(decision, ApprovalDecision::Approve);
        info!(
            registration_id = %resolved.id,
            slot_id = %resolved.slot_id,
            approved = approved,
            "Supervisor decision recorded"
        );

        self.notify_decision(&resolved, approved).await;
        if !approved {
            self.waiting_list.offer_next_seat(resolved.slot_id).await?;
        }

        Ok(resolved.into())
    }

    /// Withdraw an active registration. Queued emails for it are cancelled
    /// and the freed seat is offered to the waiting list.
    pub async fn cancel(&self, slot_id: Uuid, presenter_username: &str) -> Result<(), ServiceError> {
        let removed = self
            .registrations
            .delete_active(slot_id, presenter_username)
            .await?
            .ok_or(ServiceError::RegistrationNotFound)?;

        info!(
            registration_id = %removed.id,
            slot_id = %slot_id,
            presenter = %presenter_username,
            "Registration withdrawn"
        );

        self.emails.cancel_for_registration(removed.id).await?;
        self.waiting_list.offer_next_seat(slot_id).await?;
        Ok(())
    }

    /// Look up a registration by ID.
    pub async fn find(&self, id: Uuid) -> Result<Option<Registration>, ServiceError> {
        Ok(self.registrations.find_by_id(id).await?.map(Into::into))
    }

    /// Sweep pending registrations whose approval window lapsed. Each
    /// expiry frees a seat, so the waiting list is prodded per slot.
    pub async fn expire_due(&self) -> Result<usize, ServiceError> {
        let expired = self.registrations.expire_due(Utc::now()).await?;
        let count = expired.len();

        let mut freed_slots = BTreeSet::new();
        for registration in &expired {
            info!(
                registration_id = %registration.id,
                slot_id = %registration.slot_id,
                "Approval window lapsed, registration expired"
            );
            self.notify_expired(registration).await;
            freed_slots.insert(registration.slot_id);
        }
        for slot_id in freed_slots {
            self.waiting_list.offer_next_seat(slot_id).await?;
        }

        Ok(count)
    }

    /// Re-send approval requests for registrations the supervisor has been
    /// quiet on. Returns the number of reminders sent.
    pub async fn send_reminders(&self) -> Result<usize, ServiceError> {
        let now = Utc::now();
        let quiet_since = now - Duration::hours(self.config.registration.reminder_interval_hours);
        let due = self.registrations.find_reminder_due(quiet_since, now).await?;
        let count = due.len();

        for registration in due {
            let domain_registration: Registration = registration.clone().into();

            let (subject, html_body) =
                templates::supervisor_reminder(&self.config.mail.base_url, &domain_registration);
            let mut reminder = NewEmail::new(
                EmailType::SupervisorReminder,
                registration.supervisor_email.clone(),
            );
            reminder.subject = subject;
            reminder.html_body = html_body;
            reminder.registration_id = Some(registration.id);
            reminder.slot_id = Some(registration.slot_id);
            reminder.presenter_username = Some(registration.presenter_username.clone());
            if let Err(e) = self.emails.enqueue(reminder).await {
                warn!(error = %e, "Failed to enqueue supervisor reminder");
                continue;
            }

            let (subject, html_body) = templates::reminder_notice(&domain_registration);
            let mut notice = NewEmail::new(
                EmailType::SupervisorNotification,
                presenter_address(
                    &registration.presenter_username,
                    &self.config.mail.student_email_domain,
                ),
            );
            notice.subject = subject;
            notice.html_body = html_body;
            notice.registration_id = Some(registration.id);
            notice.slot_id = Some(registration.slot_id);
            notice.presenter_username = Some(registration.presenter_username.clone());
            if let Err(e) = self.emails.enqueue(notice).await {
                warn!(error = %e, "Failed to enqueue reminder notice");
            }

            self.registrations.mark_reminder_sent(registration.id, now).await?;
        }

        Ok(count)
    }

    async fn notify_registered(&self, registration: &RegistrationEntity) {
        let domain_registration: Registration = registration.clone().into();

        let (subject, html_body) =
            templates::supervisor_approval(&self.config.mail.base_url, &domain_registration);
        let mut approval = NewEmail::new(
            EmailType::SupervisorApproval,
            registration.supervisor_email.clone(),
        );
        approval.subject = subject;
        approval.html_body = html_body;
        approval.registration_id = Some(registration.id);
        approval.slot_id = Some(registration.slot_id);
        approval.presenter_username = Some(registration.presenter_username.clone());
        if let Err(e) = self.emails.enqueue(approval).await {
            warn!(error = %e, "Failed to enqueue supervisor approval request");
        }

        let (subject, html_body) = templates::registration_confirmation(&domain_registration);
        let mut confirmation = NewEmail::new(
            EmailType::StudentConfirmation,
            presenter_address(
                &registration.presenter_username,
                &self.config.mail.student_email_domain,
            ),
        );
        confirmation.subject = subject;
        confirmation.html_body = html_body;
        confirmation.registration_id = Some(registration.id);
        confirmation.slot_id = Some(registration.slot_id);
        confirmation.presenter_username = Some(registration.presenter_username.clone());
        if let Err(e) = self.emails.enqueue(confirmation).await {
            warn!(error = %e, "Failed to enqueue registration confirmation");
        }
    }

    async fn notify_decision(&self, registration: &RegistrationEntity, approved: bool) {
        let domain_registration: Registration = registration.clone().into();
        let (subject, html_body) =
            templates::approval_notification(&domain_registration, approved);
        let mut email = NewEmail::new(
            EmailType::ApprovalNotification,
            presenter_address(
                &registration.presenter_username,
                &self.config.mail.student_email_domain,
            ),
        );
        email.subject = subject;
        email.html_body = html_body;
        email.registration_id = Some(registration.id);
        email.slot_id = Some(registration.slot_id);
        email.presenter_username = Some(registration.presenter_username.clone());
        if let Err(e) = self.emails.enqueue(email).await {
            warn!(error = %e, "Failed to enqueue approval notification");
        }
    }

    async fn notify_expired(&self, registration: &RegistrationEntity) {
        let domain_registration: Registration = registration.clone().into();
        let (subject, html_body) = templates::expiration_warning(&domain_registration);
        let mut email = NewEmail::new(
            EmailType::ExpirationWarning,
            presenter_address(
                &registration.presenter_username,
                &self.config.mail.student_email_domain,
            ),
        );
        email.subject = subject;
        email.html_body = html_body;
        email.registration_id = Some(registration.id);
        email.slot_id = Some(registration.slot_id);
        email.presenter_username = Some(registration.presenter_username.clone());
        if let Err(e) = self.emails.enqueue(email).await {
            warn!(error = %e, "Failed to enqueue expiration warning");
        }
    }
}
