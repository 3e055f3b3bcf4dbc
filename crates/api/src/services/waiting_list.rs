//! Waiting list manager.
//!
//! Keeps an ordered backlog per slot and issues time-boxed promotion offers
//! when capacity frees up. All check-then-act sequences run inside a
//! transaction holding the slot row lock.

use chrono::{Duration, Utc};
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use domain::models::{
    CapacityPolicy, Degree, EmailType, NewEmail, PromotionStatus, RegisterRequest, Registration,
    WaitingListPromotion,
};
use domain::ServiceError;
use persistence::entities::{
    ApprovalStatusDb, PromotionStatusDb, RegistrationEntity, WaitingListEntryEntity,
};
use persistence::repositories::{RegistrationRepository, SlotRepository, WaitingListRepository};
use shared::token::generate_token;

use crate::config::Config;
use crate::services::{email_queue::EmailQueueService, is_unique_violation, presenter_address, templates};

/// Service for waiting list and promotion offer operations.
#[derive(Clone)]
pub struct WaitingListService {
    pool: PgPool,
    slots: SlotRepository,
    registrations: RegistrationRepository,
    waiting: WaitingListRepository,
    emails: EmailQueueService,
    config: Arc<Config>,
}

impl WaitingListService {
    pub fn new(pool: PgPool, emails: EmailQueueService, config: Arc<Config>) -> Self {
        Self {
            slots: SlotRepository::new(pool.clone()),
            registrations: RegistrationRepository::new(pool.clone()),
            waiting: WaitingListRepository::new(pool.clone()),
            pool,
            emails,
            config,
        }
    }

    fn policy(&self) -> CapacityPolicy {
        self.config.registration.capacity_policy()
    }

    /// Append inside an already slot-locked transaction. Used by the
    /// registration path when the slot turns out to be full.
    pub(crate) async fn append_locked(
        &self,
        conn: &mut PgConnection,
        slot_id: Uuid,
        request: &RegisterRequest,
    ) -> Result<WaitingListEntryEntity, ServiceError> {
        if !self.config.waiting_list.allow_multiple_waiting
            && self
                .waiting
                .exists_waiting_anywhere(conn, &request.presenter_username)
                .await?
        {
            return Err(ServiceError::AlreadyWaiting);
        }

        let entry = self
            .waiting
            .append(
                conn,
                slot_id,
                &request.presenter_username,
                request.degree.into(),
                &request.topic,
                &request.supervisor_name,
                &request.supervisor_email,
            )
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ServiceError::AlreadyWaiting
                } else {
                    ServiceError::Database(e)
                }
            })?;

        info!(
            slot_id = %slot_id,
            presenter = %entry.presenter_username,
            position = entry.position,
            "Appended to waiting list"
        );
        Ok(entry)
    }

    /// Add a presenter to a slot's waiting list.
    pub async fn enqueue(
        &self,
        slot_id: Uuid,
        request: &RegisterRequest,
    ) -> Result<i32, ServiceError> {
        let mut tx = self.pool.begin().await?;
        self.slots
            .lock_for_update(&mut tx, slot_id)
            .await?
            .ok_or(ServiceError::SlotNotFound)?;
        let entry = self.append_locked(&mut tx, slot_id, request).await?;
        tx.commit().await?;

        self.notify_waitlisted(&entry).await;
        Ok(entry.position)
    }

    /// Enqueue the waiting list confirmation email for a new entry.
    pub(crate) async fn notify_waitlisted(&self, entry: &WaitingListEntryEntity) {
        let domain_entry = entry.clone().into();
        let (subject, html_body) = templates::waitlist_confirmation(&domain_entry);
        let mut email = NewEmail::new(
            EmailType::StudentConfirmation,
            presenter_address(
                &entry.presenter_username,
                &self.config.mail.student_email_domain,
            ),
        );
        email.subject = subject;
        email.html_body = html_body;
        email.slot_id = Some(entry.slot_id);
        email.presenter_username = Some(entry.presenter_username.clone());
        if let Err(e) = self.emails.enqueue(email).await {
            warn!(error = %e, "Failed to enqueue waitlist confirmation");
        }
    }

    /// Offer a freed seat to the first eligible waiting entry. Invoked once
    /// per capacity-freeing event; returns the recorded offer, if any.
    pub async fn offer_next_seat(
        &self,
        slot_id: Uuid,
    ) -> Result<Option<WaitingListPromotion>, ServiceError> {
        let now = Utc::now();
        let expires_at = now + Duration::hours(self.config.waiting_list.promotion_window_hours);

        let mut tx = self.pool.begin().await?;
        let slot = self
            .slots
            .lock_for_update(&mut tx, slot_id)
            .await?
            .ok_or(ServiceError::SlotNotFound)?;

        let candidate = match self.waiting.next_candidate(&mut tx, slot_id).await? {
            Some(entry) => entry,
            None => {
                tx.commit().await?;
                return Ok(None);
            }
        };

        let degrees = self.registrations.active_degrees(&mut tx, slot_id).await?;
        let used = self.policy().usage(degrees.into_iter().map(Degree::from));
        if !self
            .policy()
            .fits(slot.capacity, used, candidate.degree.into())
        {
            // The freed capacity does not cover the head of the list; the
            // seat waits for the next freeing event.
            tx.commit().await?;
            return Ok(None);
        }

        let token = generate_token();
        self.waiting
            .set_offer(&mut tx, candidate.id, &token, expires_at)
            .await?;
        let promotion = self
            .waiting
            .create_promotion(
                &mut tx,
                slot_id,
                &candidate.presenter_username,
                &token,
                expires_at,
            )
            .await?;
        tx.commit().await?;

        info!(
            slot_id = %slot_id,
            presenter = %candidate.presenter_username,
            expires_at = %expires_at,
            "Promotion offer issued"
        );

        let domain_entry = candidate.clone().into();
        let (subject, html_body) = templates::promotion_offer(
            &self.config.mail.base_url,
            &domain_entry,
            &token,
            expires_at,
        );
        let mut email = NewEmail::new(
            EmailType::StudentConfirmation,
            presenter_address(
                &candidate.presenter_username,
                &self.config.mail.student_email_domain,
            ),
        );
        email.subject = subject;
        email.html_body = html_body;
        email.slot_id = Some(slot_id);
        email.presenter_username = Some(candidate.presenter_username.clone());
        if let Err(e) = self.emails.enqueue(email).await {
            warn!(error = %e, "Failed to enqueue promotion offer email");
        }

        Ok(Some(promotion.into()))
    }

    /// Accept a promotion offer by token, converting the entry into a
    /// registration. Idempotent on repeated clicks.
    pub async fn accept_offer(&self, token: &str) -> Result<Registration, ServiceError> {
        let promotion = self
            .waiting
            .find_promotion_by_token(token)
            .await?
            .ok_or(ServiceError::TokenNotFound)?;

        match promotion.status.into() {
            PromotionStatus::Accepted => return Err(ServiceError::AlreadyResolved),
            PromotionStatus::Expired | PromotionStatus::Declined => {
                return Err(ServiceError::OfferExpired)
            }
            PromotionStatus::Pending => {}
        }

        let now = Utc::now();
        if promotion.expires_at <= now {
            // Lapsed but not yet swept: expire it, drop the entry, pass the
            // seat on.
            self.forfeit(promotion.id, promotion.slot_id, &promotion.presenter_username)
                .await?;
            self.offer_next_seat(promotion.slot_id).await?;
            return Err(ServiceError::OfferExpired);
        }

        let approval_window = Duration::hours(self.config.registration.approval_window_hours);
        let auto_approve = self.config.waiting_list.promotion_auto_approve;

        let mut tx = self.pool.begin().await?;
        let slot = self
            .slots
            .lock_for_update(&mut tx, promotion.slot_id)
            .await?
            .ok_or(ServiceError::SlotNotFound)?;

        let resolved = self
            .waiting
            .resolve_promotion(&mut tx, promotion.id, PromotionStatusDb::Accepted, now)
            .await?;
        if resolved.is_none() {
            // Raced with the sweep or a duplicate click.
            tx.commit().await?;
            return Err(ServiceError::AlreadyResolved);
        }

        let entry = self
            .waiting
            .find_entry_locked(&mut tx, promotion.slot_id, &promotion.presenter_username)
            .await?
            .ok_or(ServiceError::NotWaiting)?;

        let degrees = self
            .registrations
            .active_degrees(&mut tx, promotion.slot_id)
            .await?;
        let used = self.policy().usage(degrees.into_iter().map(Degree::from));
        if !self
            .policy()
            .fits(slot.capacity, used, entry.degree.into())
        {
            tx.rollback().await?;
            return Err(ServiceError::SlotFull);
        }

        self.waiting.remove_and_compact(&mut tx, entry.id).await?;

        let status = if auto_approve {
            ApprovalStatusDb::Approved
        } else {
            ApprovalStatusDb::Pending
        };
        let registration = self
            .registrations
            .create_with_status(
                &mut tx,
                promotion.slot_id,
                &entry.presenter_username,
                entry.degree,
                &entry.topic,
                &entry.supervisor_name,
                &entry.supervisor_email,
                status,
                &generate_token(),
                now + approval_window,
            )
            .await?;
        tx.commit().await?;

        info!(
            slot_id = %promotion.slot_id,
            presenter = %entry.presenter_username,
            auto_approve = auto_approve,
            "Promotion offer accepted"
        );

        self.notify_promoted(&registration, auto_approve).await;
        Ok(registration.into())
    }

    /// Remove a presenter from a slot's waiting list.
    pub async fn withdraw(&self, slot_id: Uuid, presenter_username: &str) -> Result<(), ServiceError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        self.slots
            .lock_for_update(&mut tx, slot_id)
            .await?
            .ok_or(ServiceError::SlotNotFound)?;

        let entry = self
            .waiting
            .find_entry_locked(&mut tx, slot_id, presenter_username)
            .await?
            .ok_or(ServiceError::NotWaiting)?;

        let had_live_offer = entry
            .promotion_token_expires_at
            .map(|at| at > now)
            .unwrap_or(false);

        self.waiting
            .expire_live_promotion(&mut tx, slot_id, presenter_username, now)
            .await?;
        self.waiting.remove_and_compact(&mut tx, entry.id).await?;
        tx.commit().await?;

        info!(
            slot_id = %slot_id,
            presenter = %presenter_username,
            "Withdrawn from waiting list"
        );

        // A live offer was holding a seat for this entry; pass it on.
        if had_live_offer {
            self.offer_next_seat(slot_id).await?;
        }
        Ok(())
    }

    /// Current 1-based position of a presenter in a slot's waiting list.
    pub async fn position(
        &self,
        slot_id: Uuid,
        presenter_username: &str,
    ) -> Result<Option<i32>, ServiceError> {
        let entry = self.waiting.find_entry(slot_id, presenter_username).await?;
        Ok(entry.map(|e| e.position))
    }

    /// Sweep lapsed promotion offers: the forfeiting entry leaves the list
    /// and the seat is offered to the next candidate. Returns the number of
    /// offers expired.
    pub async fn expire_due_offers(&self) -> Result<usize, ServiceError> {
        let now = Utc::now();
        let expired = self.waiting.expire_due_promotions(now).await?;
        let count = expired.len();

        for promotion in expired {
            info!(
                slot_id = %promotion.slot_id,
                presenter = %promotion.presenter_username,
                "Promotion offer expired"
            );
            self.remove_forfeited_entry(
                promotion.slot_id,
                &promotion.presenter_username,
                &promotion.promotion_token,
            )
            .await?;
            self.offer_next_seat(promotion.slot_id).await?;
        }

        Ok(count)
    }

    /// Expire a lapsed promotion and drop its entry (accept-path variant of
    /// the sweep).
    async fn forfeit(
        &self,
        promotion_id: Uuid,
        slot_id: Uuid,
        presenter_username: &str,
    ) -> Result<(), ServiceError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        self.slots
            .lock_for_update(&mut tx, slot_id)
            .await?
            .ok_or(ServiceError::SlotNotFound)?;
        self.waiting
            .resolve_promotion(&mut tx, promotion_id, PromotionStatusDb::Expired, now)
            .await?;
        if let Some(entry) = self
            .waiting
            .find_entry_locked(&mut tx, slot_id, presenter_username)
            .await?
        {
            self.waiting.remove_and_compact(&mut tx, entry.id).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn remove_forfeited_entry(
        &self,
        slot_id: Uuid,
        presenter_username: &str,
        token: &str,
    ) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;
        if self
            .slots
            .lock_for_update(&mut tx, slot_id)
            .await?
            .is_none()
        {
            tx.commit().await?;
            return Ok(());
        }
        if let Some(entry) = self
            .waiting
            .find_entry_locked(&mut tx, slot_id, presenter_username)
            .await?
        {
            // Only drop the entry if it still belongs to the expired offer.
            if entry.promotion_token.as_deref() == Some(token) {
                self.waiting.remove_and_compact(&mut tx, entry.id).await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn notify_promoted(&self, registration: &RegistrationEntity, auto_approve: bool) {
        let domain_registration: Registration = registration.clone().into();

        if auto_approve {
            let (subject, html_body) = templates::approval_notification(&domain_registration, true);
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
                warn!(error = %e, "Failed to enqueue promotion notification");
            }
        } else {
            let (subject, html_body) =
                templates::supervisor_approval(&self.config.mail.base_url, &domain_registration);
            let mut email = NewEmail::new(
                EmailType::SupervisorApproval,
                registration.supervisor_email.clone(),
            );
            email.subject = subject;
            email.html_body = html_body;
            email.registration_id = Some(registration.id);
            email.slot_id = Some(registration.slot_id);
            email.presenter_username = Some(registration.presenter_username.clone());
            if let Err(e) = self.emails.enqueue(email).await {
                warn!(error = %e, "Failed to enqueue supervisor approval request");
            }
        }
    }
}
