//! Weighted capacity accounting.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use domain::models::{CapacityPolicy, Degree};
use domain::ServiceError;
use persistence::repositories::{RegistrationRepository, SlotRepository};

/// Computes weighted seat usage per slot from active registrations.
#[derive(Clone)]
pub struct CapacityService {
    slots: SlotRepository,
    registrations: RegistrationRepository,
    policy: CapacityPolicy,
}

impl CapacityService {
    pub fn new(pool: PgPool, policy: CapacityPolicy) -> Self {
        Self {
            slots: SlotRepository::new(pool.clone()),
            registrations: RegistrationRepository::new(pool),
            policy,
        }
    }

    pub fn policy(&self) -> CapacityPolicy {
        self.policy
    }

    /// Weighted usage of a slot inside the caller's slot-locked transaction.
    pub async fn usage_locked(
        &self,
        conn: &mut PgConnection,
        slot_id: Uuid,
    ) -> Result<i32, ServiceError> {
        let degrees = self.registrations.active_degrees(conn, slot_id).await?;
        Ok(self.policy.usage(degrees.into_iter().map(Degree::from)))
    }

    /// Point-in-time weighted usage, without a lock. For display only; any
    /// mutation must use `usage_locked` under the slot lock.
    pub async fn effective_usage(&self, slot_id: Uuid) -> Result<i32, ServiceError> {
        let mut conn = self.registrations.pool().acquire().await?;
        self.usage_locked(&mut conn, slot_id).await
    }

    /// Remaining weighted seats for a slot.
    pub async fn available(&self, slot_id: Uuid) -> Result<i32, ServiceError> {
        let slot = self
            .slots
            .find_by_id(slot_id)
            .await?
            .ok_or(ServiceError::SlotNotFound)?;
        let used = self.effective_usage(slot_id).await?;
        Ok(self.policy.available(slot.capacity, used))
    }

    /// Whether no further registration of any degree fits.
    pub async fn is_full(&self, slot_id: Uuid) -> Result<bool, ServiceError> {
        let slot = self
            .slots
            .find_by_id(slot_id)
            .await?
            .ok_or(ServiceError::SlotNotFound)?;
        let used = self.effective_usage(slot_id).await?;
        Ok(!self.policy.fits(slot.capacity, used, Degree::Msc))
    }
}
