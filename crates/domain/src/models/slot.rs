//! Seminar slot model and capacity policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::registration::Degree;

/// A limited-capacity seminar slot presenters register into.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SeminarSlot {
    pub id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub room: String,
    /// Weighted seat budget consumed by active registrations.
    pub capacity: i32,
    pub created_at: DateTime<Utc>,
}

/// Seat weights per degree. PhD presentations run longer, so they consume
/// more of a slot's budget than MSc ones.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CapacityPolicy {
    pub phd_weight: i32,
    pub msc_weight: i32,
}

impl Default for CapacityPolicy {
    fn default() -> Self {
        Self {
            phd_weight: 2,
            msc_weight: 1,
        }
    }
}

impl CapacityPolicy {
    pub fn weight_of(&self, degree: Degree) -> i32 {
        match degree {
            Degree::Phd => self.phd_weight,
            Degree::Msc => self.msc_weight,
        }
    }

    /// Total weighted usage of a set of active registrations.
    pub fn usage(&self, degrees: impl IntoIterator<Item = Degree>) -> i32 {
        degrees.into_iter().map(|d| self.weight_of(d)).sum()
    }

    /// Seats still available given current usage, never negative.
    pub fn available(&self, capacity: i32, used: i32) -> i32 {
        (capacity - used).max(0)
    }

    /// Whether a registration of `degree` fits into the remaining budget.
    pub fn fits(&self, capacity: i32, used: i32, degree: Degree) -> bool {
        used + self.weight_of(degree) <= capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights() {
        let policy = CapacityPolicy::default();
        assert_eq!(policy.weight_of(Degree::Phd), 2);
        assert_eq!(policy.weight_of(Degree::Msc), 1);
    }

    #[test]
    fn test_usage_sums_weights() {
        let policy = CapacityPolicy::default();
        let usage = policy.usage([Degree::Phd, Degree::Msc, Degree::Msc]);
        assert_eq!(usage, 4);
    }

    #[test]
    fn test_available_never_negative() {
        let policy = CapacityPolicy::default();
        assert_eq!(policy.available(4, 6), 0);
        assert_eq!(policy.available(4, 3), 1);
    }

    #[test]
    fn test_phd_does_not_fit_single_remaining_seat() {
        let policy = CapacityPolicy::default();
        assert!(!policy.fits(4, 3, Degree::Phd));
        assert!(policy.fits(4, 3, Degree::Msc));
    }

    #[test]
    fn test_fit_at_exact_capacity() {
        let policy = CapacityPolicy::default();
        assert!(policy.fits(4, 2, Degree::Phd));
        assert!(!policy.fits(4, 4, Degree::Msc));
    }
}
