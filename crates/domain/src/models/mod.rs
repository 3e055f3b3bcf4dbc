//! Domain models for the seminar registration backend.

pub mod email;
pub mod registration;
pub mod slot;
pub mod waiting_list;

pub use email::{EmailStatus, EmailType, NewEmail, QueuedEmail, RetryDisposition, RetryPolicy};
pub use registration::{
    ApprovalDecision, ApprovalStatus, Degree, RegisterOutcome, RegisterRequest, Registration,
};
pub use slot::{CapacityPolicy, SeminarSlot};
pub use waiting_list::{PromotionStatus, WaitingListEntry, WaitingListPromotion};
