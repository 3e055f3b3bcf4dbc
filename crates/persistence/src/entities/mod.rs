//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod email_queue;
pub mod registration;
pub mod slot;
pub mod waiting_list;

pub use email_queue::{EmailQueueEntity, EmailStatusDb, EmailTypeDb};
pub use registration::{ApprovalStatusDb, DegreeDb, RegistrationEntity};
pub use slot::SeminarSlotEntity;
pub use waiting_list::{PromotionStatusDb, WaitingListEntryEntity, WaitingListPromotionEntity};
