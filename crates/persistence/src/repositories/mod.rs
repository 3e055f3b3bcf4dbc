//! Repository implementations.
//!
//! Repositories encapsulate all SQL for one table family. Methods that must
//! run under the per-slot row lock take a `&mut PgConnection` so the caller
//! controls the transaction.

pub mod email_queue;
pub mod registration;
pub mod slot;
pub mod waiting_list;

pub use email_queue::EmailQueueRepository;
pub use registration::RegistrationRepository;
pub use slot::SlotRepository;
pub use waiting_list::WaitingListRepository;
