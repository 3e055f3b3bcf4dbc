//! Domain layer for the seminar registration backend.
//!
//! This crate contains:
//! - Domain models (slots, registrations, waiting list, email queue)
//! - The service error taxonomy
//! - Pure policy logic (capacity weights, retry backoff)

pub mod error;
pub mod models;

pub use error::ServiceError;
