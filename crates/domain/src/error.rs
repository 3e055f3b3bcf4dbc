//! Error taxonomy for the registration services.

use thiserror::Error;

/// Errors surfaced by the registration, waiting list and email services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Seminar slot not found")]
    SlotNotFound,

    #[error("Registration not found")]
    RegistrationNotFound,

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("An active registration already exists for this presenter")]
    DuplicateRegistration,

    #[error("Seminar slot is full")]
    SlotFull,

    #[error("Token not found")]
    TokenNotFound,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Registration has already been resolved")]
    AlreadyResolved,

    #[error("Promotion offer has expired")]
    OfferExpired,

    #[error("Presenter is already on a waiting list")]
    AlreadyWaiting,

    #[error("Presenter is not on the waiting list")]
    NotWaiting,

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    /// Transient delivery failure; the email stays queued for retry.
    #[error("Email delivery failed: {0}")]
    DeliveryFailure(String),

    /// Delivery failed and the retry budget is exhausted.
    #[error("Email delivery permanently failed after {retries} retries: {reason}")]
    DeliveryExhausted { retries: i32, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<shared::validation::EmailValidationError> for ServiceError {
    fn from(err: shared::validation::EmailValidationError) -> Self {
        ServiceError::InvalidEmail(err.to_string())
    }
}
