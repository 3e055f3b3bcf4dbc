//! Shared utilities for the seminar registration backend.

pub mod token;
pub mod validation;
