//! Logging and metrics bootstrap.

pub mod logging;
pub mod metrics;
