//! HTTP route handlers (health and metrics probes).

pub mod health;
