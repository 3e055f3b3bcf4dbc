//! Common test utilities for integration tests.
//!
//! These tests run against a real PostgreSQL database and are skipped when
//! `TEST_DATABASE_URL` is not set.

#![allow(dead_code)]

use fake::faker::lorem::en::Sentence;
use fake::Fake;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use uuid::Uuid;

use domain::models::{Degree, RegisterRequest};
use persistence::entities::SeminarSlotEntity;
use persistence::repositories::SlotRepository;
use seminar_registration_api::config::{
    Config, DatabaseConfig, EmailQueueConfig, LoggingConfig, MailConfig, RegistrationConfig,
    ServerConfig, WaitingListConfig,
};
use seminar_registration_api::services::ServiceRegistry;

/// Create a test database pool, or `None` when `TEST_DATABASE_URL` is not
/// set (the caller should skip the test).
pub async fn try_test_pool() -> Option<PgPool> {
    let database_url = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("TEST_DATABASE_URL not set, skipping integration test");
            return None;
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    run_migrations(&pool).await;
    Some(pool)
}

/// Run migrations on the test database.
pub async fn run_migrations(pool: &PgPool) {
    let migration_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("persistence/src/migrations");

    let mut entries: Vec<_> = std::fs::read_dir(&migration_dir)
        .expect("Failed to read migrations directory")
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map(|ext| ext == "sql").unwrap_or(false))
        .collect();

    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let sql = std::fs::read_to_string(entry.path()).expect("Failed to read migration file");

        // Migration might already be applied, ignore errors
        let _ = sqlx::raw_sql(&sql).execute(pool).await;
    }
}

/// Test configuration with mail disabled (sends always succeed).
pub fn test_config(database_url: &str) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            request_timeout_secs: 30,
        },
        database: DatabaseConfig {
            url: database_url.to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 10,
            idle_timeout_secs: 600,
        },
        logging: LoggingConfig {
            level: "warn".to_string(),
            format: "pretty".to_string(),
        },
        registration: RegistrationConfig::default(),
        waiting_list: WaitingListConfig::default(),
        email_queue: EmailQueueConfig::default(),
        mail: MailConfig::default(),
    }
}

/// Build the service graph against the test database.
pub fn registry(pool: PgPool, config: Config) -> ServiceRegistry {
    ServiceRegistry::new(pool, config)
}

/// Create a slot starting tomorrow with the given capacity.
pub async fn create_slot(pool: &PgPool, capacity: i32) -> SeminarSlotEntity {
    let starts_at = chrono::Utc::now() + chrono::Duration::days(1);
    SlotRepository::new(pool.clone())
        .create(starts_at, starts_at + chrono::Duration::hours(4), "A-101", capacity)
        .await
        .expect("Failed to create test slot")
}

/// Unique presenter username so concurrent tests don't collide.
pub fn unique_presenter(prefix: &str) -> String {
    format!("{}-{}", prefix, &Uuid::new_v4().to_string()[..8])
}

/// A valid registration request for the given presenter.
pub fn register_request(presenter: &str, degree: Degree) -> RegisterRequest {
    RegisterRequest {
        presenter_username: presenter.to_string(),
        degree,
        topic: Sentence(3..8).fake(),
        supervisor_name: "Prof. Example".to_string(),
        supervisor_email: "supervisor@university.edu".to_string(),
    }
}
