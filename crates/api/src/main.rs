use anyhow::Result;
use std::time::Duration;
use tracing::info;

use seminar_registration_api::{app, config, jobs, middleware, services};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Load configuration
    let config = config::Config::load()?;

    // Initialize logging
    middleware::logging::init_logging(&config.logging);

    // Initialize Prometheus metrics recorder
    middleware::metrics::init_metrics();

    info!(
        "Starting Seminar Registration backend v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Create database pool
    let pool = persistence::db::create_pool(&config.database_config()).await?;

    // Run migrations
    info!("Running database migrations...");
    sqlx::migrate!("../persistence/src/migrations")
        .run(&pool)
        .await?;
    info!("Migrations completed");

    // Background jobs
    let registry = services::ServiceRegistry::new(pool.clone(), config.clone());
    let mut scheduler = jobs::JobScheduler::new();
    scheduler.register(jobs::EmailQueueJob::new(registry.email_queue.clone()));
    scheduler.register(jobs::RegistrationExpiryJob::new(registry.registrations.clone()));
    scheduler.register(jobs::PromotionExpiryJob::new(registry.waiting_list.clone()));
    scheduler.register(jobs::SupervisorReminderJob::new(registry.registrations.clone()));
    scheduler.register(jobs::PoolMetricsJob::new(pool.clone()));
    scheduler.start();

    // Build application (health + metrics probes)
    let app = app::create_app(config.clone(), pool);

    // Start server
    let addr = config.socket_addr();
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    scheduler.wait_for_shutdown(Duration::from_secs(30)).await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
