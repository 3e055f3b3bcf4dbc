use serde::Deserialize;
use std::net::SocketAddr;

use domain::models::{CapacityPolicy, RetryPolicy};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub registration: RegistrationConfig,
    #[serde(default)]
    pub waiting_list: WaitingListConfig,
    #[serde(default)]
    pub email_queue: EmailQueueConfig,
    #[serde(default)]
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Registration ledger configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationConfig {
    /// Hours a supervisor has to act on an approval link.
    #[serde(default = "default_approval_window_hours")]
    pub approval_window_hours: i64,

    /// Hours of supervisor silence before a reminder is re-sent.
    #[serde(default = "default_reminder_interval_hours")]
    pub reminder_interval_hours: i64,

    /// Seat weight of a PhD registration.
    #[serde(default = "default_phd_weight")]
    pub phd_weight: i32,

    /// Seat weight of an MSc registration.
    #[serde(default = "default_msc_weight")]
    pub msc_weight: i32,

    /// Whether a presenter may hold active registrations in several slots.
    #[serde(default)]
    pub allow_multiple_active: bool,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            approval_window_hours: default_approval_window_hours(),
            reminder_interval_hours: default_reminder_interval_hours(),
            phd_weight: default_phd_weight(),
            msc_weight: default_msc_weight(),
            allow_multiple_active: false,
        }
    }
}

impl RegistrationConfig {
    pub fn capacity_policy(&self) -> CapacityPolicy {
        CapacityPolicy {
            phd_weight: self.phd_weight,
            msc_weight: self.msc_weight,
        }
    }
}

/// Waiting list configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WaitingListConfig {
    /// Hours a promotion offer stays open.
    #[serde(default = "default_promotion_window_hours")]
    pub promotion_window_hours: i64,

    /// Whether an accepted promotion becomes approved directly, or restarts
    /// the supervisor approval workflow.
    #[serde(default = "default_promotion_auto_approve")]
    pub promotion_auto_approve: bool,

    /// Whether a presenter may wait on several slots at once.
    #[serde(default)]
    pub allow_multiple_waiting: bool,
}

impl Default for WaitingListConfig {
    fn default() -> Self {
        Self {
            promotion_window_hours: default_promotion_window_hours(),
            promotion_auto_approve: default_promotion_auto_approve(),
            allow_multiple_waiting: false,
        }
    }
}

/// Email delivery queue configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailQueueConfig {
    /// Maximum emails claimed per worker cycle.
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,

    /// Default retry budget per email.
    #[serde(default = "default_max_retries")]
    pub max_retries: i32,

    /// Delay before the first retry.
    #[serde(default = "default_initial_backoff_minutes")]
    pub initial_backoff_minutes: i64,

    /// Backoff growth factor; 1.0 keeps the delay fixed.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Minutes after which a processing row is considered abandoned.
    #[serde(default = "default_stuck_cutoff_minutes")]
    pub stuck_cutoff_minutes: i64,
}

impl Default for EmailQueueConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            initial_backoff_minutes: default_initial_backoff_minutes(),
            backoff_multiplier: default_backoff_multiplier(),
            stuck_cutoff_minutes: default_stuck_cutoff_minutes(),
        }
    }
}

impl EmailQueueConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_backoff_minutes: self.initial_backoff_minutes,
            multiplier: self.backoff_multiplier,
        }
    }
}

/// Mail transport configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// Whether mail sending is enabled. Disabled transport reports success
    /// without sending.
    #[serde(default)]
    pub enabled: bool,

    /// Mail provider: smtp, sendgrid, or console (for development).
    #[serde(default = "default_mail_provider")]
    pub provider: String,

    /// SMTP server host (for smtp provider)
    #[serde(default)]
    pub smtp_host: String,

    /// SMTP server port (for smtp provider)
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// SMTP username (for smtp provider)
    #[serde(default)]
    pub smtp_username: String,

    /// SMTP password (for smtp provider)
    #[serde(default)]
    pub smtp_password: String,

    /// Whether to use TLS for SMTP (default: true)
    #[serde(default = "default_smtp_tls")]
    pub smtp_use_tls: bool,

    /// SendGrid API key (for sendgrid provider)
    #[serde(default)]
    pub sendgrid_api_key: String,

    /// Sender email address (From header)
    #[serde(default = "default_sender_email")]
    pub sender_email: String,

    /// Sender name (From header)
    #[serde(default = "default_sender_name")]
    pub sender_name: String,

    /// Base URL for approval and promotion links.
    #[serde(default)]
    pub base_url: String,

    /// Domain appended to presenter usernames to form their address.
    #[serde(default = "default_student_email_domain")]
    pub student_email_domain: String,

    /// Per-send request timeout in seconds.
    #[serde(default = "default_mail_timeout")]
    pub timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_mail_provider(),
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            smtp_use_tls: default_smtp_tls(),
            sendgrid_api_key: String::new(),
            sender_email: default_sender_email(),
            sender_name: default_sender_name(),
            base_url: String::new(),
            student_email_domain: default_student_email_domain(),
            timeout_secs: default_mail_timeout(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    5
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_approval_window_hours() -> i64 {
    48
}
fn default_reminder_interval_hours() -> i64 {
    48
}
fn default_phd_weight() -> i32 {
    2
}
fn default_msc_weight() -> i32 {
    1
}
fn default_promotion_window_hours() -> i64 {
    24
}
fn default_promotion_auto_approve() -> bool {
    true
}
fn default_batch_size() -> i64 {
    50
}
fn default_max_retries() -> i32 {
    3
}
fn default_initial_backoff_minutes() -> i64 {
    5
}
fn default_backoff_multiplier() -> f64 {
    1.0
}
fn default_stuck_cutoff_minutes() -> i64 {
    5
}
fn default_mail_provider() -> String {
    "console".to_string()
}
fn default_smtp_port() -> u16 {
    587
}
fn default_smtp_tls() -> bool {
    true
}
fn default_sender_email() -> String {
    "noreply@seminars.example.edu".to_string()
}
fn default_sender_name() -> String {
    "Seminar Registration".to_string()
}
fn default_student_email_domain() -> String {
    "example.edu".to_string()
}
fn default_mail_timeout() -> u64 {
    10
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with SR__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("SR").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// This method creates a config entirely from defaults and overrides,
    /// without relying on config files (which may not be accessible during tests).
    #[cfg(test)]
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        // Embed defaults directly to avoid file system dependency in tests
        let defaults = r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            request_timeout_secs = 30

            [database]
            url = "postgres://test"
            max_connections = 20
            min_connections = 5
            connect_timeout_secs = 10
            idle_timeout_secs = 600

            [logging]
            level = "info"
            format = "json"

            [registration]
            approval_window_hours = 48
            reminder_interval_hours = 48
            phd_weight = 2
            msc_weight = 1
            allow_multiple_active = false

            [waiting_list]
            promotion_window_hours = 24
            promotion_auto_approve = true
            allow_multiple_waiting = false

            [email_queue]
            batch_size = 50
            max_retries = 3
            initial_backoff_minutes = 5
            backoff_multiplier = 1.0
            stuck_cutoff_minutes = 5

            [mail]
            enabled = false
            provider = "console"
            sender_email = "test@example.com"
            sender_name = "Test"
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "database.url".to_string(),
            ));
        }
        if self.registration.phd_weight <= 0 || self.registration.msc_weight <= 0 {
            return Err(ConfigValidationError::InvalidValue(
                "registration weights must be positive".to_string(),
            ));
        }
        if self.registration.approval_window_hours <= 0 {
            return Err(ConfigValidationError::InvalidValue(
                "registration.approval_window_hours must be positive".to_string(),
            ));
        }
        if self.waiting_list.promotion_window_hours <= 0 {
            return Err(ConfigValidationError::InvalidValue(
                "waiting_list.promotion_window_hours must be positive".to_string(),
            ));
        }
        if self.email_queue.batch_size <= 0 {
            return Err(ConfigValidationError::InvalidValue(
                "email_queue.batch_size must be positive".to_string(),
            ));
        }
        if self.email_queue.backoff_multiplier < 1.0 {
            return Err(ConfigValidationError::InvalidValue(
                "email_queue.backoff_multiplier must be at least 1.0".to_string(),
            ));
        }
        match self.mail.provider.as_str() {
            "console" | "smtp" | "sendgrid" => {}
            other => {
                return Err(ConfigValidationError::InvalidValue(format!(
                    "unknown mail provider: {other}"
                )));
            }
        }
        Ok(())
    }

    /// Socket address the probe server binds to.
    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], self.server.port)))
    }

    /// Database pool configuration for the persistence layer.
    pub fn database_config(&self) -> persistence::db::DatabaseConfig {
        persistence::db::DatabaseConfig {
            url: self.database.url.clone(),
            max_connections: self.database.max_connections,
            min_connections: self.database.min_connections,
            connect_timeout_secs: self.database.connect_timeout_secs,
            idle_timeout_secs: self.database.idle_timeout_secs,
        }
    }
}
