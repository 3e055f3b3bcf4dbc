//! Mail transport for the delivery queue.
//!
//! Supports multiple providers:
//! - `console`: Logs emails to console (development)
//! - `smtp`: Sends via SMTP server
//! - `sendgrid`: Uses SendGrid API

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use shared::validation::mask_email;

use crate::config::MailConfig;

/// Errors that can occur during a send attempt.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail provider not configured")]
    NotConfigured,

    #[error("Failed to send email: {0}")]
    SendFailed(String),

    #[error("Provider rejected the message ({code}): {message}")]
    Rejected { code: String, message: String },
}

impl MailError {
    /// Short machine-readable code recorded on the queue row.
    pub fn code(&self) -> Option<String> {
        match self {
            MailError::NotConfigured => Some("not_configured".to_string()),
            MailError::SendFailed(_) => None,
            MailError::Rejected { code, .. } => Some(code.clone()),
        }
    }
}

/// A message handed to the transport by the queue worker.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub to: String,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub subject: String,
    pub html_body: String,
}

/// Mail transport dispatching to the configured provider.
#[derive(Clone)]
pub struct MailService {
    config: Arc<MailConfig>,
    client: reqwest::Client,
}

impl MailService {
    /// Creates a new MailService with the given configuration. Sends are
    /// bounded by the configured timeout.
    pub fn new(config: MailConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            config: Arc::new(config),
            client,
        }
    }

    /// Check if mail sending is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Send a message via the configured provider.
    pub async fn send(&self, message: &OutboundMessage) -> Result<(), MailError> {
        if !self.config.enabled {
            debug!(
                to = %mask_email(&message.to),
                subject = %message.subject,
                "Mail disabled, skipping send"
            );
            return Ok(());
        }

        match self.config.provider.as_str() {
            "console" => self.send_console(message),
            "smtp" => self.send_smtp(message),
            "sendgrid" => self.send_sendgrid(message).await,
            provider => {
                error!(provider = %provider, "Unknown mail provider");
                Err(MailError::NotConfigured)
            }
        }
    }

    /// Console provider - logs the email (for development).
    fn send_console(&self, message: &OutboundMessage) -> Result<(), MailError> {
        info!(
            to = %mask_email(&message.to),
            cc = ?message.cc.as_deref().map(mask_email),
            subject = %message.subject,
            from = %self.config.sender_email,
            from_name = %self.config.sender_name,
            "Email (console provider)"
        );
        debug!(
            body_html_length = message.html_body.len(),
            "Email body (HTML)"
        );
        Ok(())
    }

    /// SMTP provider - logs what would be sent. Full SMTP support requires
    /// the lettre crate.
    fn send_smtp(&self, message: &OutboundMessage) -> Result<(), MailError> {
        if self.config.smtp_host.is_empty() {
            return Err(MailError::NotConfigured);
        }

        warn!(
            provider = "smtp",
            host = %self.config.smtp_host,
            port = %self.config.smtp_port,
            "SMTP provider configured but full implementation requires lettre crate"
        );
        info!(
            to = %mask_email(&message.to),
            subject = %message.subject,
            smtp_host = %self.config.smtp_host,
            "Email would be sent via SMTP"
        );
        Ok(())
    }

    /// SendGrid provider - sends via SendGrid API.
    async fn send_sendgrid(&self, message: &OutboundMessage) -> Result<(), MailError> {
        if self.config.sendgrid_api_key.is_empty() {
            return Err(MailError::NotConfigured);
        }

        let mut recipients = serde_json::json!({
            "to": [{ "email": message.to }]
        });
        if let Some(cc) = &message.cc {
            recipients["cc"] = serde_json::json!([{ "email": cc }]);
        }
        if let Some(bcc) = &message.bcc {
            recipients["bcc"] = serde_json::json!([{ "email": bcc }]);
        }

        let body = serde_json::json!({
            "personalizations": [recipients],
            "from": {
                "email": self.config.sender_email,
                "name": self.config.sender_name
            },
            "subject": message.subject,
            "content": [{
                "type": "text/html",
                "value": message.html_body
            }]
        });

        let response = self
            .client
            .post("https://api.sendgrid.com/v3/mail/send")
            .bearer_auth(&self.config.sendgrid_api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| MailError::SendFailed(e.to_string()))?;

        if response.status().is_success() {
            info!(
                to = %mask_email(&message.to),
                subject = %message.subject,
                "Email sent via SendGrid"
            );
            Ok(())
        } else {
            let code = response.status().as_u16().to_string();
            let text = response.text().await.unwrap_or_default();
            error!(
                status = %code,
                response = %text,
                "SendGrid rejected the message"
            );
            Err(MailError::Rejected {
                code,
                message: text,
            })
        }
    }
}
