//! Email delivery via SMTP

use crate::sender::require_address;
use crate::{AlertMessage, Channel, EmergencyContact, SendError, Sender};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info, warn};

/// Default SMTP port (STARTTLS)
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when `SMTP_FROM` is not set
const DEFAULT_FROM_ADDRESS: &str = "alerts@crisis-pipeline.local";

/// SMTP configuration
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub from_address: String,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
}

impl EmailConfig {
    /// Load from `EMAIL_ENABLED`, `SMTP_HOST`, `SMTP_PORT` (587),
    /// `SMTP_FROM`, `SMTP_USER` and `SMTP_PASSWORD`
    pub fn from_env() -> Self {
        Self {
            enabled: std::env::var("EMAIL_ENABLED").map(|v| v == "true").unwrap_or(false),
            smtp_host: std::env::var("SMTP_HOST").ok(),
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM").unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
        }
    }

    /// Dry-run configuration
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            smtp_host: None,
            smtp_port: DEFAULT_SMTP_PORT,
            from_address: DEFAULT_FROM_ADDRESS.to_string(),
            smtp_user: None,
            smtp_password: None,
        }
    }
}

/// Sends alerts as plain-text emails
pub struct EmailSender {
    config: EmailConfig,
}

impl EmailSender {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn build_message(&self, message: &AlertMessage, to: &str) -> Result<Message, SendError> {
        let from: Mailbox = self
            .config
            .from_address
            .parse()
            .map_err(|e| SendError::Rejected(format!("Invalid sender address: {}", e)))?;
        let to: Mailbox = to
            .parse()
            .map_err(|e| SendError::Rejected(format!("Invalid recipient address: {}", e)))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(message.title.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(format!(
                "{}\n\nPlease check on this person immediately.",
                message.body
            ))
            .map_err(|e| SendError::Rejected(format!("Email build error: {}", e)))
    }

    fn transport(&self, host: &str) -> Result<AsyncSmtpTransport<Tokio1Executor>, SendError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| SendError::Rejected(format!("SMTP setup failed: {}", e)))?
            .port(self.config.smtp_port);

        if let (Some(user), Some(pass)) = (&self.config.smtp_user, &self.config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Ok(builder.build())
    }
}

#[async_trait]
impl Sender for EmailSender {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, message: &AlertMessage, contact: &EmergencyContact) -> Result<(), SendError> {
        let to = require_address(contact, Channel::Email)?;

        if !self.config.enabled {
            info!(contact_id = contact.id, "Email disabled, would send emergency alert");
            debug!(to, subject = %message.title, "Dry-run email");
            return Ok(());
        }

        let Some(host) = self.config.smtp_host.as_deref() else {
            return Err(SendError::Rejected("SMTP_HOST not configured".to_string()));
        };

        let email = self.build_message(message, to)?;
        self.transport(host)?.send(email).await.map_err(|e| {
            warn!(contact_id = contact.id, error = %e, "SMTP delivery failed");
            if e.is_permanent() {
                SendError::Rejected(e.to_string())
            } else {
                SendError::Transient(e.to_string())
            }
        })?;

        info!(contact_id = contact.id, "Emergency email sent");
        Ok(())
    }
}
