//! SMS delivery through a Twilio-compatible REST API
//!
//! Configuration comes from the environment. With `SMS_ENABLED` unset the
//! sender runs dry: it logs what it would have sent and reports success.

use crate::sender::require_address;
use crate::{AlertMessage, Channel, EmergencyContact, SendError, Sender};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default provider endpoint
const DEFAULT_API_BASE: &str = "https://api.twilio.com";

/// HTTP timeout of a single provider request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// SMS provider configuration
#[derive(Debug, Clone, Default)]
pub struct SmsConfig {
    pub enabled: bool,
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    /// Sender phone number
    pub from_number: Option<String>,
    pub api_base: String,
}

impl SmsConfig {
    /// | Variable              | Default                  |
    /// |-----------------------|--------------------------|
    /// | `SMS_ENABLED`         | `false`                  |
    /// | `TWILIO_ACCOUNT_SID`  |                          |
    /// | `TWILIO_AUTH_TOKEN`   |                          |
    /// | `TWILIO_PHONE_NUMBER` |                          |
    /// | `TWILIO_API_BASE`     | `https://api.twilio.com` |
    pub fn from_env() -> Self {
        Self {
            enabled: std::env::var("SMS_ENABLED").map(|v| v == "true").unwrap_or(false),
            account_sid: std::env::var("TWILIO_ACCOUNT_SID").ok(),
            auth_token: std::env::var("TWILIO_AUTH_TOKEN").ok(),
            from_number: std::env::var("TWILIO_PHONE_NUMBER").ok(),
            api_base: std::env::var("TWILIO_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
        }
    }

    /// Dry-run configuration
    pub fn disabled() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            ..Default::default()
        }
    }
}

/// Text of an emergency SMS
pub(crate) fn sms_body(message: &AlertMessage) -> String {
    format!(
        "{}\n\n{}\n\nPlease check on this person immediately.",
        message.title, message.body
    )
}

/// Sends alerts as text messages
pub struct SmsSender {
    config: SmsConfig,
    client: reqwest::Client,
}

impl SmsSender {
    pub fn new(config: SmsConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { config, client })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn messages_url(&self, account_sid: &str) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            account_sid
        )
    }
}

/// Map a provider status to a send result
fn classify_status(status: StatusCode) -> Result<(), SendError> {
    if status.is_success() {
        Ok(())
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Err(SendError::Transient(format!("SMS provider returned HTTP {}", status.as_u16())))
    } else {
        Err(SendError::Rejected(format!("SMS provider returned HTTP {}", status.as_u16())))
    }
}

#[async_trait]
impl Sender for SmsSender {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    async fn send(&self, message: &AlertMessage, contact: &EmergencyContact) -> Result<(), SendError> {
        let phone = require_address(contact, Channel::Sms)?;
        let body = sms_body(message);

        if !self.config.enabled {
            info!(contact_id = contact.id, "SMS disabled, would send emergency alert");
            debug!(to = phone, body = %body, "Dry-run SMS");
            return Ok(());
        }

        let (Some(sid), Some(token), Some(from)) = (
            self.config.account_sid.as_deref(),
            self.config.auth_token.as_deref(),
            self.config.from_number.as_deref(),
        ) else {
            return Err(SendError::Rejected("SMS provider credentials not configured".to_string()));
        };

        let response = self
            .client
            .post(self.messages_url(sid))
            .basic_auth(sid, Some(token))
            .form(&[("To", phone), ("From", from), ("Body", body.as_str())])
            .send()
            .await
            .map_err(|e| {
                warn!(contact_id = contact.id, error = %e, "SMS request failed");
                if e.is_builder() {
                    SendError::Rejected(e.to_string())
                } else {
                    SendError::Transient(e.to_string())
                }
            })?;

        classify_status(response.status())?;
        info!(contact_id = contact.id, "Emergency SMS sent");
        Ok(())
    }
}
