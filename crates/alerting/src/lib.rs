//! Alerting System
//!
//! Turns an alert-worthy assessment into delivered notifications:
//! - Localized message composition
//! - Channel senders (SMS, email, WhatsApp over SMS)
//! - Dispatch across contacts and channels with whole-batch retries

mod composer;
mod dispatcher;
mod email;
mod scripted;
mod sender;
mod sms;

pub use composer::{
    AlertMessage, AlertSubject, ComposerConfig, LocalizationProvider, MessageComposer, StaticCatalog,
    MESSAGE_KEY, TITLE_KEY,
};
pub use dispatcher::{ChannelDispatcher, DispatchConfig, DispatchOutcome, DispatchSummary, NO_CONTACTS_MESSAGE};
pub use email::{EmailConfig, EmailSender};
pub use scripted::ScriptedSender;
pub use sender::{contact_address, required_field, Sender, WhatsappSender};
pub use sms::{SmsConfig, SmsSender};

pub use storage::{Channel, EmergencyContact};
pub use tokio_util::sync::CancellationToken;

use std::time::Duration;
use thiserror::Error;

/// Failure of one delivery attempt
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SendError {
    #[error("missing contact field")]
    MissingContactField { channel: Channel, field: &'static str },

    #[error("Provider rejected message: {0}")]
    Rejected(String),

    #[error("No sender registered for {0}")]
    Unsupported(Channel),

    #[error("Transient provider failure: {0}")]
    Transient(String),

    #[error("Provider call timed out after {0:?}")]
    Timeout(Duration),
}

impl SendError {
    /// Whether a later pass may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, SendError::Transient(_) | SendError::Timeout(_))
    }
}

/// Terminal dispatch failure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("Alert dispatch failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: SendError },

    #[error("Alert dispatch cancelled")]
    Cancelled,
}
