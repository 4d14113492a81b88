//! Channel sender capability

use crate::{AlertMessage, Channel, EmergencyContact, SendError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Delivers an alert to one contact over one channel
#[async_trait]
pub trait Sender: Send + Sync {
    fn channel(&self) -> Channel;

    async fn send(&self, message: &AlertMessage, contact: &EmergencyContact) -> Result<(), SendError>;
}

/// Contact field a channel needs
pub fn required_field(channel: Channel) -> &'static str {
    match channel {
        Channel::Sms | Channel::Whatsapp => "phone",
        Channel::Email => "email",
    }
}

/// The contact's address on a channel, if present
pub fn contact_address(contact: &EmergencyContact, channel: Channel) -> Option<&str> {
    let address = match channel {
        Channel::Sms | Channel::Whatsapp => contact.phone.as_deref(),
        Channel::Email => contact.email.as_deref(),
    };
    address.filter(|a| !a.trim().is_empty())
}

pub(crate) fn require_address(contact: &EmergencyContact, channel: Channel) -> Result<&str, SendError> {
    contact_address(contact, channel).ok_or(SendError::MissingContactField {
        channel,
        field: required_field(channel),
    })
}

/// WhatsApp channel delivered through the SMS provider
pub struct WhatsappSender {
    sms: Arc<dyn Sender>,
}

impl WhatsappSender {
    pub fn new(sms: Arc<dyn Sender>) -> Self {
        Self { sms }
    }
}

#[async_trait]
impl Sender for WhatsappSender {
    fn channel(&self) -> Channel {
        Channel::Whatsapp
    }

    async fn send(&self, message: &AlertMessage, contact: &EmergencyContact) -> Result<(), SendError> {
        require_address(contact, Channel::Whatsapp)?;
        info!(contact_id = contact.id, "WhatsApp not available, delivering over SMS");
        self.sms.send(message, contact).await
    }
}
