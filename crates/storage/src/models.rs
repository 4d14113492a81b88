//! Stored records

use crate::{ContactId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Relationship recorded when none is given
pub const DEFAULT_RELATIONSHIP: &str = "other";

/// User identity as seen by the alert pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Free-form postal address, used to pick crisis resources
    pub address: Option<String>,
}

impl UserRecord {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Some(name.into()),
            email: None,
            phone: None,
            address: None,
        }
    }
}

/// Alert delivery channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Sms,
    Email,
    Whatsapp,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Sms => "sms",
            Channel::Email => "email",
            Channel::Whatsapp => "whatsapp",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sms" => Ok(Channel::Sms),
            "email" => Ok(Channel::Email),
            "whatsapp" => Ok(Channel::Whatsapp),
            other => Err(format!("Unknown channel: {}", other)),
        }
    }
}

/// Someone to notify when a user is in crisis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub id: ContactId,
    pub user_id: UserId,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub relationship: String,
    pub is_primary: bool,
    /// Contacts can opt out of critical alerts
    pub notify_on_critical: bool,
    pub created_at: DateTime<Utc>,
}

/// Contact creation payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewContact {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub relationship: Option<String>,
    pub is_primary: bool,
    pub notify_on_critical: Option<bool>,
}

impl NewContact {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    pub fn opted_out(mut self) -> Self {
        self.notify_on_critical = Some(false);
        self
    }
}

/// Partial contact update; `None` leaves a field unchanged and an empty
/// phone or email clears it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub relationship: Option<String>,
    pub is_primary: Option<bool>,
    pub notify_on_critical: Option<bool>,
}

/// Per-user emergency alert configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyPreferences {
    pub user_id: UserId,
    pub enable_detection: bool,
    /// Ordered channel set
    pub alert_methods: Vec<Channel>,
    /// Stored for the consent workflow; dispatch does not consult it
    pub require_consent: bool,
    pub allow_manual_override: bool,
}

impl EmergencyPreferences {
    /// Channels used when none are configured
    pub const DEFAULT_METHODS: [Channel; 2] = [Channel::Sms, Channel::Email];

    /// Defaults applied to users who never configured alerts
    pub fn defaults(user_id: UserId) -> Self {
        Self {
            user_id,
            enable_detection: true,
            alert_methods: Self::DEFAULT_METHODS.to_vec(),
            require_consent: true,
            allow_manual_override: true,
        }
    }

    /// Channels to dispatch on: deduplicated in order, defaults when empty
    pub fn channels(&self) -> Vec<Channel> {
        let mut channels: Vec<Channel> = Vec::with_capacity(self.alert_methods.len());
        for channel in &self.alert_methods {
            if !channels.contains(channel) {
                channels.push(*channel);
            }
        }
        if channels.is_empty() {
            channels.extend(Self::DEFAULT_METHODS);
        }
        channels
    }

    /// Apply the fields present in `update`
    pub fn merge(&mut self, update: &PreferenceUpdate) {
        if let Some(enabled) = update.enable_detection {
            self.enable_detection = enabled;
        }
        if let Some(methods) = &update.alert_methods {
            self.alert_methods = methods.clone();
        }
        if let Some(consent) = update.require_consent {
            self.require_consent = consent;
        }
        if let Some(manual) = update.allow_manual_override {
            self.allow_manual_override = manual;
        }
    }

    /// Copy with an effective channel list
    pub fn normalized(mut self) -> Self {
        self.alert_methods = self.channels();
        self
    }
}

/// Partial preference update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceUpdate {
    pub enable_detection: Option<bool>,
    pub alert_methods: Option<Vec<Channel>>,
    pub require_consent: Option<bool>,
    pub allow_manual_override: Option<bool>,
}
