//! Channel Dispatcher
//!
//! Delivers one alert to every eligible contact x channel pair. Pairs are
//! attempted concurrently and independently. The batch as a whole is
//! retried with exponential backoff when a pass delivers nothing and at
//! least one pair failed transiently; permanent failures are recorded and
//! never retried.

use crate::sender::contact_address;
use crate::{required_field, AlertMessage, Channel, DispatchError, EmergencyContact, SendError, Sender};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Summary message when a user has nobody to notify
pub const NO_CONTACTS_MESSAGE: &str = "no contacts configured";

/// Upper bound on a single backoff wait
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Full passes over all pairs (default: 3)
    pub max_passes: u32,
    /// Backoff base; the wait after pass n is base * 2^n (default: 1000ms)
    pub backoff_base_ms: u64,
    /// Timeout of one provider call (default: 10s)
    pub call_timeout_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_passes: 3,
            backoff_base_ms: 1000,
            call_timeout_ms: 10_000,
        }
    }
}

impl DispatchConfig {
    /// Wait before the pass following pass `attempt` (1-based)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.min(63)).unwrap_or(u64::MAX);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor)).min(MAX_BACKOFF)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

/// Result of one contact x channel attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub contact_id: i64,
    pub contact_name: String,
    pub channel: Channel,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate result of one alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub success: bool,
    /// Successful contact x channel deliveries
    pub contacts_notified: usize,
    /// Eligible contacts
    pub total_contacts: usize,
    /// Outcomes of the final pass
    pub results: Vec<DispatchOutcome>,
    /// Passes run
    pub passes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DispatchSummary {
    /// Summary for a user without eligible contacts
    pub fn no_contacts() -> Self {
        Self {
            success: false,
            contacts_notified: 0,
            total_contacts: 0,
            results: Vec::new(),
            passes: 0,
            message: Some(NO_CONTACTS_MESSAGE.to_string()),
        }
    }
}

/// Outcome of one pass: per-pair outcomes plus the last retryable error
struct PassReport {
    outcomes: Vec<DispatchOutcome>,
    successes: usize,
    last_transient: Option<SendError>,
}

/// Fans alerts out to channel senders
pub struct ChannelDispatcher {
    config: DispatchConfig,
    senders: HashMap<Channel, Arc<dyn Sender>>,
}

impl ChannelDispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            senders: HashMap::new(),
        }
    }

    /// Register a sender for its channel, replacing any previous one
    pub fn with_sender(mut self, sender: Arc<dyn Sender>) -> Self {
        self.register(sender);
        self
    }

    pub fn register(&mut self, sender: Arc<dyn Sender>) {
        self.senders.insert(sender.channel(), sender);
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Deliver `message` to each contact on each channel
    ///
    /// Returns `Ok` once a pass delivers at least once, or when every failure
    /// was permanent. Fails with [`DispatchError::RetriesExhausted`] when all
    /// passes deliver nothing, and with [`DispatchError::Cancelled`] when
    /// `cancel` fires during a backoff wait.
    pub async fn dispatch(
        &self,
        message: &AlertMessage,
        contacts: &[EmergencyContact],
        channels: &[Channel],
        cancel: &CancellationToken,
    ) -> Result<DispatchSummary, DispatchError> {
        if contacts.is_empty() {
            info!("No eligible emergency contacts, skipping dispatch");
            return Ok(DispatchSummary::no_contacts());
        }

        let max_passes = self.config.max_passes.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            counter!("crisis_alert_passes_total").increment(1);
            let report = self.run_pass(message, contacts, channels).await;

            let last_error = match report.last_transient {
                Some(e) if report.successes == 0 => e,
                _ => {
                    info!(
                        attempt,
                        delivered = report.successes,
                        pairs = report.outcomes.len(),
                        "Alert dispatch finished"
                    );
                    return Ok(DispatchSummary {
                        success: report.successes > 0,
                        contacts_notified: report.successes,
                        total_contacts: contacts.len(),
                        results: report.outcomes,
                        passes: attempt,
                        message: None,
                    });
                }
            };

            if attempt >= max_passes {
                error!(attempts = attempt, error = %last_error, "Alert dispatch failed after all retries");
                return Err(DispatchError::RetriesExhausted {
                    attempts: attempt,
                    last_error,
                });
            }

            let delay = self.config.backoff_delay(attempt);
            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %last_error,
                "Dispatch pass delivered nothing, retrying"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(attempt, "Alert dispatch cancelled during backoff");
                    return Err(DispatchError::Cancelled);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn run_pass(
        &self,
        message: &AlertMessage,
        contacts: &[EmergencyContact],
        channels: &[Channel],
    ) -> PassReport {
        let timeout = self.config.call_timeout();
        let mut pending: Vec<(&EmergencyContact, Channel, Option<JoinHandle<Result<(), SendError>>>)> =
            Vec::with_capacity(contacts.len() * channels.len());

        for contact in contacts {
            for &channel in channels {
                let handle = if contact_address(contact, channel).is_none() {
                    None
                } else {
                    let sender = self.senders.get(&channel).cloned();
                    let message = message.clone();
                    let contact = contact.clone();
                    Some(tokio::spawn(async move {
                        let sender = sender.ok_or(SendError::Unsupported(channel))?;
                        tokio::time::timeout(timeout, sender.send(&message, &contact))
                            .await
                            .unwrap_or(Err(SendError::Timeout(timeout)))
                    }))
                };
                pending.push((contact, channel, handle));
            }
        }

        let mut report = PassReport {
            outcomes: Vec::with_capacity(pending.len()),
            successes: 0,
            last_transient: None,
        };

        for (contact, channel, handle) in pending {
            let result = match handle {
                None => Err(SendError::MissingContactField {
                    channel,
                    field: required_field(channel),
                }),
                Some(handle) => handle
                    .await
                    .unwrap_or_else(|e| Err(SendError::Transient(format!("Sender task failed: {}", e)))),
            };

            let outcome = match result {
                Ok(()) => "success",
                Err(ref e) if e.is_retryable() => "transient",
                Err(_) => "failed",
            };
            counter!("crisis_alert_deliveries_total", "channel" => channel.as_str(), "outcome" => outcome)
                .increment(1);

            let error = match result {
                Ok(()) => {
                    report.successes += 1;
                    debug!(contact_id = contact.id, %channel, "Alert delivered");
                    None
                }
                Err(e) => {
                    warn!(contact_id = contact.id, %channel, error = %e, "Alert delivery failed");
                    let text = e.to_string();
                    if e.is_retryable() {
                        report.last_transient = Some(e);
                    }
                    Some(text)
                }
            };

            report.outcomes.push(DispatchOutcome {
                contact_id: contact.id,
                contact_name: contact.name.clone(),
                channel,
                success: error.is_none(),
                error,
            });
        }

        report
    }
}

impl Default for ChannelDispatcher {
    fn default() -> Self {
        Self::new(DispatchConfig::default())
    }
}
