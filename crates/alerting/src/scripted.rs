//! Scripted sender for tests and dry runs

use crate::{AlertMessage, Channel, EmergencyContact, SendError, Sender};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Sender replaying queued results, then succeeding
pub struct ScriptedSender {
    channel: Channel,
    script: Mutex<VecDeque<Result<(), SendError>>>,
    calls: Mutex<Vec<(Instant, i64)>>,
    messages: Mutex<Vec<AlertMessage>>,
    delay: Option<Duration>,
}

impl ScriptedSender {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            messages: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Queue results for the next calls
    pub fn with_results(self, results: impl IntoIterator<Item = Result<(), SendError>>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.extend(results);
        }
        self
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// When each call started, in call order
    pub fn call_times(&self) -> Vec<Instant> {
        self.calls
            .lock()
            .map(|c| c.iter().map(|(at, _)| *at).collect())
            .unwrap_or_default()
    }

    /// Messages received, in call order
    pub fn messages(&self) -> Vec<AlertMessage> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// Contact ids in call order
    pub fn recipients(&self) -> Vec<i64> {
        self.calls
            .lock()
            .map(|c| c.iter().map(|(_, id)| *id).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Sender for ScriptedSender {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, message: &AlertMessage, contact: &EmergencyContact) -> Result<(), SendError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((Instant::now(), contact.id));
        }
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or(Ok(()))
    }
}
