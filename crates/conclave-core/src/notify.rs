//! Operator notifications over a messaging webhook.

use crate::config::NotifyConfig;
use crate::error::{ConclaveError, Result};
use crate::template::truncate;
use serde::Serialize;
use std::time::Duration;

/// Longest message we hand to the messaging service.
pub const MAX_MESSAGE_LEN: usize = 1000;
const PREFIX: &str = "[conclave]";

pub trait Notify {
    fn send(&self, text: &str) -> Result<()>;

    /// Send and swallow failures; notifications must never fail a run.
    fn notify(&self, text: &str) {
        if let Err(e) = self.send(text) {
            tracing::warn!(error = %e, "notification not delivered");
        }
    }
}

#[derive(Serialize)]
struct Message<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    chat_id: Option<&'a str>,
}

pub struct WebhookNotifier {
    client: reqwest::blocking::Client,
    webhook_url: String,
    chat_id: Option<String>,
}

impl WebhookNotifier {
    pub fn new(config: &NotifyConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            webhook_url: config.webhook_url.clone(),
            chat_id: config.chat_id.clone(),
        })
    }
}

impl Notify for WebhookNotifier {
    fn send(&self, text: &str) -> Result<()> {
        let text = truncate(&format!("{PREFIX} {text}"), MAX_MESSAGE_LEN);
        let message = Message {
            text: &text,
            chat_id: self.chat_id.as_deref(),
        };
        let response = self.client.post(&self.webhook_url).json(&message).send()?;
        if response.status().is_success() {
            tracing::debug!("notification delivered");
            Ok(())
        } else {
            Err(ConclaveError::Notify(format!(
                "webhook rejected message ({})",
                response.status()
            )))
        }
    }
}

/// Notifier that only logs. Used for dry runs.
pub struct LogNotifier;

impl Notify for LogNotifier {
    fn send(&self, text: &str) -> Result<()> {
        tracing::info!(message = text, "notification (not sent)");
        Ok(())
    }
}
