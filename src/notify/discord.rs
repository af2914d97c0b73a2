//! Posting to Discord webhooks.

use std::time::Duration;

use anyhow::Context;
use askama::Template;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::notify::message::{AdminAlertMessage, ReminderMessage};
use crate::notify::Notifier;

pub const MAX_ATTEMPTS: u32 = 3;
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize, Debug)]
struct WebhookMessage {
    content: String,
    allowed_mentions: AllowedMentions,
}

/// Restricts pings to the users named in `users`.
#[derive(Serialize, Debug)]
struct AllowedMentions {
    parse: Vec<String>,
    users: Vec<String>,
}

pub struct DiscordNotifier {
    client: Client,
    reminder_webhook_url: String,
    admin_webhook_url: String,
    enabled: bool,
}

impl DiscordNotifier {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build the webhook client")?;

        Ok(Self {
            client,
            reminder_webhook_url: config.reminder_webhook_url.trim().to_owned(),
            admin_webhook_url: config.admin_webhook_url.trim().to_owned(),
            enabled: config.discord_enabled,
        })
    }

    /// A notifier that drops every message.
    pub fn disabled() -> Self {
        Self {
            client: Client::new(),
            reminder_webhook_url: String::new(),
            admin_webhook_url: String::new(),
            enabled: false,
        }
    }

    /// Posts `message`, retrying with exponential backoff.
    async fn post(&self, channel: &str, url: &str, message: &WebhookMessage) -> bool {
        if !self.enabled {
            debug!(channel, "Discord notifications are disabled, skipping message");
            return false;
        }
        if url.is_empty() {
            warn!(channel, "No webhook configured, skipping message");
            return false;
        }

        for attempt in 1..=MAX_ATTEMPTS {
            let result = self
                .client
                .post(url)
                .json(message)
                .send()
                .await
                .and_then(|response| response.error_for_status());

            match result {
                Ok(_) => {
                    debug!(channel, attempt, "Delivered webhook message");
                    return true;
                }
                Err(err) if attempt < MAX_ATTEMPTS => {
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    warn!(
                        channel,
                        attempt,
                        "Webhook delivery failed, retrying in {}s: {err}",
                        backoff.as_secs()
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => {
                    error!(channel, "Giving up on webhook delivery after {MAX_ATTEMPTS} attempts: {err}");
                }
            }
        }

        false
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send_reminder(
        &self,
        recipient_ids: &[String],
        task_title: &str,
        event_name: &str,
        custom_message: Option<&str>,
    ) -> bool {
        let content =
            match ReminderMessage::new(recipient_ids, task_title, event_name, custom_message).render() {
                Ok(content) => content,
                Err(err) => {
                    error!("Failed to render reminder message: {err}");
                    return false;
                }
            };

        let message = WebhookMessage {
            content: content.trim().to_owned(),
            allowed_mentions: AllowedMentions {
                parse: Vec::new(),
                users: recipient_ids.to_vec(),
            },
        };
        self.post("reminder", &self.reminder_webhook_url, &message)
            .await
    }

    async fn send_admin_alert(
        &self,
        user_display_name: &str,
        task_title: &str,
        event_name: &str,
        reason: &str,
    ) -> bool {
        let alert = AdminAlertMessage {
            user_name: user_display_name,
            task_title,
            event_name,
            reason,
        };
        let content = match alert.render() {
            Ok(content) => content,
            Err(err) => {
                error!("Failed to render admin alert: {err}");
                return false;
            }
        };

        let message = WebhookMessage {
            content: content.trim().to_owned(),
            allowed_mentions: AllowedMentions {
                parse: Vec::new(),
                users: Vec::new(),
            },
        };
        self.post("admin", &self.admin_webhook_url, &message).await
    }
}
