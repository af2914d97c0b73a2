//! Outbound notifications.
//!
//! Delivery is best effort: a notifier reports whether a message went out and
//! logs why it did not, but never fails the operation that triggered it.

use async_trait::async_trait;

pub mod discord;
pub mod message;
pub mod reminder;

pub use discord::DiscordNotifier;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Pings every recipient in a single message about a task.
    async fn send_reminder(
        &self,
        recipient_ids: &[String],
        task_title: &str,
        event_name: &str,
        custom_message: Option<&str>,
    ) -> bool;

    /// Tells the admins that a task was marked as impossible.
    async fn send_admin_alert(
        &self,
        user_display_name: &str,
        task_title: &str,
        event_name: &str,
        reason: &str,
    ) -> bool;
}
