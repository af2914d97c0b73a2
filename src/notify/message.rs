//! The text of every Discord message the tracker posts.

use askama::Template;

#[derive(Template)]
#[template(path = "reminder.txt")]
pub struct ReminderMessage<'a> {
    /// `<@id>` mentions for every recipient, space separated
    pub mentions: String,
    pub task_title: &'a str,
    pub event_name: &'a str,
    pub custom_message: Option<&'a str>,
}

impl<'a> ReminderMessage<'a> {
    pub fn new(
        recipient_ids: &[String],
        task_title: &'a str,
        event_name: &'a str,
        custom_message: Option<&'a str>,
    ) -> Self {
        Self {
            mentions: recipient_ids
                .iter()
                .map(|id| format!("<@{id}>"))
                .collect::<Vec<_>>()
                .join(" "),
            task_title,
            event_name,
            custom_message: custom_message
                .map(str::trim)
                .filter(|message| !message.is_empty()),
        }
    }
}

#[derive(Template)]
#[template(path = "admin-alert.txt")]
pub struct AdminAlertMessage<'a> {
    pub user_name: &'a str,
    pub task_title: &'a str,
    pub event_name: &'a str,
    pub reason: &'a str,
}
