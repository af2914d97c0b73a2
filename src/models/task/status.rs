//! The task lifecycle.
//!
//! Tasks start out `PENDING` and move to `DONE` or `CANNOT_DO`; the only way
//! back is an explicit undo. Reassigning a resolved task also sends it back to
//! `PENDING` so the new owner starts fresh.

use std::sync::Arc;

use async_graphql::Enum;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::warn;

use crate::db::{self, Store};
use crate::error::{TrackerError, TrackerResult};
use crate::models::audit::NewAuditLog;
use crate::models::event::Event;
use crate::models::member::User;
use crate::models::permissions::ensure_can_modify;
use crate::models::task::Task;
use crate::models::GqlDateTime;
use crate::notify::Notifier;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Enum, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "task_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Still waiting to be done
    Pending,
    /// Finished
    Done,
    /// The assignee cannot do it and has said why
    CannotDo,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Done => "DONE",
            Self::CannotDo => "CANNOT_DO",
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Enum, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "task_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    Standard,
    /// Physical setup on the day of the event
    Setup,
}

impl Default for TaskType {
    fn default() -> Self {
        Self::Standard
    }
}

impl Task {
    pub(crate) fn complete(&mut self, actor_id: i64) {
        self.status = TaskStatus::Done;
        self.completed_by = Some(actor_id);
        self.cannot_do_reason = None;
    }

    pub(crate) fn block(&mut self, actor_id: i64, reason: String) {
        self.status = TaskStatus::CannotDo;
        self.completed_by = Some(actor_id);
        self.cannot_do_reason = Some(reason);
    }

    /// Puts the task back to `PENDING`, returning the status it had.
    pub(crate) fn reopen(&mut self) -> TaskStatus {
        let previous = self.status;
        self.status = TaskStatus::Pending;
        self.completed_by = None;
        self.cannot_do_reason = None;

        previous
    }

    /// Applies changes to the direct and team channels.
    ///
    /// When either channel actually changes on a task that is no longer
    /// pending, the task is reopened. Returns whether that happened.
    pub(crate) fn reassign(
        &mut self,
        assigned_to: Option<Option<i64>>,
        assigned_team_id: Option<Option<i64>>,
    ) -> bool {
        let mut changed = false;
        if let Some(assigned_to) = assigned_to {
            changed |= assigned_to != self.assigned_to;
            self.assigned_to = assigned_to;
        }
        if let Some(assigned_team_id) = assigned_team_id {
            changed |= assigned_team_id != self.assigned_team_id;
            self.assigned_team_id = assigned_team_id;
        }

        if changed && self.status != TaskStatus::Pending {
            self.reopen();
            true
        } else {
            false
        }
    }

    /// Sets a new one-shot reminder time and makes it eligible to fire again.
    pub(crate) fn reschedule_reminder(&mut self, reminder_time: Option<GqlDateTime>) {
        self.reminder_time = reminder_time;
        self.reminder_sent = false;
    }

    /// Marks the one-shot reminder sent if it is still due at `now`.
    pub(crate) fn claim_reminder(&mut self, now: OffsetDateTime) -> bool {
        let due = self.status == TaskStatus::Pending
            && !self.reminder_sent
            && self.reminder_time.map_or(false, |time| time.0 <= now);
        if due {
            self.reminder_sent = true;
        }

        due
    }

    /// Marks the automatic reminder sent if the task still needs one.
    pub(crate) fn claim_auto_reminder(&mut self) -> bool {
        let due = self.status == TaskStatus::Pending && !self.auto_reminder_sent;
        if due {
            self.auto_reminder_sent = true;
        }

        due
    }

    pub async fn mark_done(id: i64, actor: &User, store: &dyn Store) -> TrackerResult<Task> {
        let task = Self::with_id(id, store).await?;
        ensure_can_modify(&task, actor, store).await?;

        let actor_id = actor.id;
        let task = store
            .modify_task(
                id,
                db::edit(move |task| {
                    task.complete(actor_id);
                    Ok(())
                }),
            )
            .await?;

        NewAuditLog::new("TASK_DONE", "task")
            .entity(task.id, &task.title)
            .by(actor)
            .log(store)
            .await;

        Ok(task)
    }

    /// Marks the task blocked and alerts the admins in the background.
    ///
    /// The alert is never awaited, so a webhook outage cannot fail this call.
    pub async fn mark_cannot_do(
        id: i64,
        actor: &User,
        reason: &str,
        store: &dyn Store,
        notifier: Arc<dyn Notifier>,
    ) -> TrackerResult<Task> {
        let task = Self::with_id(id, store).await?;
        ensure_can_modify(&task, actor, store).await?;

        let reason = reason.trim().to_owned();
        if reason.is_empty() {
            return Err(TrackerError::validation(
                "A reason is required when a task cannot be done",
            ));
        }

        let actor_id = actor.id;
        let stored_reason = reason.clone();
        let task = store
            .modify_task(
                id,
                db::edit(move |task| {
                    task.block(actor_id, stored_reason);
                    Ok(())
                }),
            )
            .await?;

        NewAuditLog::new("TASK_CANNOT_DO", "task")
            .entity(task.id, &task.title)
            .by(actor)
            .details(format!("reason: {reason}"))
            .log(store)
            .await;

        let event_name = match store.event(task.event_id).await {
            Ok(Some(event)) => event.name,
            Ok(None) => "Unknown Event".to_owned(),
            Err(err) => {
                warn!(task_id = task.id, "Failed to load event for admin alert: {err}");
                "Unknown Event".to_owned()
            }
        };
        let display_name = actor.display_name.clone();
        let title = task.title.clone();
        tokio::spawn(async move {
            notifier
                .send_admin_alert(&display_name, &title, &event_name, &reason)
                .await;
        });

        Ok(task)
    }

    pub async fn undo(id: i64, actor: &User, store: &dyn Store) -> TrackerResult<Task> {
        let task = Self::with_id(id, store).await?;
        ensure_can_modify(&task, actor, store).await?;

        let previous = task.status;
        let task = store
            .modify_task(
                id,
                db::edit(|task| {
                    task.reopen();
                    Ok(())
                }),
            )
            .await?;

        NewAuditLog::new("TASK_UNDO", "task")
            .entity(task.id, &task.title)
            .by(actor)
            .details(format!("previous status: {}", previous.as_str()))
            .log(store)
            .await;

        Ok(task)
    }

    /// Event lookup shared by the notification paths.
    pub(crate) async fn event_name(&self, store: &dyn Store) -> TrackerResult<String> {
        Ok(Event::with_id(self.event_id, store).await?.name)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::tests::mock::mock_task;

    #[test]
    fn completing_records_who_did_it() {
        let mut task = mock_task();
        task.complete(7);

        assert_eq!(task.status, TaskStatus::Done);
        assert_eq!(task.completed_by, Some(7));
    }

    #[test]
    fn reopening_clears_resolution() {
        let mut task = mock_task();
        task.block(3, "Out of town".to_owned());

        assert_eq!(task.reopen(), TaskStatus::CannotDo);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.completed_by, None);
        assert_eq!(task.cannot_do_reason, None);
    }

    #[test]
    fn reassigning_a_done_task_reopens_it() {
        let mut task = mock_task();
        task.assigned_to = Some(1);
        task.complete(1);

        assert!(task.reassign(Some(Some(2)), None));
        assert_eq!(task.assigned_to, Some(2));
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.completed_by, None);
    }

    #[test]
    fn reassigning_to_the_same_owner_keeps_status() {
        let mut task = mock_task();
        task.assigned_to = Some(1);
        task.assigned_team_id = Some(4);
        task.complete(1);

        assert!(!task.reassign(Some(Some(1)), Some(Some(4))));
        assert_eq!(task.status, TaskStatus::Done);
        assert_eq!(task.completed_by, Some(1));
    }

    #[test]
    fn changing_the_team_of_a_blocked_task_reopens_it() {
        let mut task = mock_task();
        task.block(1, "No time".to_owned());

        assert!(task.reassign(None, Some(Some(9))));
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.cannot_do_reason, None);
    }

    #[test]
    fn reassigning_a_pending_task_is_just_a_reassignment() {
        let mut task = mock_task();

        assert!(!task.reassign(Some(Some(5)), None));
        assert_eq!(task.assigned_to, Some(5));
    }

    #[test]
    fn rescheduling_rearms_the_reminder() {
        let mut task = mock_task();
        task.reminder_sent = true;
        task.auto_reminder_sent = true;
        task.reschedule_reminder(None);

        assert!(!task.reminder_sent);
        assert!(task.auto_reminder_sent);
    }

    #[test]
    fn reminders_are_claimed_only_while_due() {
        let now = datetime!(2024-09-05 10:00 UTC);
        let mut task = mock_task();
        task.reminder_time = Some(GqlDateTime(datetime!(2024-09-05 11:00 UTC)));
        assert!(!task.claim_reminder(now));

        task.reminder_time = Some(GqlDateTime(datetime!(2024-09-05 09:00 UTC)));
        assert!(task.claim_reminder(now));
        assert!(task.reminder_sent);
        assert!(!task.claim_reminder(now));
    }

    #[test]
    fn resolved_tasks_cannot_be_claimed() {
        let mut task = mock_task();
        task.reminder_time = Some(GqlDateTime(datetime!(2024-09-05 09:00 UTC)));
        task.complete(1);

        assert!(!task.claim_reminder(datetime!(2024-09-05 10:00 UTC)));
        assert!(!task.claim_auto_reminder());
        assert!(!task.reminder_sent);
        assert!(!task.auto_reminder_sent);
    }
}
