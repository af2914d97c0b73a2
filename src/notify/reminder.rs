//! The periodic reminder scans.
//!
//! Two reminders can fire for a pending task. The one-shot reminder fires once
//! its `reminder_time` passes and is marked sent even when nobody could be
//! pinged. The automatic reminder fires during the day before the event and
//! is only marked sent once someone was actually pinged, so a task that gains
//! an assignee later still gets it.
//!
//! Both flags are set under the task's lock before the message goes out, so a
//! task resolved or rescheduled while an earlier message was sending is left
//! alone. A message that could not be delivered clears its flag again.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use time::{Duration, OffsetDateTime};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::db::{self, Store};
use crate::error::{TrackerError, TrackerResult};
use crate::models::task::assignment::Assignees;
use crate::models::task::{Task, TaskStatus};
use crate::notify::Notifier;
use crate::util::current_time;

/// How far ahead of an event the automatic reminder fires.
pub const AUTO_REMINDER_WINDOW: Duration = Duration::hours(24);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReminderScan {
    /// Reminders admins scheduled for a specific time
    OneShot,
    /// The day-before reminder for every pending task
    Auto,
}

impl ReminderScan {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OneShot => "one-shot",
            Self::Auto => "auto",
        }
    }

    /// Runs one scan, returning how many tasks had a reminder fire.
    pub async fn run(
        &self,
        now: OffsetDateTime,
        store: &dyn Store,
        notifier: &dyn Notifier,
    ) -> TrackerResult<usize> {
        match self {
            Self::OneShot => send_due_reminders(now, store, notifier).await,
            Self::Auto => send_auto_reminders(now, store, notifier).await,
        }
    }
}

async fn recipients_and_event(task: &Task, store: &dyn Store) -> TrackerResult<(Vec<String>, String)> {
    let recipients = Assignees::for_task(task, store)
        .await?
        .discord_ids(store)
        .await?;
    let event_name = store
        .event(task.event_id)
        .await?
        .map(|event| event.name)
        .unwrap_or_else(|| "Unknown Event".to_owned());

    Ok((recipients, event_name))
}

/// Sets a reminder flag under the task's lock before anything is sent.
///
/// `owed` sees the task as currently stored and returns whether the reminder
/// is still owed. Returns `None` when it is not, or when the task is gone.
async fn claim(
    task_id: i64,
    owed: impl FnOnce(&mut Task) -> bool + Send + 'static,
    store: &dyn Store,
) -> TrackerResult<Option<Task>> {
    let claimed = store
        .modify_task(
            task_id,
            db::edit(move |task| {
                if owed(task) {
                    Ok(())
                } else {
                    Err(TrackerError::conflict("Reminder is no longer due"))
                }
            }),
        )
        .await;

    match claimed {
        Ok(task) => Ok(Some(task)),
        Err(TrackerError::Conflict(_) | TrackerError::NotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Hands a claimed reminder back so a later scan can retry it.
async fn release(task_id: i64, unset: impl FnOnce(&mut Task) + Send + 'static, store: &dyn Store) {
    let released = store
        .modify_task(
            task_id,
            db::edit(move |task| {
                unset(task);
                Ok(())
            }),
        )
        .await;

    match released {
        Ok(_) | Err(TrackerError::NotFound(_)) => {}
        Err(err) => error!(task_id, "Failed to release reminder claim: {err}"),
    }
}

/// Fires every one-shot reminder whose time has come.
pub async fn send_due_reminders(
    now: OffsetDateTime,
    store: &dyn Store,
    notifier: &dyn Notifier,
) -> TrackerResult<usize> {
    let mut fired = 0;

    for due in store.tasks_with_reminder_due(now).await? {
        let task = match claim(due.id, move |task| task.claim_reminder(now), store).await? {
            Some(task) => task,
            None => continue,
        };

        let (recipients, event_name) = recipients_and_event(&task, store).await?;
        if recipients.is_empty() {
            warn!(task_id = task.id, "No assignee of task has a Discord ID, marking reminder sent");
        } else if !notifier
            .send_reminder(&recipients, &task.title, &event_name, None)
            .await
        {
            let reminder_time = task.reminder_time;
            release(
                task.id,
                move |task| {
                    if task.reminder_time == reminder_time {
                        task.reminder_sent = false;
                    }
                },
                store,
            )
            .await;
            warn!(task_id = task.id, "Reminder was not delivered, will retry");
            continue;
        }

        info!(task_id = task.id, recipients = recipients.len(), "Sent reminder for task {:?}", task.title);
        fired += 1;
    }

    Ok(fired)
}

/// Fires the automatic reminder for pending tasks of events starting within
/// the next day.
pub async fn send_auto_reminders(
    now: OffsetDateTime,
    store: &dyn Store,
    notifier: &dyn Notifier,
) -> TrackerResult<usize> {
    let mut fired = 0;

    for event in store.events_between(now, now + AUTO_REMINDER_WINDOW).await? {
        for pending in store.tasks(event.id).await? {
            if pending.status != TaskStatus::Pending || pending.auto_reminder_sent {
                continue;
            }
            let task = match claim(pending.id, Task::claim_auto_reminder, store).await? {
                Some(task) => task,
                None => continue,
            };

            let recipients = Assignees::for_task(&task, store)
                .await?
                .discord_ids(store)
                .await?;
            let delivered = !recipients.is_empty()
                && notifier
                    .send_reminder(&recipients, &task.title, &event.name, None)
                    .await;
            if !delivered {
                release(task.id, |task| task.auto_reminder_sent = false, store).await;
                continue;
            }

            info!(task_id = task.id, recipients = recipients.len(), "Sent automatic reminder for task {:?}", task.title);
            fired += 1;
        }
    }

    Ok(fired)
}

/// Runs `scan` every `period` forever.
///
/// Each tick runs in its own task so that an error or a panic is logged and
/// the next tick still happens.
pub async fn run_reminder_loop(
    scan: ReminderScan,
    period: StdDuration,
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
) {
    let mut interval = interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(scan = scan.name(), "Checking reminders every {}s", period.as_secs());

    loop {
        interval.tick().await;

        let store = store.clone();
        let notifier = notifier.clone();
        let tick = tokio::spawn(async move {
            scan.run(current_time(), store.as_ref(), notifier.as_ref())
                .await
        });

        match tick.await {
            Ok(Ok(0)) => {}
            Ok(Ok(fired)) => info!(scan = scan.name(), fired, "Reminder scan finished"),
            Ok(Err(err)) => error!(scan = scan.name(), "Reminder scan failed: {err}"),
            Err(err) => error!(scan = scan.name(), "Reminder scan panicked: {err}"),
        }
    }
}
