use std::sync::Arc;

use async_graphql::{
    ComplexObject, Context, InputObject, MaybeUndefined, Result, ResultExt, SimpleObject,
};

use crate::db::{self, Store};
use crate::error::{TrackerError, TrackerResult};
use crate::models::audit::NewAuditLog;
use crate::models::event::Event;
use crate::models::member::User;
use crate::models::permissions::{can_view_task, ensure_can_modify, ensure_can_view};
use crate::models::team::Team;
use crate::models::GqlDateTime;
use crate::notify::Notifier;
use crate::util::{field_update, require_non_empty};

use self::assignment::Assignees;
pub use self::status::{TaskStatus, TaskType};

pub mod assignment;
pub mod status;

#[derive(SimpleObject, sqlx::FromRow, Clone, Debug, PartialEq, Eq)]
#[graphql(complex)]
pub struct Task {
    pub id: i64,
    pub event_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub task_type: TaskType,
    pub status: TaskStatus,
    /// The single user the task is handed to
    pub assigned_to: Option<i64>,
    /// The team whose members may all work on the task
    pub assigned_team_id: Option<i64>,
    /// Who last marked the task done or blocked
    pub completed_by: Option<i64>,
    /// Why the task cannot be done
    pub cannot_do_reason: Option<String>,
    /// When to send the one-shot reminder
    pub reminder_time: Option<GqlDateTime>,
    /// Whether the one-shot reminder has fired
    pub reminder_sent: bool,
    /// Whether the day-before reminder has fired
    pub auto_reminder_sent: bool,
    pub created_at: GqlDateTime,
}

#[ComplexObject]
impl Task {
    /// The event this task belongs to
    pub async fn event(&self, ctx: &Context<'_>) -> Result<Event> {
        Event::with_id(self.event_id, db::from_ctx(ctx)).await.extend()
    }

    /// The user the task is directly assigned to
    pub async fn assignee(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        match self.assigned_to {
            Some(user_id) => db::from_ctx(ctx).user(user_id).await.extend(),
            None => Ok(None),
        }
    }

    /// The team the task is assigned to
    pub async fn assigned_team(&self, ctx: &Context<'_>) -> Result<Option<Team>> {
        match self.assigned_team_id {
            Some(team_id) => db::from_ctx(ctx).team(team_id).await.extend(),
            None => Ok(None),
        }
    }

    /// The users in the task's assignment pool
    pub async fn pool(&self, ctx: &Context<'_>) -> Result<Vec<User>> {
        let store = db::from_ctx(ctx);
        let assignees = Assignees::for_task(self, store).await.extend()?;
        let mut users = Vec::new();
        for user_id in assignees.pool {
            users.extend(store.user(user_id).await.extend()?);
        }

        Ok(users)
    }

    /// The user who last resolved the task
    pub async fn completed_by_user(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        match self.completed_by {
            Some(user_id) => db::from_ctx(ctx).user(user_id).await.extend(),
            None => Ok(None),
        }
    }
}

/// A task about to be created. New tasks are always `PENDING`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub task_type: TaskType,
    pub assigned_to: Option<i64>,
    pub assigned_team_id: Option<i64>,
    pub pool: Vec<i64>,
    pub reminder_time: Option<GqlDateTime>,
}

impl Task {
    pub async fn with_id(id: i64, store: &dyn Store) -> TrackerResult<Self> {
        store
            .task(id)
            .await?
            .ok_or_else(|| TrackerError::not_found(format!("Task {id}")))
    }

    /// Loads a task the user is allowed to see.
    pub async fn viewable(id: i64, user: &User, store: &dyn Store) -> TrackerResult<Self> {
        let task = Self::with_id(id, store).await?;
        ensure_can_view(&task, user, store).await?;

        Ok(task)
    }

    /// The event's tasks, narrowed to the ones `user` may see.
    pub async fn for_event(event_id: i64, user: &User, store: &dyn Store) -> TrackerResult<Vec<Self>> {
        Event::with_id(event_id, store).await?;
        Self::visible_to(store.tasks(event_id).await?, user, store).await
    }

    /// Keeps the tasks that `user` reaches through any assignment channel.
    /// Admins keep everything.
    pub async fn visible_to(tasks: Vec<Self>, user: &User, store: &dyn Store) -> TrackerResult<Vec<Self>> {
        if user.is_admin() {
            return Ok(tasks);
        }

        let assignees = Assignees::for_tasks(&tasks, store).await?;
        Ok(tasks
            .into_iter()
            .filter(|task| {
                assignees
                    .get(&task.id)
                    .map_or(false, |assignees| can_view_task(user, assignees))
            })
            .collect())
    }

    /// Checks that every referenced user and team exists.
    async fn check_references(
        assigned_to: Option<i64>,
        assigned_team_id: Option<i64>,
        pool: &[i64],
        store: &dyn Store,
    ) -> TrackerResult<()> {
        for user_id in assigned_to.iter().chain(pool) {
            User::with_id(*user_id, store).await?;
        }
        if let Some(team_id) = assigned_team_id {
            Team::with_id(team_id, store).await?;
        }

        Ok(())
    }

    pub async fn create(new_task: NewTask, actor: &User, store: &dyn Store) -> TrackerResult<Self> {
        Event::with_id(new_task.event_id, store).await?;
        let pool = new_task.assigned_user_ids.unwrap_or_default();
        Self::check_references(new_task.assigned_to, new_task.assigned_team_id, &pool, store)
            .await?;

        let draft = TaskDraft {
            title: require_non_empty(&new_task.title, "Task title")?,
            description: new_task.description,
            task_type: new_task.task_type,
            assigned_to: new_task.assigned_to,
            assigned_team_id: new_task.assigned_team_id,
            pool,
            reminder_time: new_task.reminder_time,
        };
        let task = store.insert_task(new_task.event_id, draft).await?;

        NewAuditLog::new("TASK_CREATE", "task")
            .entity(task.id, &task.title)
            .by(actor)
            .log(store)
            .await;

        Ok(task)
    }

    /// Applies an admin's edit.
    ///
    /// Changing the direct or team assignee of a resolved task reopens it.
    /// Replacing the pool alone does not.
    pub async fn update(
        id: i64,
        update: TaskUpdate,
        actor: &User,
        store: &dyn Store,
    ) -> TrackerResult<Self> {
        Self::with_id(id, store).await?;

        let title = update
            .title
            .as_deref()
            .map(|title| require_non_empty(title, "Task title"))
            .transpose()?;
        let description = field_update(update.description);
        let assigned_to = field_update(update.assigned_to);
        let assigned_team_id = field_update(update.assigned_team_id);
        let reminder_time = field_update(update.reminder_time);
        let task_type = update.task_type;
        Self::check_references(
            assigned_to.flatten(),
            assigned_team_id.flatten(),
            update.assigned_user_ids.as_deref().unwrap_or_default(),
            store,
        )
        .await?;

        let task = store
            .modify_task_with_pool(
                id,
                db::edit(move |task| {
                    if let Some(title) = title {
                        task.title = title;
                    }
                    if let Some(description) = description {
                        task.description = description;
                    }
                    if let Some(task_type) = task_type {
                        task.task_type = task_type;
                    }
                    if let Some(reminder_time) = reminder_time {
                        if reminder_time != task.reminder_time {
                            task.reschedule_reminder(reminder_time);
                        }
                    }
                    task.reassign(assigned_to, assigned_team_id);

                    Ok(())
                }),
                update.assigned_user_ids,
            )
            .await?;

        NewAuditLog::new("TASK_UPDATE", "task")
            .entity(task.id, &task.title)
            .by(actor)
            .log(store)
            .await;

        Ok(task)
    }

    pub async fn delete(id: i64, actor: &User, store: &dyn Store) -> TrackerResult<()> {
        let task = Self::with_id(id, store).await?;
        store.delete_task(id).await?;

        NewAuditLog::new("TASK_DELETE", "task")
            .entity(task.id, &task.title)
            .by(actor)
            .log(store)
            .await;

        Ok(())
    }

    /// Sets or clears the one-shot reminder. Any assignee may do this.
    pub async fn set_reminder(
        id: i64,
        reminder_time: Option<GqlDateTime>,
        actor: &User,
        store: &dyn Store,
    ) -> TrackerResult<Self> {
        let task = Self::with_id(id, store).await?;
        ensure_can_modify(&task, actor, store).await?;

        store
            .modify_task(
                id,
                db::edit(move |task| {
                    task.reschedule_reminder(reminder_time);
                    Ok(())
                }),
            )
            .await
    }

    /// Pings the task's assignees right away. Leaves the reminder flags alone.
    ///
    /// Returns whether the message was delivered.
    pub async fn send_reminder_now(
        id: i64,
        message: Option<String>,
        store: &dyn Store,
        notifier: Arc<dyn Notifier>,
    ) -> TrackerResult<bool> {
        let task = Self::with_id(id, store).await?;
        let recipients = Assignees::for_task(&task, store)
            .await?
            .discord_ids(store)
            .await?;
        if recipients.is_empty() {
            return Err(TrackerError::validation(
                "No assignee of this task has a Discord ID",
            ));
        }

        let event_name = task.event_name(store).await?;
        Ok(notifier
            .send_reminder(&recipients, &task.title, &event_name, message.as_deref())
            .await)
    }
}

#[derive(InputObject)]
pub struct NewTask {
    pub event_id: i64,
    pub title: String,
    pub description: Option<String>,
    #[graphql(default_with = "TaskType::Standard")]
    pub task_type: TaskType,
    pub assigned_to: Option<i64>,
    pub assigned_team_id: Option<i64>,
    pub assigned_user_ids: Option<Vec<i64>>,
    pub reminder_time: Option<GqlDateTime>,
}

#[derive(InputObject, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: MaybeUndefined<String>,
    pub task_type: Option<TaskType>,
    pub assigned_to: MaybeUndefined<i64>,
    pub assigned_team_id: MaybeUndefined<i64>,
    /// Replaces the whole pool when given
    pub assigned_user_ids: Option<Vec<i64>>,
    pub reminder_time: MaybeUndefined<GqlDateTime>,
}
