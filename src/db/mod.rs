//! Storage for every tracked entity.
//!
//! Models never talk to a database directly; they go through [`Store`], which has
//! a PostgreSQL implementation for deployments and an in-memory one for tests.
//! Every method that touches more than one row is atomic in both implementations.

use std::sync::Arc;

use async_graphql::Context;
use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::TrackerResult;
use crate::models::audit::{AuditFilter, AuditLog, NewAuditLog};
use crate::models::comment::TaskComment;
use crate::models::event::{Event, NewEvent};
use crate::models::export::{ImportCounts, SemesterImport};
use crate::models::member::{User, UserDraft};
use crate::models::semester::{NewSemester, Semester};
use crate::models::task::assignment::TaskAssignment;
use crate::models::task::{Task, TaskDraft};
use crate::models::team::Team;
use crate::models::template::{
    EventTemplateDraft, EventTemplateRecord, WeekTemplateDraft, WeekTemplateRecord,
};
use crate::models::week::{NewWeek, Week};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// An in-place edit applied to a task while it is locked for writing.
///
/// Returning an error leaves the stored task untouched.
pub type TaskEdit = Box<dyn FnOnce(&mut Task) -> TrackerResult<()> + Send>;

pub fn edit(f: impl FnOnce(&mut Task) -> TrackerResult<()> + Send + 'static) -> TaskEdit {
    Box::new(f)
}

/// The store attached to a GraphQL request.
pub fn from_ctx<'a>(ctx: &'a Context<'_>) -> &'a dyn Store {
    ctx.data_unchecked::<Arc<dyn Store>>().as_ref()
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn user(&self, id: i64) -> TrackerResult<Option<User>>;
    async fn user_by_username(&self, username: &str) -> TrackerResult<Option<User>>;
    /// All users ordered by display name.
    async fn users(&self) -> TrackerResult<Vec<User>>;
    async fn team_members(&self, team_id: i64) -> TrackerResult<Vec<User>>;
    /// Fails with `Conflict` when the username is taken.
    async fn insert_user(&self, user: UserDraft) -> TrackerResult<User>;
    async fn save_user(&self, user: &User) -> TrackerResult<()>;
    /// Also removes the user's sessions, roster rows, pool rows and comments,
    /// and clears any task assignment or completion that points at them.
    async fn delete_user(&self, id: i64) -> TrackerResult<()>;

    async fn session_user(&self, token: &str) -> TrackerResult<Option<User>>;
    async fn session_token(&self, user_id: i64) -> TrackerResult<Option<String>>;
    async fn insert_session(&self, user_id: i64, token: &str) -> TrackerResult<()>;
    async fn remove_sessions(&self, user_id: i64) -> TrackerResult<()>;

    async fn team(&self, id: i64) -> TrackerResult<Option<Team>>;
    /// Case-insensitive lookup.
    async fn team_by_name(&self, name: &str) -> TrackerResult<Option<Team>>;
    async fn teams(&self) -> TrackerResult<Vec<Team>>;
    async fn insert_team(&self, name: &str, color: &str) -> TrackerResult<Team>;
    async fn save_team(&self, team: &Team) -> TrackerResult<()>;
    /// Nulls `team_id` on every member and on every task assigned to the team
    /// in the same transaction as the delete.
    async fn delete_team(&self, id: i64) -> TrackerResult<()>;

    async fn semester(&self, id: i64) -> TrackerResult<Option<Semester>>;
    async fn semester_by_name(&self, name: &str) -> TrackerResult<Option<Semester>>;
    async fn active_semester(&self) -> TrackerResult<Option<Semester>>;
    /// All semesters, newest first.
    async fn semesters(&self) -> TrackerResult<Vec<Semester>>;
    /// Deactivates every other semester in the same transaction when the new
    /// one is active.
    async fn insert_semester(&self, semester: &NewSemester) -> TrackerResult<Semester>;
    /// Same single-active rule as [`Store::insert_semester`].
    async fn save_semester(&self, semester: &Semester) -> TrackerResult<()>;
    async fn delete_semester(&self, id: i64) -> TrackerResult<()>;

    async fn week(&self, id: i64) -> TrackerResult<Option<Week>>;
    /// Weeks of a semester ordered by week number.
    async fn weeks(&self, semester_id: i64) -> TrackerResult<Vec<Week>>;
    /// Fails with `Conflict` when the semester already has this week number.
    async fn insert_week(&self, week: &NewWeek) -> TrackerResult<Week>;
    async fn save_week(&self, week: &Week) -> TrackerResult<()>;
    async fn delete_week(&self, id: i64) -> TrackerResult<()>;

    async fn event(&self, id: i64) -> TrackerResult<Option<Event>>;
    /// Events of a week ordered by start time.
    async fn events(&self, week_id: i64) -> TrackerResult<Vec<Event>>;
    /// Events starting in `[from, to]`.
    async fn events_between(
        &self,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> TrackerResult<Vec<Event>>;
    /// Creates the event and all of its tasks, or nothing at all.
    async fn insert_event(&self, event: &NewEvent, tasks: Vec<TaskDraft>)
        -> TrackerResult<Event>;
    /// Creates several events with their tasks in a single transaction.
    async fn insert_events(
        &self,
        events: Vec<(NewEvent, Vec<TaskDraft>)>,
    ) -> TrackerResult<Vec<Event>>;
    async fn save_event(&self, event: &Event) -> TrackerResult<()>;
    async fn delete_event(&self, id: i64) -> TrackerResult<()>;

    async fn task(&self, id: i64) -> TrackerResult<Option<Task>>;
    async fn tasks(&self, event_id: i64) -> TrackerResult<Vec<Task>>;
    async fn all_tasks(&self) -> TrackerResult<Vec<Task>>;
    /// Pending tasks whose one-shot reminder time has passed and has not fired.
    async fn tasks_with_reminder_due(&self, now: OffsetDateTime) -> TrackerResult<Vec<Task>>;
    async fn insert_task(&self, event_id: i64, task: TaskDraft) -> TrackerResult<Task>;
    /// Locks the task, applies `edit` and writes the result back, all in one
    /// transaction. Fails with `NotFound` if the task does not exist.
    async fn modify_task(&self, id: i64, edit: TaskEdit) -> TrackerResult<Task> {
        self.modify_task_with_pool(id, edit, None).await
    }
    /// Same as [`Store::modify_task`], also replacing the task's pool with
    /// exactly `pool` when given, under the same lock.
    async fn modify_task_with_pool(
        &self,
        id: i64,
        edit: TaskEdit,
        pool: Option<Vec<i64>>,
    ) -> TrackerResult<Task>;
    async fn delete_task(&self, id: i64) -> TrackerResult<()>;

    async fn pool_assignments(&self, task_ids: &[i64]) -> TrackerResult<Vec<TaskAssignment>>;

    async fn roster(&self, semester_id: i64) -> TrackerResult<Vec<User>>;
    async fn on_roster(&self, semester_id: i64, user_id: i64) -> TrackerResult<bool>;
    /// Returns `false` if the user was already on the roster.
    async fn add_to_roster(&self, semester_id: i64, user_id: i64) -> TrackerResult<bool>;
    /// Returns `false` if the user was not on the roster.
    async fn remove_from_roster(&self, semester_id: i64, user_id: i64) -> TrackerResult<bool>;

    async fn comment(&self, id: i64) -> TrackerResult<Option<TaskComment>>;
    /// Comments on a task, oldest first.
    async fn comments(&self, task_id: i64) -> TrackerResult<Vec<TaskComment>>;
    async fn insert_comment(
        &self,
        task_id: i64,
        user_id: i64,
        content: &str,
    ) -> TrackerResult<TaskComment>;
    async fn delete_comment(&self, id: i64) -> TrackerResult<()>;

    async fn insert_audit_log(&self, entry: &NewAuditLog) -> TrackerResult<()>;
    /// One page of matching logs, newest first, with the total match count.
    async fn audit_logs(
        &self,
        filter: &AuditFilter,
        offset: i64,
        limit: i64,
    ) -> TrackerResult<(Vec<AuditLog>, i64)>;
    async fn audit_actions(&self) -> TrackerResult<Vec<String>>;
    async fn audit_entity_types(&self) -> TrackerResult<Vec<String>>;

    async fn event_template_records(&self) -> TrackerResult<Vec<EventTemplateRecord>>;
    async fn insert_event_template(
        &self,
        template: &EventTemplateDraft,
    ) -> TrackerResult<EventTemplateRecord>;
    async fn save_event_template(&self, template: &EventTemplateRecord) -> TrackerResult<()>;
    async fn delete_event_template(&self, id: i64) -> TrackerResult<()>;
    async fn week_template_records(&self) -> TrackerResult<Vec<WeekTemplateRecord>>;
    async fn insert_week_template(
        &self,
        template: &WeekTemplateDraft,
    ) -> TrackerResult<WeekTemplateRecord>;
    async fn delete_week_template(&self, id: i64) -> TrackerResult<()>;

    /// Creates a whole semester tree in one transaction. The semester is never
    /// activated. Fails with `Conflict` if the name is taken.
    async fn import_semester(&self, semester: &SemesterImport) -> TrackerResult<ImportCounts>;
}
