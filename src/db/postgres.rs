//! The PostgreSQL [`Store`] used in deployments.

use anyhow::Context;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use tracing::info;

use crate::db::{Store, TaskEdit};
use crate::error::{TrackerError, TrackerResult};
use crate::models::audit::{AuditFilter, AuditLog, NewAuditLog};
use crate::models::comment::TaskComment;
use crate::models::event::{Event, NewEvent};
use crate::models::export::{ImportCounts, SemesterImport};
use crate::models::member::{User, UserDraft};
use crate::models::semester::{NewSemester, Semester};
use crate::models::task::assignment::TaskAssignment;
use crate::models::task::{Task, TaskDraft, TaskStatus};
use crate::models::team::Team;
use crate::models::template::{
    EventTemplateDraft, EventTemplateRecord, WeekTemplateDraft, WeekTemplateRecord,
};
use crate::models::week::{NewWeek, Week};
use crate::models::{GqlDate, GqlDateTime};

pub const MAX_CONNECTIONS: u32 = 5;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects to the database and brings its schema up to date.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await
            .context("Failed to connect to the database")?;

        sqlx::migrate!()
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;
        info!("Database is up to date");

        Ok(Self { pool })
    }

    async fn insert_event_in(
        tx: &mut Transaction<'_, Postgres>,
        event: &NewEvent,
    ) -> TrackerResult<Event> {
        Ok(sqlx::query_as(
            "INSERT INTO events (week_id, name, datetime, location)
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(event.week_id)
        .bind(&event.name)
        .bind(event.datetime)
        .bind(&event.location)
        .fetch_one(&mut *tx)
        .await?)
    }

    async fn insert_task_in(
        tx: &mut Transaction<'_, Postgres>,
        event_id: i64,
        draft: &TaskDraft,
    ) -> TrackerResult<Task> {
        let task: Task = sqlx::query_as(
            "INSERT INTO tasks (event_id, title, description, task_type, assigned_to,
                                assigned_team_id, reminder_time)
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(event_id)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.task_type)
        .bind(draft.assigned_to)
        .bind(draft.assigned_team_id)
        .bind(draft.reminder_time)
        .fetch_one(&mut *tx)
        .await?;

        for user_id in &draft.pool {
            sqlx::query(
                "INSERT INTO task_assignments (task_id, user_id) VALUES ($1, $2)
                 ON CONFLICT DO NOTHING",
            )
            .bind(task.id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        Ok(task)
    }

    /// Serializes activations so two semesters can never end up active.
    async fn deactivate_semesters_except(
        tx: &mut Transaction<'_, Postgres>,
        id: Option<i64>,
    ) -> TrackerResult<()> {
        sqlx::query("LOCK TABLE semesters IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE semesters SET is_active = FALSE WHERE is_active AND id IS DISTINCT FROM $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn user(&self, id: i64) -> TrackerResult<Option<User>> {
        Ok(sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn user_by_username(&self, username: &str) -> TrackerResult<Option<User>> {
        Ok(sqlx::query_as("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn users(&self) -> TrackerResult<Vec<User>> {
        Ok(sqlx::query_as("SELECT * FROM users ORDER BY display_name, id")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn team_members(&self, team_id: i64) -> TrackerResult<Vec<User>> {
        Ok(
            sqlx::query_as("SELECT * FROM users WHERE team_id = $1 ORDER BY display_name, id")
                .bind(team_id)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn insert_user(&self, user: UserDraft) -> TrackerResult<User> {
        Ok(sqlx::query_as(
            "INSERT INTO users (username, display_name, discord_id, role, team_id, password_hash)
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(user.username)
        .bind(user.display_name)
        .bind(user.discord_id)
        .bind(user.role)
        .bind(user.team_id)
        .bind(user.password_hash)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn save_user(&self, user: &User) -> TrackerResult<()> {
        sqlx::query(
            "UPDATE users SET username = $1, display_name = $2, discord_id = $3, role = $4,
                              team_id = $5, password_hash = $6
             WHERE id = $7",
        )
        .bind(&user.username)
        .bind(&user.display_name)
        .bind(&user.discord_id)
        .bind(user.role)
        .bind(user.team_id)
        .bind(&user.password_hash)
        .bind(user.id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_user(&self, id: i64) -> TrackerResult<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn session_user(&self, token: &str) -> TrackerResult<Option<User>> {
        Ok(sqlx::query_as(
            "SELECT users.* FROM users
             INNER JOIN sessions ON sessions.user_id = users.id
             WHERE sessions.token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn session_token(&self, user_id: i64) -> TrackerResult<Option<String>> {
        Ok(sqlx::query_scalar("SELECT token FROM sessions WHERE user_id = $1 LIMIT 1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_session(&self, user_id: i64, token: &str) -> TrackerResult<()> {
        sqlx::query("INSERT INTO sessions (user_id, token) VALUES ($1, $2)")
            .bind(user_id)
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn remove_sessions(&self, user_id: i64) -> TrackerResult<()> {
        sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn team(&self, id: i64) -> TrackerResult<Option<Team>> {
        Ok(sqlx::query_as("SELECT * FROM teams WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn team_by_name(&self, name: &str) -> TrackerResult<Option<Team>> {
        Ok(sqlx::query_as("SELECT * FROM teams WHERE LOWER(name) = LOWER($1)")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn teams(&self) -> TrackerResult<Vec<Team>> {
        Ok(sqlx::query_as("SELECT * FROM teams ORDER BY name")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn insert_team(&self, name: &str, color: &str) -> TrackerResult<Team> {
        Ok(
            sqlx::query_as("INSERT INTO teams (name, color) VALUES ($1, $2) RETURNING *")
                .bind(name)
                .bind(color)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn save_team(&self, team: &Team) -> TrackerResult<()> {
        sqlx::query("UPDATE teams SET name = $1, color = $2 WHERE id = $3")
            .bind(&team.name)
            .bind(&team.color)
            .bind(team.id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_team(&self, id: i64) -> TrackerResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE users SET team_id = NULL WHERE team_id = $1")
            .bind(id)
            .execute(&mut tx)
            .await?;
        sqlx::query("UPDATE tasks SET assigned_team_id = NULL WHERE assigned_team_id = $1")
            .bind(id)
            .execute(&mut tx)
            .await?;
        sqlx::query("DELETE FROM teams WHERE id = $1")
            .bind(id)
            .execute(&mut tx)
            .await?;
        tx.commit().await?;

        Ok(())
    }

    async fn semester(&self, id: i64) -> TrackerResult<Option<Semester>> {
        Ok(sqlx::query_as("SELECT * FROM semesters WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn semester_by_name(&self, name: &str) -> TrackerResult<Option<Semester>> {
        Ok(sqlx::query_as("SELECT * FROM semesters WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn active_semester(&self) -> TrackerResult<Option<Semester>> {
        Ok(sqlx::query_as("SELECT * FROM semesters WHERE is_active")
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn semesters(&self) -> TrackerResult<Vec<Semester>> {
        Ok(
            sqlx::query_as("SELECT * FROM semesters ORDER BY start_date DESC, id DESC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn insert_semester(&self, semester: &NewSemester) -> TrackerResult<Semester> {
        let mut tx = self.pool.begin().await?;
        if semester.is_active {
            Self::deactivate_semesters_except(&mut tx, None).await?;
        }

        let semester = sqlx::query_as(
            "INSERT INTO semesters (name, start_date, end_date, is_active)
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(&semester.name)
        .bind(semester.start_date)
        .bind(semester.end_date)
        .bind(semester.is_active)
        .fetch_one(&mut tx)
        .await?;
        tx.commit().await?;

        Ok(semester)
    }

    async fn save_semester(&self, semester: &Semester) -> TrackerResult<()> {
        let mut tx = self.pool.begin().await?;
        if semester.is_active {
            Self::deactivate_semesters_except(&mut tx, Some(semester.id)).await?;
        }

        sqlx::query(
            "UPDATE semesters SET name = $1, start_date = $2, end_date = $3, is_active = $4
             WHERE id = $5",
        )
        .bind(&semester.name)
        .bind(semester.start_date)
        .bind(semester.end_date)
        .bind(semester.is_active)
        .bind(semester.id)
        .execute(&mut tx)
        .await?;
        tx.commit().await?;

        Ok(())
    }

    async fn delete_semester(&self, id: i64) -> TrackerResult<()> {
        sqlx::query("DELETE FROM semesters WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn week(&self, id: i64) -> TrackerResult<Option<Week>> {
        Ok(sqlx::query_as("SELECT * FROM weeks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn weeks(&self, semester_id: i64) -> TrackerResult<Vec<Week>> {
        Ok(
            sqlx::query_as("SELECT * FROM weeks WHERE semester_id = $1 ORDER BY week_number")
                .bind(semester_id)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn insert_week(&self, week: &NewWeek) -> TrackerResult<Week> {
        Ok(sqlx::query_as(
            "INSERT INTO weeks (semester_id, week_number, start_date, end_date)
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(week.semester_id)
        .bind(week.week_number)
        .bind(week.start_date)
        .bind(week.end_date)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn save_week(&self, week: &Week) -> TrackerResult<()> {
        sqlx::query(
            "UPDATE weeks SET week_number = $1, start_date = $2, end_date = $3 WHERE id = $4",
        )
        .bind(week.week_number)
        .bind(week.start_date)
        .bind(week.end_date)
        .bind(week.id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_week(&self, id: i64) -> TrackerResult<()> {
        sqlx::query("DELETE FROM weeks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn event(&self, id: i64) -> TrackerResult<Option<Event>> {
        Ok(sqlx::query_as("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn events(&self, week_id: i64) -> TrackerResult<Vec<Event>> {
        Ok(
            sqlx::query_as("SELECT * FROM events WHERE week_id = $1 ORDER BY datetime, id")
                .bind(week_id)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn events_between(
        &self,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> TrackerResult<Vec<Event>> {
        Ok(sqlx::query_as(
            "SELECT * FROM events WHERE datetime BETWEEN $1 AND $2 ORDER BY datetime, id",
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_event(&self, event: &NewEvent, tasks: Vec<TaskDraft>) -> TrackerResult<Event> {
        let mut tx = self.pool.begin().await?;
        let event = Self::insert_event_in(&mut tx, event).await?;
        for task in &tasks {
            Self::insert_task_in(&mut tx, event.id, task).await?;
        }
        tx.commit().await?;

        Ok(event)
    }

    async fn insert_events(
        &self,
        events: Vec<(NewEvent, Vec<TaskDraft>)>,
    ) -> TrackerResult<Vec<Event>> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(events.len());
        for (event, tasks) in &events {
            let event = Self::insert_event_in(&mut tx, event).await?;
            for task in tasks {
                Self::insert_task_in(&mut tx, event.id, task).await?;
            }
            created.push(event);
        }
        tx.commit().await?;

        Ok(created)
    }

    async fn save_event(&self, event: &Event) -> TrackerResult<()> {
        sqlx::query(
            "UPDATE events SET week_id = $1, name = $2, datetime = $3, location = $4
             WHERE id = $5",
        )
        .bind(event.week_id)
        .bind(&event.name)
        .bind(event.datetime)
        .bind(&event.location)
        .bind(event.id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_event(&self, id: i64) -> TrackerResult<()> {
        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn task(&self, id: i64) -> TrackerResult<Option<Task>> {
        Ok(sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn tasks(&self, event_id: i64) -> TrackerResult<Vec<Task>> {
        Ok(
            sqlx::query_as("SELECT * FROM tasks WHERE event_id = $1 ORDER BY id")
                .bind(event_id)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn all_tasks(&self) -> TrackerResult<Vec<Task>> {
        Ok(sqlx::query_as("SELECT * FROM tasks ORDER BY id")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn tasks_with_reminder_due(&self, now: OffsetDateTime) -> TrackerResult<Vec<Task>> {
        Ok(sqlx::query_as(
            "SELECT * FROM tasks
             WHERE reminder_time <= $1 AND NOT reminder_sent AND status = $2
             ORDER BY reminder_time, id",
        )
        .bind(now)
        .bind(TaskStatus::Pending)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_task(&self, event_id: i64, task: TaskDraft) -> TrackerResult<Task> {
        let mut tx = self.pool.begin().await?;
        let task = Self::insert_task_in(&mut tx, event_id, &task).await?;
        tx.commit().await?;

        Ok(task)
    }

    async fn modify_task_with_pool(
        &self,
        id: i64,
        edit: TaskEdit,
        pool: Option<Vec<i64>>,
    ) -> TrackerResult<Task> {
        let mut tx = self.pool.begin().await?;
        let mut task: Task = sqlx::query_as("SELECT * FROM tasks WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut tx)
            .await?
            .ok_or_else(|| TrackerError::not_found(format!("Task {id}")))?;

        edit(&mut task)?;

        sqlx::query(
            "UPDATE tasks SET title = $1, description = $2, task_type = $3, status = $4,
                              assigned_to = $5, assigned_team_id = $6, completed_by = $7,
                              cannot_do_reason = $8, reminder_time = $9, reminder_sent = $10,
                              auto_reminder_sent = $11
             WHERE id = $12",
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.task_type)
        .bind(task.status)
        .bind(task.assigned_to)
        .bind(task.assigned_team_id)
        .bind(task.completed_by)
        .bind(&task.cannot_do_reason)
        .bind(task.reminder_time)
        .bind(task.reminder_sent)
        .bind(task.auto_reminder_sent)
        .bind(task.id)
        .execute(&mut tx)
        .await?;

        if let Some(user_ids) = pool {
            sqlx::query("DELETE FROM task_assignments WHERE task_id = $1")
                .bind(id)
                .execute(&mut tx)
                .await?;
            sqlx::query(
                "INSERT INTO task_assignments (task_id, user_id)
                 SELECT $1, user_id FROM UNNEST($2::BIGINT[]) AS user_id
                 ON CONFLICT DO NOTHING",
            )
            .bind(id)
            .bind(&user_ids)
            .execute(&mut tx)
            .await?;
        }
        tx.commit().await?;

        Ok(task)
    }

    async fn delete_task(&self, id: i64) -> TrackerResult<()> {
        sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn pool_assignments(&self, task_ids: &[i64]) -> TrackerResult<Vec<TaskAssignment>> {
        Ok(sqlx::query_as(
            "SELECT task_id, user_id FROM task_assignments WHERE task_id = ANY($1)
             ORDER BY task_id, user_id",
        )
        .bind(task_ids)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn roster(&self, semester_id: i64) -> TrackerResult<Vec<User>> {
        Ok(sqlx::query_as(
            "SELECT users.* FROM users
             INNER JOIN roster_members ON roster_members.user_id = users.id
             WHERE roster_members.semester_id = $1
             ORDER BY users.display_name, users.id",
        )
        .bind(semester_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn on_roster(&self, semester_id: i64, user_id: i64) -> TrackerResult<bool> {
        Ok(sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM roster_members WHERE semester_id = $1 AND user_id = $2)",
        )
        .bind(semester_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn add_to_roster(&self, semester_id: i64, user_id: i64) -> TrackerResult<bool> {
        let result = sqlx::query(
            "INSERT INTO roster_members (semester_id, user_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(semester_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_from_roster(&self, semester_id: i64, user_id: i64) -> TrackerResult<bool> {
        let result =
            sqlx::query("DELETE FROM roster_members WHERE semester_id = $1 AND user_id = $2")
                .bind(semester_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn comment(&self, id: i64) -> TrackerResult<Option<TaskComment>> {
        Ok(sqlx::query_as("SELECT * FROM task_comments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn comments(&self, task_id: i64) -> TrackerResult<Vec<TaskComment>> {
        Ok(sqlx::query_as(
            "SELECT * FROM task_comments WHERE task_id = $1 ORDER BY created_at, id",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_comment(
        &self,
        task_id: i64,
        user_id: i64,
        content: &str,
    ) -> TrackerResult<TaskComment> {
        Ok(sqlx::query_as(
            "INSERT INTO task_comments (task_id, user_id, content) VALUES ($1, $2, $3)
             RETURNING *",
        )
        .bind(task_id)
        .bind(user_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn delete_comment(&self, id: i64) -> TrackerResult<()> {
        sqlx::query("DELETE FROM task_comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn insert_audit_log(&self, entry: &NewAuditLog) -> TrackerResult<()> {
        sqlx::query(
            "INSERT INTO audit_logs (user_id, action, entity_type, entity_id, entity_name, details)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entry.user_id)
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.entity_name)
        .bind(&entry.details)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn audit_logs(
        &self,
        filter: &AuditFilter,
        offset: i64,
        limit: i64,
    ) -> TrackerResult<(Vec<AuditLog>, i64)> {
        const MATCHES: &str = "($1::TEXT IS NULL OR action = $1)
             AND ($2::TEXT IS NULL OR entity_type = $2)
             AND ($3::BIGINT IS NULL OR user_id = $3)";

        let total = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM audit_logs WHERE {MATCHES}"))
            .bind(&filter.action)
            .bind(&filter.entity_type)
            .bind(filter.user_id)
            .fetch_one(&self.pool)
            .await?;
        let logs = sqlx::query_as(&format!(
            "SELECT * FROM audit_logs WHERE {MATCHES}
             ORDER BY created_at DESC, id DESC OFFSET $4 LIMIT $5"
        ))
        .bind(&filter.action)
        .bind(&filter.entity_type)
        .bind(filter.user_id)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok((logs, total))
    }

    async fn audit_actions(&self) -> TrackerResult<Vec<String>> {
        Ok(
            sqlx::query_scalar("SELECT DISTINCT action FROM audit_logs ORDER BY action")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn audit_entity_types(&self) -> TrackerResult<Vec<String>> {
        Ok(sqlx::query_scalar(
            "SELECT DISTINCT entity_type FROM audit_logs ORDER BY entity_type",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn event_template_records(&self) -> TrackerResult<Vec<EventTemplateRecord>> {
        Ok(sqlx::query_as("SELECT * FROM event_templates ORDER BY id")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn insert_event_template(
        &self,
        template: &EventTemplateDraft,
    ) -> TrackerResult<EventTemplateRecord> {
        Ok(sqlx::query_as(
            "INSERT INTO event_templates (name, default_location, tasks, overrides)
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(&template.name)
        .bind(&template.default_location)
        .bind(Json(&template.tasks))
        .bind(&template.overrides)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn save_event_template(&self, template: &EventTemplateRecord) -> TrackerResult<()> {
        sqlx::query(
            "UPDATE event_templates SET name = $1, default_location = $2, tasks = $3
             WHERE id = $4",
        )
        .bind(&template.name)
        .bind(&template.default_location)
        .bind(&template.tasks)
        .bind(template.id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_event_template(&self, id: i64) -> TrackerResult<()> {
        sqlx::query("DELETE FROM event_templates WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn week_template_records(&self) -> TrackerResult<Vec<WeekTemplateRecord>> {
        Ok(sqlx::query_as("SELECT * FROM week_templates ORDER BY id")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn insert_week_template(
        &self,
        template: &WeekTemplateDraft,
    ) -> TrackerResult<WeekTemplateRecord> {
        Ok(sqlx::query_as(
            "INSERT INTO week_templates (name, description, entries) VALUES ($1, $2, $3)
             RETURNING *",
        )
        .bind(&template.name)
        .bind(&template.description)
        .bind(Json(&template.entries))
        .fetch_one(&self.pool)
        .await?)
    }

    async fn delete_week_template(&self, id: i64) -> TrackerResult<()> {
        sqlx::query("DELETE FROM week_templates WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn import_semester(&self, semester: &SemesterImport) -> TrackerResult<ImportCounts> {
        let mut tx = self.pool.begin().await?;
        let semester_id: i64 = sqlx::query_scalar(
            "INSERT INTO semesters (name, start_date, end_date, is_active)
             VALUES ($1, $2, $3, FALSE) RETURNING id",
        )
        .bind(&semester.name)
        .bind(GqlDate(semester.start_date))
        .bind(GqlDate(semester.end_date))
        .fetch_one(&mut tx)
        .await?;

        sqlx::query(
            "INSERT INTO roster_members (semester_id, user_id)
             SELECT $1, user_id FROM UNNEST($2::BIGINT[]) AS user_id
             ON CONFLICT DO NOTHING",
        )
        .bind(semester_id)
        .bind(&semester.roster)
        .execute(&mut tx)
        .await?;

        let mut counts = ImportCounts::default();
        for week in &semester.weeks {
            let week_id: i64 = sqlx::query_scalar(
                "INSERT INTO weeks (semester_id, week_number, start_date, end_date)
                 VALUES ($1, $2, $3, $4) RETURNING id",
            )
            .bind(semester_id)
            .bind(week.week_number)
            .bind(GqlDate(week.start_date))
            .bind(GqlDate(week.end_date))
            .fetch_one(&mut tx)
            .await?;
            counts.weeks += 1;

            for event in &week.events {
                let new_event = NewEvent {
                    week_id,
                    name: event.name.clone(),
                    datetime: GqlDateTime(event.datetime),
                    location: event.location.clone(),
                };
                let event_id = Self::insert_event_in(&mut tx, &new_event).await?.id;
                counts.events += 1;

                for task in &event.tasks {
                    let inserted = Self::insert_task_in(&mut tx, event_id, &task.draft).await?;
                    sqlx::query(
                        "UPDATE tasks SET status = $1, completed_by = $2, cannot_do_reason = $3
                         WHERE id = $4",
                    )
                    .bind(task.status)
                    .bind(task.completed_by)
                    .bind(&task.cannot_do_reason)
                    .bind(inserted.id)
                    .execute(&mut tx)
                    .await?;
                    counts.tasks += 1;
                }
            }
        }
        tx.commit().await?;

        Ok(counts)
    }
}
