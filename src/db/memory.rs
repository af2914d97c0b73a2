//! A [`Store`] kept entirely in process memory.
//!
//! Multi-row writes are staged on a copy of the tables and swapped in only
//! when every step succeeds, which gives them the same all-or-nothing
//! behavior as a database transaction.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use sqlx::types::Json;
use time::OffsetDateTime;
use tokio::sync::Mutex;

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
use crate::util::{current_time, same_name};

#[derive(Clone, Default)]
struct Tables {
    last_id: i64,
    users: BTreeMap<i64, User>,
    sessions: Vec<(i64, String)>,
    teams: BTreeMap<i64, Team>,
    semesters: BTreeMap<i64, Semester>,
    weeks: BTreeMap<i64, Week>,
    events: BTreeMap<i64, Event>,
    tasks: BTreeMap<i64, Task>,
    pool: BTreeSet<(i64, i64)>,
    roster: BTreeSet<(i64, i64)>,
    comments: BTreeMap<i64, TaskComment>,
    audit_logs: BTreeMap<i64, AuditLog>,
    event_templates: BTreeMap<i64, EventTemplateRecord>,
    week_templates: BTreeMap<i64, WeekTemplateRecord>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn ensure_username_free(&self, username: &str) -> TrackerResult<()> {
        if self.users.values().any(|user| user.username == username) {
            Err(TrackerError::conflict(format!("Username {username} is taken")))
        } else {
            Ok(())
        }
    }

    fn ensure_team_name_free(&self, name: &str, except: Option<i64>) -> TrackerResult<()> {
        if self
            .teams
            .values()
            .any(|team| Some(team.id) != except && same_name(&team.name, name))
        {
            Err(TrackerError::conflict(format!("A team named {name} already exists")))
        } else {
            Ok(())
        }
    }

    fn ensure_semester_name_free(&self, name: &str, except: Option<i64>) -> TrackerResult<()> {
        if self
            .semesters
            .values()
            .any(|semester| Some(semester.id) != except && semester.name == name)
        {
            Err(TrackerError::conflict(format!("A semester named {name} already exists")))
        } else {
            Ok(())
        }
    }

    fn ensure_week_number_free(
        &self,
        semester_id: i64,
        week_number: i32,
        except: Option<i64>,
    ) -> TrackerResult<()> {
        if self.weeks.values().any(|week| {
            Some(week.id) != except
                && week.semester_id == semester_id
                && week.week_number == week_number
        }) {
            Err(TrackerError::conflict(format!(
                "Week {week_number} already exists in this semester"
            )))
        } else {
            Ok(())
        }
    }

    fn ensure_template_name_free(&self, name: &str, except: Option<i64>) -> TrackerResult<()> {
        if self
            .event_templates
            .values()
            .any(|template| Some(template.id) != except && same_name(&template.name, name))
        {
            Err(TrackerError::conflict(format!("A template named {name} already exists")))
        } else {
            Ok(())
        }
    }

    fn deactivate_semesters_except(&mut self, id: i64) {
        for semester in self.semesters.values_mut() {
            if semester.id != id {
                semester.is_active = false;
            }
        }
    }

    fn insert_task(&mut self, event_id: i64, draft: TaskDraft) -> Task {
        let id = self.next_id();
        for user_id in &draft.pool {
            self.pool.insert((id, *user_id));
        }

        let task = Task {
            id,
            event_id,
            title: draft.title,
            description: draft.description,
            task_type: draft.task_type,
            status: TaskStatus::Pending,
            assigned_to: draft.assigned_to,
            assigned_team_id: draft.assigned_team_id,
            completed_by: None,
            cannot_do_reason: None,
            reminder_time: draft.reminder_time,
            reminder_sent: false,
            auto_reminder_sent: false,
            created_at: GqlDateTime(current_time()),
        };
        self.tasks.insert(id, task.clone());

        task
    }

    fn insert_event(&mut self, event: &NewEvent) -> Event {
        let id = self.next_id();
        let event = Event {
            id,
            week_id: event.week_id,
            name: event.name.clone(),
            datetime: event.datetime,
            location: event.location.clone(),
        };
        self.events.insert(id, event.clone());

        event
    }

    fn delete_task(&mut self, id: i64) {
        self.tasks.remove(&id);
        self.pool.retain(|(task_id, _)| *task_id != id);
        self.comments.retain(|_, comment| comment.task_id != id);
    }

    fn delete_event(&mut self, id: i64) {
        self.events.remove(&id);
        let task_ids: Vec<i64> = self
            .tasks
            .values()
            .filter(|task| task.event_id == id)
            .map(|task| task.id)
            .collect();
        for task_id in task_ids {
            self.delete_task(task_id);
        }
    }

    fn delete_week(&mut self, id: i64) {
        self.weeks.remove(&id);
        let event_ids: Vec<i64> = self
            .events
            .values()
            .filter(|event| event.week_id == id)
            .map(|event| event.id)
            .collect();
        for event_id in event_ids {
            self.delete_event(event_id);
        }
    }

    fn sorted_users(&self, mut users: Vec<User>) -> Vec<User> {
        users.sort_by(|a, b| a.display_name.cmp(&b.display_name).then(a.id.cmp(&b.id)));
        users
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn user(&self, id: i64) -> TrackerResult<Option<User>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn user_by_username(&self, username: &str) -> TrackerResult<Option<User>> {
        Ok(self
            .tables
            .lock()
            .await
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn users(&self) -> TrackerResult<Vec<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.sorted_users(tables.users.values().cloned().collect()))
    }

    async fn team_members(&self, team_id: i64) -> TrackerResult<Vec<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.sorted_users(
            tables
                .users
                .values()
                .filter(|user| user.team_id == Some(team_id))
                .cloned()
                .collect(),
        ))
    }

    async fn insert_user(&self, user: UserDraft) -> TrackerResult<User> {
        let mut tables = self.tables.lock().await;
        tables.ensure_username_free(&user.username)?;

        let id = tables.next_id();
        let user = User {
            id,
            username: user.username,
            display_name: user.display_name,
            discord_id: user.discord_id,
            role: user.role,
            team_id: user.team_id,
            created_at: GqlDateTime(current_time()),
            password_hash: user.password_hash,
        };
        tables.users.insert(id, user.clone());

        Ok(user)
    }

    async fn save_user(&self, user: &User) -> TrackerResult<()> {
        let mut tables = self.tables.lock().await;
        if tables
            .users
            .values()
            .any(|other| other.id != user.id && other.username == user.username)
        {
            return Err(TrackerError::conflict(format!(
                "Username {} is taken",
                user.username
            )));
        }

        match tables.users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(TrackerError::not_found(format!("User {}", user.id))),
        }
    }

    async fn delete_user(&self, id: i64) -> TrackerResult<()> {
        let mut tables = self.tables.lock().await;
        tables.users.remove(&id);
        tables.sessions.retain(|(user_id, _)| *user_id != id);
        tables.roster.retain(|(_, user_id)| *user_id != id);
        tables.pool.retain(|(_, user_id)| *user_id != id);
        tables.comments.retain(|_, comment| comment.user_id != id);
        for task in tables.tasks.values_mut() {
            if task.assigned_to == Some(id) {
                task.assigned_to = None;
            }
            if task.completed_by == Some(id) {
                task.completed_by = None;
            }
        }
        for log in tables.audit_logs.values_mut() {
            if log.user_id == Some(id) {
                log.user_id = None;
            }
        }

        Ok(())
    }

    async fn session_user(&self, token: &str) -> TrackerResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .iter()
            .find(|(_, session_token)| session_token == token)
            .and_then(|(user_id, _)| tables.users.get(user_id))
            .cloned())
    }

    async fn session_token(&self, user_id: i64) -> TrackerResult<Option<String>> {
        Ok(self
            .tables
            .lock()
            .await
            .sessions
            .iter()
            .find(|(session_user_id, _)| *session_user_id == user_id)
            .map(|(_, token)| token.clone()))
    }

    async fn insert_session(&self, user_id: i64, token: &str) -> TrackerResult<()> {
        self.tables
            .lock()
            .await
            .sessions
            .push((user_id, token.to_owned()));
        Ok(())
    }

    async fn remove_sessions(&self, user_id: i64) -> TrackerResult<()> {
        self.tables
            .lock()
            .await
            .sessions
            .retain(|(session_user_id, _)| *session_user_id != user_id);
        Ok(())
    }

    async fn team(&self, id: i64) -> TrackerResult<Option<Team>> {
        Ok(self.tables.lock().await.teams.get(&id).cloned())
    }

    async fn team_by_name(&self, name: &str) -> TrackerResult<Option<Team>> {
        Ok(self
            .tables
            .lock()
            .await
            .teams
            .values()
            .find(|team| same_name(&team.name, name))
            .cloned())
    }

    async fn teams(&self) -> TrackerResult<Vec<Team>> {
        let mut teams: Vec<Team> = self.tables.lock().await.teams.values().cloned().collect();
        teams.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(teams)
    }

    async fn insert_team(&self, name: &str, color: &str) -> TrackerResult<Team> {
        let mut tables = self.tables.lock().await;
        tables.ensure_team_name_free(name, None)?;

        let id = tables.next_id();
        let team = Team {
            id,
            name: name.to_owned(),
            color: color.to_owned(),
        };
        tables.teams.insert(id, team.clone());

        Ok(team)
    }

    async fn save_team(&self, team: &Team) -> TrackerResult<()> {
        let mut tables = self.tables.lock().await;
        tables.ensure_team_name_free(&team.name, Some(team.id))?;
        tables.teams.insert(team.id, team.clone());
        Ok(())
    }

    async fn delete_team(&self, id: i64) -> TrackerResult<()> {
        let mut tables = self.tables.lock().await;
        tables.teams.remove(&id);
        for user in tables.users.values_mut() {
            if user.team_id == Some(id) {
                user.team_id = None;
            }
        }
        for task in tables.tasks.values_mut() {
            if task.assigned_team_id == Some(id) {
                task.assigned_team_id = None;
            }
        }

        Ok(())
    }

    async fn semester(&self, id: i64) -> TrackerResult<Option<Semester>> {
        Ok(self.tables.lock().await.semesters.get(&id).cloned())
    }

    async fn semester_by_name(&self, name: &str) -> TrackerResult<Option<Semester>> {
        Ok(self
            .tables
            .lock()
            .await
            .semesters
            .values()
            .find(|semester| semester.name == name)
            .cloned())
    }

    async fn active_semester(&self) -> TrackerResult<Option<Semester>> {
        Ok(self
            .tables
            .lock()
            .await
            .semesters
            .values()
            .find(|semester| semester.is_active)
            .cloned())
    }

    async fn semesters(&self) -> TrackerResult<Vec<Semester>> {
        let mut semesters: Vec<Semester> =
            self.tables.lock().await.semesters.values().cloned().collect();
        semesters.sort_by(|a, b| b.start_date.cmp(&a.start_date).then(b.id.cmp(&a.id)));
        Ok(semesters)
    }

    async fn insert_semester(&self, semester: &NewSemester) -> TrackerResult<Semester> {
        let mut tables = self.tables.lock().await;
        tables.ensure_semester_name_free(&semester.name, None)?;

        let id = tables.next_id();
        let semester = Semester {
            id,
            name: semester.name.clone(),
            start_date: semester.start_date,
            end_date: semester.end_date,
            is_active: semester.is_active,
        };
        if semester.is_active {
            tables.deactivate_semesters_except(id);
        }
        tables.semesters.insert(id, semester.clone());

        Ok(semester)
    }

    async fn save_semester(&self, semester: &Semester) -> TrackerResult<()> {
        let mut tables = self.tables.lock().await;
        tables.ensure_semester_name_free(&semester.name, Some(semester.id))?;
        if semester.is_active {
            tables.deactivate_semesters_except(semester.id);
        }
        tables.semesters.insert(semester.id, semester.clone());

        Ok(())
    }

    async fn delete_semester(&self, id: i64) -> TrackerResult<()> {
        let mut tables = self.tables.lock().await;
        tables.semesters.remove(&id);
        tables.roster.retain(|(semester_id, _)| *semester_id != id);
        let week_ids: Vec<i64> = tables
            .weeks
            .values()
            .filter(|week| week.semester_id == id)
            .map(|week| week.id)
            .collect();
        for week_id in week_ids {
            tables.delete_week(week_id);
        }

        Ok(())
    }

    async fn week(&self, id: i64) -> TrackerResult<Option<Week>> {
        Ok(self.tables.lock().await.weeks.get(&id).cloned())
    }

    async fn weeks(&self, semester_id: i64) -> TrackerResult<Vec<Week>> {
        let mut weeks: Vec<Week> = self
            .tables
            .lock()
            .await
            .weeks
            .values()
            .filter(|week| week.semester_id == semester_id)
            .cloned()
            .collect();
        weeks.sort_by_key(|week| week.week_number);
        Ok(weeks)
    }

    async fn insert_week(&self, week: &NewWeek) -> TrackerResult<Week> {
        let mut tables = self.tables.lock().await;
        tables.ensure_week_number_free(week.semester_id, week.week_number, None)?;

        let id = tables.next_id();
        let week = Week {
            id,
            semester_id: week.semester_id,
            week_number: week.week_number,
            start_date: week.start_date,
            end_date: week.end_date,
        };
        tables.weeks.insert(id, week.clone());

        Ok(week)
    }

    async fn save_week(&self, week: &Week) -> TrackerResult<()> {
        let mut tables = self.tables.lock().await;
        tables.ensure_week_number_free(week.semester_id, week.week_number, Some(week.id))?;
        tables.weeks.insert(week.id, week.clone());
        Ok(())
    }

    async fn delete_week(&self, id: i64) -> TrackerResult<()> {
        self.tables.lock().await.delete_week(id);
        Ok(())
    }

    async fn event(&self, id: i64) -> TrackerResult<Option<Event>> {
        Ok(self.tables.lock().await.events.get(&id).cloned())
    }

    async fn events(&self, week_id: i64) -> TrackerResult<Vec<Event>> {
        let mut events: Vec<Event> = self
            .tables
            .lock()
            .await
            .events
            .values()
            .filter(|event| event.week_id == week_id)
            .cloned()
            .collect();
        events.sort_by_key(|event| (event.datetime, event.id));
        Ok(events)
    }

    async fn events_between(
        &self,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> TrackerResult<Vec<Event>> {
        let mut events: Vec<Event> = self
            .tables
            .lock()
            .await
            .events
            .values()
            .filter(|event| from <= event.datetime.0 && event.datetime.0 <= to)
            .cloned()
            .collect();
        events.sort_by_key(|event| (event.datetime, event.id));
        Ok(events)
    }

    async fn insert_event(&self, event: &NewEvent, tasks: Vec<TaskDraft>) -> TrackerResult<Event> {
        let mut tables = self.tables.lock().await;
        if !tables.weeks.contains_key(&event.week_id) {
            return Err(TrackerError::not_found(format!("Week {}", event.week_id)));
        }

        let mut staged = tables.clone();
        let event = staged.insert_event(event);
        for task in tasks {
            staged.insert_task(event.id, task);
        }
        *tables = staged;

        Ok(event)
    }

    async fn insert_events(
        &self,
        events: Vec<(NewEvent, Vec<TaskDraft>)>,
    ) -> TrackerResult<Vec<Event>> {
        let mut tables = self.tables.lock().await;
        let mut staged = tables.clone();
        let mut created = Vec::with_capacity(events.len());
        for (event, tasks) in events {
            if !staged.weeks.contains_key(&event.week_id) {
                return Err(TrackerError::not_found(format!("Week {}", event.week_id)));
            }

            let event = staged.insert_event(&event);
            for task in tasks {
                staged.insert_task(event.id, task);
            }
            created.push(event);
        }
        *tables = staged;

        Ok(created)
    }

    async fn save_event(&self, event: &Event) -> TrackerResult<()> {
        self.tables
            .lock()
            .await
            .events
            .insert(event.id, event.clone());
        Ok(())
    }

    async fn delete_event(&self, id: i64) -> TrackerResult<()> {
        self.tables.lock().await.delete_event(id);
        Ok(())
    }

    async fn task(&self, id: i64) -> TrackerResult<Option<Task>> {
        Ok(self.tables.lock().await.tasks.get(&id).cloned())
    }

    async fn tasks(&self, event_id: i64) -> TrackerResult<Vec<Task>> {
        Ok(self
            .tables
            .lock()
            .await
            .tasks
            .values()
            .filter(|task| task.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn all_tasks(&self) -> TrackerResult<Vec<Task>> {
        Ok(self.tables.lock().await.tasks.values().cloned().collect())
    }

    async fn tasks_with_reminder_due(&self, now: OffsetDateTime) -> TrackerResult<Vec<Task>> {
        Ok(self
            .tables
            .lock()
            .await
            .tasks
            .values()
            .filter(|task| {
                task.status == TaskStatus::Pending
                    && !task.reminder_sent
                    && task.reminder_time.map_or(false, |time| time.0 <= now)
            })
            .cloned()
            .collect())
    }

    async fn insert_task(&self, event_id: i64, task: TaskDraft) -> TrackerResult<Task> {
        let mut tables = self.tables.lock().await;
        if !tables.events.contains_key(&event_id) {
            return Err(TrackerError::not_found(format!("Event {event_id}")));
        }

        Ok(tables.insert_task(event_id, task))
    }

    async fn modify_task_with_pool(
        &self,
        id: i64,
        edit: TaskEdit,
        pool: Option<Vec<i64>>,
    ) -> TrackerResult<Task> {
        let mut tables = self.tables.lock().await;
        let mut task = tables
            .tasks
            .get(&id)
            .cloned()
            .ok_or_else(|| TrackerError::not_found(format!("Task {id}")))?;

        edit(&mut task)?;
        tables.tasks.insert(id, task.clone());
        if let Some(user_ids) = pool {
            tables.pool.retain(|(pool_task_id, _)| *pool_task_id != id);
            for user_id in user_ids {
                tables.pool.insert((id, user_id));
            }
        }

        Ok(task)
    }

    async fn delete_task(&self, id: i64) -> TrackerResult<()> {
        self.tables.lock().await.delete_task(id);
        Ok(())
    }

    async fn pool_assignments(&self, task_ids: &[i64]) -> TrackerResult<Vec<TaskAssignment>> {
        Ok(self
            .tables
            .lock()
            .await
            .pool
            .iter()
            .filter(|(task_id, _)| task_ids.contains(task_id))
            .map(|(task_id, user_id)| TaskAssignment {
                task_id: *task_id,
                user_id: *user_id,
            })
            .collect())
    }

    async fn roster(&self, semester_id: i64) -> TrackerResult<Vec<User>> {
        let tables = self.tables.lock().await;
        let members = tables
            .roster
            .iter()
            .filter(|(roster_semester_id, _)| *roster_semester_id == semester_id)
            .filter_map(|(_, user_id)| tables.users.get(user_id).cloned())
            .collect();

        Ok(tables.sorted_users(members))
    }

    async fn on_roster(&self, semester_id: i64, user_id: i64) -> TrackerResult<bool> {
        Ok(self
            .tables
            .lock()
            .await
            .roster
            .contains(&(semester_id, user_id)))
    }

    async fn add_to_roster(&self, semester_id: i64, user_id: i64) -> TrackerResult<bool> {
        Ok(self
            .tables
            .lock()
            .await
            .roster
            .insert((semester_id, user_id)))
    }

    async fn remove_from_roster(&self, semester_id: i64, user_id: i64) -> TrackerResult<bool> {
        Ok(self
            .tables
            .lock()
            .await
            .roster
            .remove(&(semester_id, user_id)))
    }

    async fn comment(&self, id: i64) -> TrackerResult<Option<TaskComment>> {
        Ok(self.tables.lock().await.comments.get(&id).cloned())
    }

    async fn comments(&self, task_id: i64) -> TrackerResult<Vec<TaskComment>> {
        Ok(self
            .tables
            .lock()
            .await
            .comments
            .values()
            .filter(|comment| comment.task_id == task_id)
            .cloned()
            .collect())
    }

    async fn insert_comment(
        &self,
        task_id: i64,
        user_id: i64,
        content: &str,
    ) -> TrackerResult<TaskComment> {
        let mut tables = self.tables.lock().await;
        let id = tables.next_id();
        let comment = TaskComment {
            id,
            task_id,
            user_id,
            content: content.to_owned(),
            created_at: GqlDateTime(current_time()),
        };
        tables.comments.insert(id, comment.clone());

        Ok(comment)
    }

    async fn delete_comment(&self, id: i64) -> TrackerResult<()> {
        self.tables.lock().await.comments.remove(&id);
        Ok(())
    }

    async fn insert_audit_log(&self, entry: &NewAuditLog) -> TrackerResult<()> {
        let mut tables = self.tables.lock().await;
        let id = tables.next_id();
        tables.audit_logs.insert(
            id,
            AuditLog {
                id,
                user_id: entry.user_id,
                action: entry.action.clone(),
                entity_type: entry.entity_type.clone(),
                entity_id: entry.entity_id,
                entity_name: entry.entity_name.clone(),
                details: entry.details.clone(),
                created_at: GqlDateTime(current_time()),
            },
        );

        Ok(())
    }

    async fn audit_logs(
        &self,
        filter: &AuditFilter,
        offset: i64,
        limit: i64,
    ) -> TrackerResult<(Vec<AuditLog>, i64)> {
        let tables = self.tables.lock().await;
        let matching: Vec<&AuditLog> = tables
            .audit_logs
            .values()
            .rev()
            .filter(|log| filter.matches(log))
            .collect();
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn audit_actions(&self) -> TrackerResult<Vec<String>> {
        let tables = self.tables.lock().await;
        let actions: BTreeSet<&String> = tables.audit_logs.values().map(|log| &log.action).collect();
        Ok(actions.into_iter().cloned().collect())
    }

    async fn audit_entity_types(&self) -> TrackerResult<Vec<String>> {
        let tables = self.tables.lock().await;
        let entity_types: BTreeSet<&String> = tables
            .audit_logs
            .values()
            .map(|log| &log.entity_type)
            .collect();
        Ok(entity_types.into_iter().cloned().collect())
    }

    async fn event_template_records(&self) -> TrackerResult<Vec<EventTemplateRecord>> {
        Ok(self
            .tables
            .lock()
            .await
            .event_templates
            .values()
            .cloned()
            .collect())
    }

    async fn insert_event_template(
        &self,
        template: &EventTemplateDraft,
    ) -> TrackerResult<EventTemplateRecord> {
        let mut tables = self.tables.lock().await;
        tables.ensure_template_name_free(&template.name, None)?;

        let id = tables.next_id();
        let record = EventTemplateRecord {
            id,
            name: template.name.clone(),
            default_location: template.default_location.clone(),
            tasks: Json(template.tasks.clone()),
            overrides: template.overrides.clone(),
        };
        tables.event_templates.insert(id, record.clone());

        Ok(record)
    }

    async fn save_event_template(&self, template: &EventTemplateRecord) -> TrackerResult<()> {
        let mut tables = self.tables.lock().await;
        tables.ensure_template_name_free(&template.name, Some(template.id))?;
        tables.event_templates.insert(template.id, template.clone());
        Ok(())
    }

    async fn delete_event_template(&self, id: i64) -> TrackerResult<()> {
        self.tables.lock().await.event_templates.remove(&id);
        Ok(())
    }

    async fn week_template_records(&self) -> TrackerResult<Vec<WeekTemplateRecord>> {
        Ok(self
            .tables
            .lock()
            .await
            .week_templates
            .values()
            .cloned()
            .collect())
    }

    async fn insert_week_template(
        &self,
        template: &WeekTemplateDraft,
    ) -> TrackerResult<WeekTemplateRecord> {
        let mut tables = self.tables.lock().await;
        if tables
            .week_templates
            .values()
            .any(|existing| same_name(&existing.name, &template.name))
        {
            return Err(TrackerError::conflict(format!(
                "A week template named {} already exists",
                template.name
            )));
        }

        let id = tables.next_id();
        let record = WeekTemplateRecord {
            id,
            name: template.name.clone(),
            description: template.description.clone(),
            entries: Json(template.entries.clone()),
        };
        tables.week_templates.insert(id, record.clone());

        Ok(record)
    }

    async fn delete_week_template(&self, id: i64) -> TrackerResult<()> {
        self.tables.lock().await.week_templates.remove(&id);
        Ok(())
    }

    async fn import_semester(&self, semester: &SemesterImport) -> TrackerResult<ImportCounts> {
        let mut tables = self.tables.lock().await;
        let mut staged = tables.clone();
        staged.ensure_semester_name_free(&semester.name, None)?;

        let semester_id = staged.next_id();
        staged.semesters.insert(
            semester_id,
            Semester {
                id: semester_id,
                name: semester.name.clone(),
                start_date: GqlDate(semester.start_date),
                end_date: GqlDate(semester.end_date),
                is_active: false,
            },
        );
        for user_id in &semester.roster {
            staged.roster.insert((semester_id, *user_id));
        }

        let mut counts = ImportCounts::default();
        for week in &semester.weeks {
            staged.ensure_week_number_free(semester_id, week.week_number, None)?;
            let week_id = staged.next_id();
            staged.weeks.insert(
                week_id,
                Week {
                    id: week_id,
                    semester_id,
                    week_number: week.week_number,
                    start_date: GqlDate(week.start_date),
                    end_date: GqlDate(week.end_date),
                },
            );
            counts.weeks += 1;

            for event in &week.events {
                let event_id = staged
                    .insert_event(&NewEvent {
                        week_id,
                        name: event.name.clone(),
                        datetime: GqlDateTime(event.datetime),
                        location: event.location.clone(),
                    })
                    .id;
                counts.events += 1;

                for task in &event.tasks {
                    let mut inserted = staged.insert_task(event_id, task.draft.clone());
                    inserted.status = task.status;
                    inserted.completed_by = task.completed_by;
                    inserted.cannot_do_reason = task.cannot_do_reason.clone();
                    staged.tasks.insert(inserted.id, inserted);
                    counts.tasks += 1;
                }
            }
        }

        *tables = staged;
        Ok(counts)
    }
}
