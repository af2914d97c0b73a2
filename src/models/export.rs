//! Moving whole semesters in and out as JSON.
//!
//! Exports refer to people and teams by username and team name so they can be
//! loaded into a different deployment. Imports resolve those names again and
//! leave anything unknown unassigned.

use async_graphql::SimpleObject;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::db::Store;
use crate::error::{TrackerError, TrackerResult};
use crate::models::audit::NewAuditLog;
use crate::models::member::User;
use crate::models::semester::Semester;
use crate::models::task::assignment::Assignees;
use crate::models::task::{TaskDraft, TaskStatus, TaskType};
use crate::models::{GqlDate, GqlDateTime};
use crate::util::current_time;

pub const EXPORT_VERSION: &str = "1.0";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExportData {
    pub exported_at: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub semesters: Vec<ExportSemester>,
}

fn default_version() -> String {
    EXPORT_VERSION.to_owned()
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExportSemester {
    pub name: String,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub weeks: Vec<ExportWeek>,
    #[serde(default)]
    pub roster_usernames: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExportWeek {
    pub week_number: i32,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub events: Vec<ExportEvent>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExportEvent {
    pub name: String,
    pub datetime: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub tasks: Vec<ExportTask>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExportTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub task_type: TaskType,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub assigned_to_username: Option<String>,
    #[serde(default)]
    pub assigned_team_name: Option<String>,
    #[serde(default)]
    pub assigned_pool_usernames: Vec<String>,
    #[serde(default)]
    pub completed_by_username: Option<String>,
    #[serde(default)]
    pub cannot_do_reason: Option<String>,
}

/// A semester ready to be written, with every name resolved to an id.
#[derive(Clone, Debug, PartialEq)]
pub struct SemesterImport {
    pub name: String,
    pub start_date: Date,
    pub end_date: Date,
    pub roster: Vec<i64>,
    pub weeks: Vec<WeekImport>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WeekImport {
    pub week_number: i32,
    pub start_date: Date,
    pub end_date: Date,
    pub events: Vec<EventImport>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EventImport {
    pub name: String,
    pub datetime: OffsetDateTime,
    pub location: Option<String>,
    pub tasks: Vec<TaskImport>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TaskImport {
    pub draft: TaskDraft,
    pub status: TaskStatus,
    pub completed_by: Option<i64>,
    pub cannot_do_reason: Option<String>,
}

/// Rows written by one semester import.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImportCounts {
    pub weeks: usize,
    pub events: usize,
    pub tasks: usize,
}

#[derive(SimpleObject, Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportResult {
    pub semesters_created: i32,
    pub weeks_created: i32,
    pub events_created: i32,
    pub tasks_created: i32,
    /// One message per semester that was skipped or failed
    pub errors: Vec<String>,
}

impl ExportData {
    fn now(semesters: Vec<ExportSemester>) -> Self {
        Self {
            exported_at: GqlDateTime(current_time()).formatted(),
            version: default_version(),
            semesters,
        }
    }

    pub async fn semester(id: i64, store: &dyn Store) -> TrackerResult<Self> {
        let semester = Semester::with_id(id, store).await?;
        Ok(Self::now(vec![ExportSemester::build(&semester, store).await?]))
    }

    /// Every semester, newest first.
    pub async fn all(store: &dyn Store) -> TrackerResult<Self> {
        let mut semesters = Vec::new();
        for semester in store.semesters().await? {
            semesters.push(ExportSemester::build(&semester, store).await?);
        }

        Ok(Self::now(semesters))
    }

    /// Loads every semester in the document, each in its own transaction.
    ///
    /// A semester whose name is taken, or that fails to load, is reported in
    /// `errors` and does not affect the others.
    pub async fn import(self, actor: &User, store: &dyn Store) -> TrackerResult<ImportResult> {
        let mut result = ImportResult::default();

        for semester in self.semesters {
            if store.semester_by_name(&semester.name).await?.is_some() {
                result
                    .errors
                    .push(format!("Semester '{}' already exists, skipped", semester.name));
                continue;
            }

            let outcome = match semester.resolve(store).await {
                Ok(import) => store.import_semester(&import).await,
                Err(err) => Err(err),
            };
            match outcome {
                Ok(counts) => {
                    result.semesters_created += 1;
                    result.weeks_created += counts.weeks as i32;
                    result.events_created += counts.events as i32;
                    result.tasks_created += counts.tasks as i32;
                }
                Err(err) => result
                    .errors
                    .push(format!("Error importing semester '{}': {err}", semester.name)),
            }
        }

        NewAuditLog::new("IMPORT", "semester")
            .by(actor)
            .details(format!(
                "semesters: {}, weeks: {}, events: {}, tasks: {}, errors: {}",
                result.semesters_created,
                result.weeks_created,
                result.events_created,
                result.tasks_created,
                result.errors.len()
            ))
            .log(store)
            .await;

        Ok(result)
    }
}

async fn username(user_id: Option<i64>, store: &dyn Store) -> TrackerResult<Option<String>> {
    Ok(match user_id {
        Some(user_id) => store.user(user_id).await?.map(|user| user.username),
        None => None,
    })
}

async fn user_id(username: Option<&str>, store: &dyn Store) -> TrackerResult<Option<i64>> {
    Ok(match username {
        Some(username) => store.user_by_username(username).await?.map(|user| user.id),
        None => None,
    })
}

fn parse_date(value: &str) -> TrackerResult<Date> {
    GqlDate::parse_str(value)
        .map(|date| date.0)
        .ok_or_else(|| TrackerError::validation(format!("Invalid date {value:?}")))
}

impl ExportSemester {
    async fn build(semester: &Semester, store: &dyn Store) -> TrackerResult<Self> {
        let mut weeks = Vec::new();
        for week in store.weeks(semester.id).await? {
            let mut events = Vec::new();
            for event in store.events(week.id).await? {
                let tasks = store.tasks(event.id).await?;
                let assignees = Assignees::for_tasks(&tasks, store).await?;

                let mut export_tasks = Vec::new();
                for task in tasks {
                    let mut pool = Vec::new();
                    for user_id in assignees.get(&task.id).map(|a| a.pool.as_slice()).unwrap_or_default() {
                        pool.extend(store.user(*user_id).await?.map(|user| user.username));
                    }
                    let team_name = match task.assigned_team_id {
                        Some(team_id) => store.team(team_id).await?.map(|team| team.name),
                        None => None,
                    };

                    export_tasks.push(ExportTask {
                        assigned_to_username: username(task.assigned_to, store).await?,
                        completed_by_username: username(task.completed_by, store).await?,
                        assigned_team_name: team_name,
                        assigned_pool_usernames: pool,
                        title: task.title,
                        description: task.description,
                        task_type: task.task_type,
                        status: task.status,
                        cannot_do_reason: task.cannot_do_reason,
                    });
                }

                events.push(ExportEvent {
                    name: event.name,
                    datetime: event.datetime.formatted(),
                    location: event.location,
                    tasks: export_tasks,
                });
            }

            weeks.push(ExportWeek {
                week_number: week.week_number,
                start_date: week.start_date.formatted(),
                end_date: week.end_date.formatted(),
                events,
            });
        }

        Ok(Self {
            name: semester.name.clone(),
            start_date: semester.start_date.formatted(),
            end_date: semester.end_date.formatted(),
            is_active: semester.is_active,
            weeks,
            roster_usernames: store
                .roster(semester.id)
                .await?
                .into_iter()
                .map(|user| user.username)
                .collect(),
        })
    }

    /// Parses dates and looks up every username and team name.
    async fn resolve(&self, store: &dyn Store) -> TrackerResult<SemesterImport> {
        let mut roster = Vec::new();
        for username in &self.roster_usernames {
            roster.extend(user_id(Some(username), store).await?);
        }

        let mut weeks = Vec::new();
        for week in &self.weeks {
            let mut events = Vec::new();
            for event in &week.events {
                let datetime = GqlDateTime::parse_str(&event.datetime)
                    .ok_or_else(|| {
                        TrackerError::validation(format!("Invalid datetime {:?}", event.datetime))
                    })?
                    .0;

                let mut tasks = Vec::new();
                for task in &event.tasks {
                    let mut pool = Vec::new();
                    for username in &task.assigned_pool_usernames {
                        pool.extend(user_id(Some(username), store).await?);
                    }
                    let assigned_team_id = match &task.assigned_team_name {
                        Some(name) => store.team_by_name(name).await?.map(|team| team.id),
                        None => None,
                    };

                    tasks.push(TaskImport {
                        draft: TaskDraft {
                            title: task.title.clone(),
                            description: task.description.clone(),
                            task_type: task.task_type,
                            assigned_to: user_id(task.assigned_to_username.as_deref(), store).await?,
                            assigned_team_id,
                            pool,
                            reminder_time: None,
                        },
                        status: task.status,
                        completed_by: user_id(task.completed_by_username.as_deref(), store).await?,
                        cannot_do_reason: task.cannot_do_reason.clone(),
                    });
                }

                events.push(EventImport {
                    name: event.name.clone(),
                    datetime,
                    location: event.location.clone(),
                    tasks,
                });
            }

            weeks.push(WeekImport {
                week_number: week.week_number,
                start_date: parse_date(&week.start_date)?,
                end_date: parse_date(&week.end_date)?,
                events,
            });
        }

        Ok(SemesterImport {
            name: self.name.clone(),
            start_date: parse_date(&self.start_date)?,
            end_date: parse_date(&self.end_date)?,
            roster,
            weeks,
        })
    }
}
