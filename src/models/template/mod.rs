//! Event and week templates.
//!
//! Two catalogs are merged every time templates are read: the built-in one
//! compiled into the binary and the custom one stored in the database. A
//! stored record that `overrides` a built-in id takes that entry's place
//! until it is reset.

use async_graphql::{InputObject, MaybeUndefined, SimpleObject};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use time::macros::format_description;
use time::Time;

use crate::db::Store;
use crate::error::{TrackerError, TrackerResult};
use crate::models::audit::NewAuditLog;
use crate::models::member::User;
use crate::models::task::TaskType;
use crate::util::{field_update, require_non_empty, same_name};

pub mod builtin;
pub mod expand;

const CUSTOM_PREFIX: &str = "db_";

/// One task an event template creates
#[derive(SimpleObject, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStub {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub task_type: TaskType,
    /// The team the created task is handed to, matched by name ignoring case
    #[serde(default)]
    pub team_name: Option<String>,
}

#[derive(InputObject)]
pub struct TaskStubInput {
    pub title: String,
    pub description: Option<String>,
    #[graphql(default_with = "TaskType::Standard")]
    pub task_type: TaskType,
    pub team_name: Option<String>,
}

#[derive(SimpleObject, Clone, Debug, PartialEq, Eq)]
pub struct EventTemplate {
    /// A built-in id such as `jumuah`, or `db_<id>` for custom templates
    pub id: String,
    pub name: String,
    pub default_location: Option<String>,
    pub tasks: Vec<TaskStub>,
    pub is_builtin: bool,
    /// Whether a stored override replaces the built-in contents
    pub is_overridden: bool,
}

#[derive(sqlx::FromRow, Clone, Debug, PartialEq, Eq)]
pub struct EventTemplateRecord {
    pub id: i64,
    pub name: String,
    pub default_location: Option<String>,
    pub tasks: Json<Vec<TaskStub>>,
    /// The built-in template id this record stands in for
    pub overrides: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventTemplateDraft {
    pub name: String,
    pub default_location: Option<String>,
    pub tasks: Vec<TaskStub>,
    pub overrides: Option<String>,
}

/// One event a week template schedules
#[derive(SimpleObject, InputObject, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[graphql(input_name = "WeekTemplateEntryInput")]
pub struct WeekTemplateEntry {
    pub event_template_id: String,
    /// Days after the week's start date, from 0 to 6
    pub day_offset: i32,
    /// Start time in `HH:MM`, UTC
    pub default_time: String,
}

#[derive(SimpleObject, Clone, Debug, PartialEq, Eq)]
pub struct WeekTemplate {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub entries: Vec<WeekTemplateEntry>,
    pub is_builtin: bool,
}

#[derive(sqlx::FromRow, Clone, Debug, PartialEq, Eq)]
pub struct WeekTemplateRecord {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub entries: Json<Vec<WeekTemplateEntry>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeekTemplateDraft {
    pub name: String,
    pub description: Option<String>,
    pub entries: Vec<WeekTemplateEntry>,
}

fn custom_id(record_id: i64) -> String {
    format!("{CUSTOM_PREFIX}{record_id}")
}

/// The stored record id behind a `db_<id>` template id.
fn record_id(template_id: &str) -> TrackerResult<i64> {
    template_id
        .strip_prefix(CUSTOM_PREFIX)
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| TrackerError::not_found(format!("Template {template_id}")))
}

/// Parses a `HH:MM` clock time.
pub fn parse_time(value: &str) -> TrackerResult<Time> {
    Time::parse(value, format_description!("[hour]:[minute]"))
        .map_err(|_| TrackerError::validation(format!("Invalid time {value:?}, expected HH:MM")))
}

/// Lays the stored catalog over the built-in one.
///
/// Built-ins keep their position and id when overridden. Custom records follow
/// in their stored order. Overrides of ids that are not built in are ignored.
pub fn merge_event_templates(
    builtins: Vec<EventTemplate>,
    records: Vec<EventTemplateRecord>,
) -> Vec<EventTemplate> {
    let (overrides, custom): (Vec<_>, Vec<_>) = records
        .into_iter()
        .partition(|record| record.overrides.is_some());

    let mut merged: Vec<EventTemplate> = builtins
        .into_iter()
        .map(|builtin| {
            match overrides
                .iter()
                .find(|record| record.overrides.as_deref() == Some(builtin.id.as_str()))
            {
                Some(record) => EventTemplate {
                    id: builtin.id,
                    name: record.name.clone(),
                    default_location: record.default_location.clone(),
                    tasks: record.tasks.0.clone(),
                    is_builtin: true,
                    is_overridden: true,
                },
                None => builtin,
            }
        })
        .collect();

    merged.extend(custom.into_iter().map(|record| EventTemplate {
        id: custom_id(record.id),
        name: record.name,
        default_location: record.default_location,
        tasks: record.tasks.0,
        is_builtin: false,
        is_overridden: false,
    }));

    merged
}

impl EventTemplate {
    pub async fn all(store: &dyn Store) -> TrackerResult<Vec<Self>> {
        Ok(merge_event_templates(
            builtin::event_templates(),
            store.event_template_records().await?,
        ))
    }

    /// Looks a template up by id. Overrides shadow built-ins, and custom
    /// templates are only reachable through their `db_` ids.
    pub async fn resolve(id: &str, store: &dyn Store) -> TrackerResult<Option<Self>> {
        Ok(Self::all(store)
            .await?
            .into_iter()
            .find(|template| template.id == id))
    }

    pub async fn with_id(id: &str, store: &dyn Store) -> TrackerResult<Self> {
        Self::resolve(id, store)
            .await?
            .ok_or_else(|| TrackerError::not_found(format!("Template {id}")))
    }

    async fn ensure_name_free(name: &str, except: Option<&str>, store: &dyn Store) -> TrackerResult<()> {
        let taken = Self::all(store).await?.into_iter().any(|template| {
            Some(template.id.as_str()) != except && same_name(&template.name, name)
        });

        if taken {
            Err(TrackerError::conflict(format!(
                "A template named {name} already exists"
            )))
        } else {
            Ok(())
        }
    }

    fn validate_tasks(tasks: Vec<TaskStubInput>) -> TrackerResult<Vec<TaskStub>> {
        tasks
            .into_iter()
            .map(|task| {
                Ok(TaskStub {
                    title: require_non_empty(&task.title, "Task title")?,
                    description: task.description,
                    task_type: task.task_type,
                    team_name: task
                        .team_name
                        .map(|name| name.trim().to_owned())
                        .filter(|name| !name.is_empty()),
                })
            })
            .collect()
    }

    async fn record(id: &str, store: &dyn Store) -> TrackerResult<EventTemplateRecord> {
        let record_id = record_id(id)?;
        store
            .event_template_records()
            .await?
            .into_iter()
            .find(|record| record.id == record_id && record.overrides.is_none())
            .ok_or_else(|| TrackerError::not_found(format!("Template {id}")))
    }

    pub async fn create(
        input: EventTemplateInput,
        actor: &User,
        store: &dyn Store,
    ) -> TrackerResult<Self> {
        let name = require_non_empty(&input.name, "Template name")?;
        Self::ensure_name_free(&name, None, store).await?;

        let record = store
            .insert_event_template(&EventTemplateDraft {
                name,
                default_location: input.default_location,
                tasks: Self::validate_tasks(input.tasks)?,
                overrides: None,
            })
            .await?;
        let template = Self::with_id(&custom_id(record.id), store).await?;

        NewAuditLog::new("TEMPLATE_CREATE", "template")
            .entity(record.id, &template.name)
            .by(actor)
            .log(store)
            .await;

        Ok(template)
    }

    pub async fn update(
        id: &str,
        update: EventTemplateUpdate,
        actor: &User,
        store: &dyn Store,
    ) -> TrackerResult<Self> {
        let mut record = Self::record(id, store).await?;

        if let Some(name) = update.name {
            let name = require_non_empty(&name, "Template name")?;
            Self::ensure_name_free(&name, Some(id), store).await?;
            record.name = name;
        }
        if let Some(default_location) = field_update(update.default_location) {
            record.default_location = default_location;
        }
        if let Some(tasks) = update.tasks {
            record.tasks = Json(Self::validate_tasks(tasks)?);
        }

        store.save_event_template(&record).await?;
        NewAuditLog::new("TEMPLATE_UPDATE", "template")
            .entity(record.id, &record.name)
            .by(actor)
            .log(store)
            .await;

        Self::with_id(id, store).await
    }

    pub async fn delete(id: &str, actor: &User, store: &dyn Store) -> TrackerResult<()> {
        let record = Self::record(id, store).await?;
        store.delete_event_template(record.id).await?;

        NewAuditLog::new("TEMPLATE_DELETE", "template")
            .entity(record.id, &record.name)
            .by(actor)
            .log(store)
            .await;

        Ok(())
    }

    /// Stores new contents for a built-in template, replacing any earlier
    /// override of it.
    pub async fn override_builtin(
        builtin_id: &str,
        input: EventTemplateInput,
        actor: &User,
        store: &dyn Store,
    ) -> TrackerResult<Self> {
        if !builtin::is_builtin_event(builtin_id) {
            return Err(TrackerError::not_found(format!("Built-in template {builtin_id}")));
        }

        let name = require_non_empty(&input.name, "Template name")?;
        Self::ensure_name_free(&name, Some(builtin_id), store).await?;
        let tasks = Self::validate_tasks(input.tasks)?;

        let existing = store
            .event_template_records()
            .await?
            .into_iter()
            .find(|record| record.overrides.as_deref() == Some(builtin_id));
        let record_id = match existing {
            Some(record) => {
                let record = EventTemplateRecord {
                    name,
                    default_location: input.default_location,
                    tasks: Json(tasks),
                    ..record
                };
                store.save_event_template(&record).await?;
                record.id
            }
            None => {
                store
                    .insert_event_template(&EventTemplateDraft {
                        name,
                        default_location: input.default_location,
                        tasks,
                        overrides: Some(builtin_id.to_owned()),
                    })
                    .await?
                    .id
            }
        };

        NewAuditLog::new("TEMPLATE_OVERRIDE", "template")
            .entity(record_id, builtin_id)
            .by(actor)
            .log(store)
            .await;

        Self::with_id(builtin_id, store).await
    }

    /// Drops the override of a built-in template, restoring the original.
    pub async fn reset_builtin(builtin_id: &str, actor: &User, store: &dyn Store) -> TrackerResult<Self> {
        let record = store
            .event_template_records()
            .await?
            .into_iter()
            .find(|record| record.overrides.as_deref() == Some(builtin_id))
            .ok_or_else(|| TrackerError::not_found(format!("Override of template {builtin_id}")))?;
        store.delete_event_template(record.id).await?;

        NewAuditLog::new("TEMPLATE_RESET", "template")
            .entity(record.id, builtin_id)
            .by(actor)
            .log(store)
            .await;

        Self::with_id(builtin_id, store).await
    }
}

impl WeekTemplate {
    pub async fn all(store: &dyn Store) -> TrackerResult<Vec<Self>> {
        let mut templates = builtin::week_templates();
        templates.extend(
            store
                .week_template_records()
                .await?
                .into_iter()
                .map(|record| WeekTemplate {
                    id: custom_id(record.id),
                    name: record.name,
                    description: record.description,
                    entries: record.entries.0,
                    is_builtin: false,
                }),
        );

        Ok(templates)
    }

    pub async fn with_id(id: &str, store: &dyn Store) -> TrackerResult<Self> {
        Self::all(store)
            .await?
            .into_iter()
            .find(|template| template.id == id)
            .ok_or_else(|| TrackerError::not_found(format!("Week template {id}")))
    }

    fn validate_entry(entry: WeekTemplateEntry) -> TrackerResult<WeekTemplateEntry> {
        if !(0..=6).contains(&entry.day_offset) {
            return Err(TrackerError::validation(format!(
                "Day offset must be between 0 and 6, got {}",
                entry.day_offset
            )));
        }
        let default_time = entry.default_time.trim().to_owned();
        parse_time(&default_time)?;

        Ok(WeekTemplateEntry {
            event_template_id: require_non_empty(&entry.event_template_id, "Event template id")?,
            day_offset: entry.day_offset,
            default_time,
        })
    }

    pub async fn create(
        input: NewWeekTemplate,
        actor: &User,
        store: &dyn Store,
    ) -> TrackerResult<Self> {
        let name = require_non_empty(&input.name, "Template name")?;
        if Self::all(store)
            .await?
            .iter()
            .any(|template| same_name(&template.name, &name))
        {
            return Err(TrackerError::conflict(format!(
                "A week template named {name} already exists"
            )));
        }

        let entries = input
            .entries
            .into_iter()
            .map(Self::validate_entry)
            .collect::<TrackerResult<Vec<_>>>()?;
        let record = store
            .insert_week_template(&WeekTemplateDraft {
                name,
                description: input.description,
                entries,
            })
            .await?;

        NewAuditLog::new("WEEK_TEMPLATE_CREATE", "week_template")
            .entity(record.id, &record.name)
            .by(actor)
            .log(store)
            .await;

        Self::with_id(&custom_id(record.id), store).await
    }

    pub async fn delete(id: &str, actor: &User, store: &dyn Store) -> TrackerResult<()> {
        let record_id = record_id(id)?;
        let record = store
            .week_template_records()
            .await?
            .into_iter()
            .find(|record| record.id == record_id)
            .ok_or_else(|| TrackerError::not_found(format!("Week template {id}")))?;
        store.delete_week_template(record.id).await?;

        NewAuditLog::new("WEEK_TEMPLATE_DELETE", "week_template")
            .entity(record.id, &record.name)
            .by(actor)
            .log(store)
            .await;

        Ok(())
    }
}

#[derive(InputObject)]
pub struct EventTemplateInput {
    pub name: String,
    pub default_location: Option<String>,
    #[graphql(default)]
    pub tasks: Vec<TaskStubInput>,
}

#[derive(InputObject, Default)]
pub struct EventTemplateUpdate {
    pub name: Option<String>,
    pub default_location: MaybeUndefined<String>,
    /// Replaces every task stub when given
    pub tasks: Option<Vec<TaskStubInput>>,
}

#[derive(InputObject)]
pub struct NewWeekTemplate {
    pub name: String,
    pub description: Option<String>,
    #[graphql(default)]
    pub entries: Vec<WeekTemplateEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, name: &str, overrides: Option<&str>) -> EventTemplateRecord {
        EventTemplateRecord {
            id,
            name: name.to_owned(),
            default_location: None,
            tasks: Json(vec![TaskStub {
                title: "Replacement task".to_owned(),
                description: None,
                task_type: TaskType::Setup,
                team_name: None,
            }]),
            overrides: overrides.map(str::to_owned),
        }
    }

    #[test]
    fn overrides_replace_builtins_in_place() {
        let merged = merge_event_templates(
            builtin::event_templates(),
            vec![record(3, "Friday Prayer", Some("jumuah"))],
        );

        let jumuah = &merged[0];
        assert_eq!(jumuah.id, "jumuah");
        assert_eq!(jumuah.name, "Friday Prayer");
        assert!(jumuah.is_builtin && jumuah.is_overridden);
        assert_eq!(jumuah.tasks.len(), 1);
        assert_eq!(merged.len(), builtin::event_templates().len());
    }

    #[test]
    fn custom_templates_follow_builtins() {
        let builtin_count = builtin::event_templates().len();
        let merged = merge_event_templates(
            builtin::event_templates(),
            vec![record(8, "Board Meeting", None)],
        );

        assert_eq!(merged.len(), builtin_count + 1);
        let custom = merged.last().unwrap();
        assert_eq!(custom.id, "db_8");
        assert!(!custom.is_builtin && !custom.is_overridden);
    }

    #[test]
    fn overrides_of_unknown_ids_are_dropped() {
        let merged = merge_event_templates(
            builtin::event_templates(),
            vec![record(2, "Ghost", Some("not_a_template"))],
        );

        assert!(merged.iter().all(|template| template.name != "Ghost"));
    }

    #[test]
    fn custom_ids_round_trip() {
        assert_eq!(record_id(&custom_id(42)).unwrap(), 42);
        assert!(record_id("jumuah").is_err());
        assert!(record_id("db_abc").is_err());
    }

    #[test]
    fn clock_times_must_be_hh_mm() {
        assert_eq!(parse_time("18:30").unwrap(), Time::from_hms(18, 30, 0).unwrap());
        assert!(parse_time("25:00").is_err());
        assert!(parse_time("6pm").is_err());
    }
}
