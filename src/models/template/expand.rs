//! Turning templates into events and tasks.

use std::collections::HashMap;

use time::{Duration, PrimitiveDateTime};

use crate::db::Store;
use crate::error::{TrackerError, TrackerResult};
use crate::models::audit::NewAuditLog;
use crate::models::event::{Event, NewEvent};
use crate::models::member::User;
use crate::models::task::TaskDraft;
use crate::models::week::Week;
use crate::models::GqlDateTime;

use super::{parse_time, EventTemplate, TaskStub, WeekTemplate};

/// Team ids keyed by lowercased team name.
type TeamIds = HashMap<String, i64>;

/// Looks up every team the stubs name.
///
/// Fails listing each missing team, in the order first referenced, if any
/// cannot be found.
async fn resolve_teams<'a>(
    stubs: impl IntoIterator<Item = &'a TaskStub>,
    store: &dyn Store,
) -> TrackerResult<TeamIds> {
    let mut teams = TeamIds::new();
    let mut missing: Vec<&str> = Vec::new();

    for team_name in stubs.into_iter().filter_map(|stub| stub.team_name.as_deref()) {
        let key = team_name.to_lowercase();
        if teams.contains_key(&key) || missing.iter().any(|name| name.to_lowercase() == key) {
            continue;
        }

        match store.team_by_name(team_name).await? {
            Some(team) => {
                teams.insert(key, team.id);
            }
            None => missing.push(team_name),
        }
    }

    if missing.is_empty() {
        Ok(teams)
    } else {
        Err(TrackerError::validation(format!(
            "Teams not found: {}. Create them before using this template.",
            missing.join(", ")
        )))
    }
}

fn task_drafts(template: &EventTemplate, teams: &TeamIds) -> Vec<TaskDraft> {
    template
        .tasks
        .iter()
        .map(|stub| TaskDraft {
            title: stub.title.clone(),
            description: stub.description.clone(),
            task_type: stub.task_type,
            assigned_team_id: stub
                .team_name
                .as_ref()
                .and_then(|name| teams.get(&name.to_lowercase()).copied()),
            ..TaskDraft::default()
        })
        .collect()
}

async fn log_applied(template: &EventTemplate, event: &Event, actor: &User, store: &dyn Store) {
    NewAuditLog::new("TEMPLATE_APPLY", "event")
        .entity(event.id, &event.name)
        .by(actor)
        .details(format!("template: {}, tasks: {}", template.id, template.tasks.len()))
        .log(store)
        .await;
}

/// Creates the event and its tasks in one write. Every team the template
/// references must already be resolved.
async fn expand(
    template: &EventTemplate,
    teams: &TeamIds,
    new_event: NewEvent,
    actor: &User,
    store: &dyn Store,
) -> TrackerResult<Event> {
    let event = store
        .insert_event(&new_event, task_drafts(template, teams))
        .await?;
    log_applied(template, &event, actor, store).await;

    Ok(event)
}

/// Creates one event from an event template.
///
/// Nothing is written unless every team the template names exists.
pub async fn create_from_template(
    template_id: &str,
    week_id: i64,
    datetime: GqlDateTime,
    name: Option<String>,
    location: Option<String>,
    actor: &User,
    store: &dyn Store,
) -> TrackerResult<Event> {
    let template = EventTemplate::with_id(template_id, store).await?;
    Week::with_id(week_id, store).await?;
    let teams = resolve_teams(&template.tasks, store).await?;

    let new_event = NewEvent {
        week_id,
        name: name
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| template.name.clone()),
        datetime,
        location: location.or_else(|| template.default_location.clone()),
    };

    expand(&template, &teams, new_event, actor, store).await
}

/// Creates every event a week template schedules into `week_id`, returning
/// the names of the created events.
///
/// Entries pointing at templates that no longer exist are skipped. Team
/// references across the remaining entries are checked up front, and the
/// events are then written together so the week is filled completely or not
/// at all.
pub async fn create_from_week_template(
    week_template_id: &str,
    week_id: i64,
    actor: &User,
    store: &dyn Store,
) -> TrackerResult<Vec<String>> {
    let week_template = WeekTemplate::with_id(week_template_id, store).await?;
    let week = Week::with_id(week_id, store).await?;

    let mut planned = Vec::new();
    for entry in &week_template.entries {
        let template = match EventTemplate::resolve(&entry.event_template_id, store).await? {
            Some(template) => template,
            None => continue,
        };

        let date = week
            .start_date
            .0
            .checked_add(Duration::days(entry.day_offset.into()))
            .ok_or_else(|| TrackerError::validation("Event date is out of range"))?;
        let time = parse_time(&entry.default_time)?;
        let datetime = GqlDateTime(PrimitiveDateTime::new(date, time).assume_utc());

        planned.push((template, datetime));
    }

    let stubs: Vec<&TaskStub> = planned
        .iter()
        .flat_map(|(template, _): &(EventTemplate, GqlDateTime)| template.tasks.iter())
        .collect();
    let teams = resolve_teams(stubs, store).await?;

    let batch = planned
        .iter()
        .map(|(template, datetime)| {
            let new_event = NewEvent {
                week_id,
                name: template.name.clone(),
                datetime: *datetime,
                location: template.default_location.clone(),
            };
            (new_event, task_drafts(template, &teams))
        })
        .collect();
    let events = store.insert_events(batch).await?;

    for ((template, _), event) in planned.iter().zip(&events) {
        log_applied(template, event, actor, store).await;
    }

    Ok(events.into_iter().map(|event| event.name).collect())
}
