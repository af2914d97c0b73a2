//! Completion statistics for admins.
//!
//! Every report can be narrowed to one semester; without a semester it covers
//! everything on record.

use async_graphql::SimpleObject;

use crate::db::Store;
use crate::error::TrackerResult;
use crate::models::member::Role;
use crate::models::semester::Semester;
use crate::models::task::assignment::Assignees;
use crate::models::task::{Task, TaskStatus};
use crate::util::completion_rate;

#[derive(SimpleObject, Clone, Debug, PartialEq)]
pub struct OverviewStats {
    pub total_users: i32,
    pub total_semesters: i32,
    pub total_events: i32,
    pub total_tasks: i32,
    pub tasks_completed: i32,
    pub tasks_pending: i32,
    pub tasks_cannot_do: i32,
    /// Percent of tasks done, to one decimal place
    pub completion_rate: f64,
}

#[derive(SimpleObject, Clone, Debug, PartialEq)]
pub struct UserStats {
    pub user_id: i64,
    pub display_name: String,
    pub team_name: Option<String>,
    /// Tasks the user reaches directly, through their team, or through a pool
    pub tasks_assigned: i32,
    pub tasks_completed: i32,
    pub tasks_cannot_do: i32,
    pub completion_rate: f64,
}

#[derive(SimpleObject, Clone, Debug, PartialEq)]
pub struct TeamStats {
    pub team_id: i64,
    pub team_name: String,
    pub member_count: i32,
    pub tasks_assigned: i32,
    pub tasks_completed: i32,
    pub completion_rate: f64,
}

/// The events and tasks a report covers.
struct Scope {
    event_count: usize,
    tasks: Vec<Task>,
}

impl Scope {
    async fn load(semester_id: Option<i64>, store: &dyn Store) -> TrackerResult<Self> {
        let semester_id = match semester_id {
            Some(semester_id) => semester_id,
            None => {
                let tasks = store.all_tasks().await?;
                let mut event_count = 0;
                for semester in store.semesters().await? {
                    for week in store.weeks(semester.id).await? {
                        event_count += store.events(week.id).await?.len();
                    }
                }

                return Ok(Self { event_count, tasks });
            }
        };

        Semester::with_id(semester_id, store).await?;
        let mut scope = Self {
            event_count: 0,
            tasks: Vec::new(),
        };
        for week in store.weeks(semester_id).await? {
            for event in store.events(week.id).await? {
                scope.event_count += 1;
                scope.tasks.extend(store.tasks(event.id).await?);
            }
        }

        Ok(scope)
    }
}

fn count_status<'a>(tasks: impl IntoIterator<Item = &'a Task>, status: TaskStatus) -> usize {
    tasks.into_iter().filter(|task| task.status == status).count()
}

fn as_count(count: usize) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}

impl OverviewStats {
    pub async fn load(semester_id: Option<i64>, store: &dyn Store) -> TrackerResult<Self> {
        let scope = Scope::load(semester_id, store).await?;
        let completed = count_status(&scope.tasks, TaskStatus::Done);

        Ok(Self {
            total_users: as_count(store.users().await?.len()),
            total_semesters: as_count(store.semesters().await?.len()),
            total_events: as_count(scope.event_count),
            total_tasks: as_count(scope.tasks.len()),
            tasks_completed: as_count(completed),
            tasks_pending: as_count(count_status(&scope.tasks, TaskStatus::Pending)),
            tasks_cannot_do: as_count(count_status(&scope.tasks, TaskStatus::CannotDo)),
            completion_rate: completion_rate(completed, scope.tasks.len()),
        })
    }
}

impl UserStats {
    /// One row per member, best completion rate first.
    pub async fn load(semester_id: Option<i64>, store: &dyn Store) -> TrackerResult<Vec<Self>> {
        let scope = Scope::load(semester_id, store).await?;
        let assignees = Assignees::for_tasks(&scope.tasks, store).await?;
        let teams = store.teams().await?;

        let mut stats: Vec<Self> = store
            .users()
            .await?
            .into_iter()
            .filter(|user| user.role != Role::Admin)
            .map(|user| {
                let tasks: Vec<&Task> = scope
                    .tasks
                    .iter()
                    .filter(|task| {
                        assignees
                            .get(&task.id)
                            .map_or(false, |assignees| assignees.includes(&user))
                    })
                    .collect();
                let completed = count_status(tasks.iter().copied(), TaskStatus::Done);

                Self {
                    user_id: user.id,
                    team_name: user.team_id.and_then(|team_id| {
                        teams
                            .iter()
                            .find(|team| team.id == team_id)
                            .map(|team| team.name.clone())
                    }),
                    display_name: user.display_name,
                    tasks_assigned: as_count(tasks.len()),
                    tasks_completed: as_count(completed),
                    tasks_cannot_do: as_count(count_status(tasks.iter().copied(), TaskStatus::CannotDo)),
                    completion_rate: completion_rate(completed, tasks.len()),
                }
            })
            .collect();

        stats.sort_by(|a, b| {
            b.completion_rate
                .total_cmp(&a.completion_rate)
                .then(b.tasks_completed.cmp(&a.tasks_completed))
        });

        Ok(stats)
    }
}

impl TeamStats {
    pub async fn load(semester_id: Option<i64>, store: &dyn Store) -> TrackerResult<Vec<Self>> {
        let scope = Scope::load(semester_id, store).await?;

        let mut stats = Vec::new();
        for team in store.teams().await? {
            let member_count = store.team_members(team.id).await?.len();
            let tasks: Vec<&Task> = scope
                .tasks
                .iter()
                .filter(|task| task.assigned_team_id == Some(team.id))
                .collect();
            let completed = count_status(tasks.iter().copied(), TaskStatus::Done);

            stats.push(Self {
                team_id: team.id,
                team_name: team.name,
                member_count: as_count(member_count),
                tasks_assigned: as_count(tasks.len()),
                tasks_completed: as_count(completed),
                completion_rate: completion_rate(completed, tasks.len()),
            });
        }

        Ok(stats)
    }
}
