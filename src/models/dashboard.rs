//! The per-user view of the active semester.

use async_graphql::SimpleObject;
use time::Date;

use crate::db::Store;
use crate::error::TrackerResult;
use crate::models::event::Event;
use crate::models::member::{Role, User};
use crate::models::semester::Semester;
use crate::models::task::Task;
use crate::models::week::Week;

#[derive(SimpleObject, Debug)]
pub struct Dashboard {
    /// The active semester, if one is set
    pub semester: Option<Semester>,
    /// The role of the user the dashboard was built for
    pub user_role: Role,
    pub weeks: Vec<DashboardWeek>,
}

#[derive(SimpleObject, Debug)]
pub struct DashboardWeek {
    pub week: Week,
    /// Whether today falls inside this week
    pub is_current: bool,
    pub events: Vec<DashboardEvent>,
}

#[derive(SimpleObject, Debug)]
pub struct DashboardEvent {
    pub event: Event,
    pub tasks: Vec<Task>,
}

impl Dashboard {
    /// Builds the dashboard for `user` as of `today`.
    ///
    /// Admins see every event. Other users must be on the semester's roster and
    /// only see the tasks handed to them; events left empty are dropped.
    pub async fn for_user(user: &User, today: Date, store: &dyn Store) -> TrackerResult<Self> {
        let semester = match Semester::active(store).await? {
            Some(semester) => semester,
            None => {
                return Ok(Self {
                    semester: None,
                    user_role: user.role,
                    weeks: Vec::new(),
                })
            }
        };

        if !user.is_admin() && !store.on_roster(semester.id, user.id).await? {
            return Ok(Self {
                semester: Some(semester),
                user_role: user.role,
                weeks: Vec::new(),
            });
        }

        let mut weeks = Vec::new();
        for week in store.weeks(semester.id).await? {
            let mut events = Vec::new();
            for event in store.events(week.id).await? {
                let tasks = Task::visible_to(store.tasks(event.id).await?, user, store).await?;
                if user.is_admin() || !tasks.is_empty() {
                    events.push(DashboardEvent { event, tasks });
                }
            }

            weeks.push(DashboardWeek {
                is_current: week.contains(today),
                week,
                events,
            });
        }

        Ok(Self {
            semester: Some(semester),
            user_role: user.role,
            weeks,
        })
    }
}
