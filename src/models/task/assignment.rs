//! The three ways a task can be handed out.
//!
//! A task may name one user directly, a whole team, and a pool of users all at
//! once. Each channel on its own is enough to make someone an assignee.

use std::collections::{HashMap, HashSet};

use crate::db::Store;
use crate::error::TrackerResult;
use crate::models::member::User;
use crate::models::task::Task;

/// One pool row: `user_id` may work on `task_id`
#[derive(sqlx::FromRow, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskAssignment {
    pub task_id: i64,
    pub user_id: i64,
}

/// Everyone a task is handed to, across all three channels
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Assignees {
    pub user_id: Option<i64>,
    pub team_id: Option<i64>,
    pub pool: Vec<i64>,
}

impl Assignees {
    /// Builds the assignees from a task and its already-loaded pool.
    pub fn new(task: &Task, pool: Vec<i64>) -> Self {
        Self {
            user_id: task.assigned_to,
            team_id: task.assigned_team_id,
            pool,
        }
    }

    pub async fn for_task(task: &Task, store: &dyn Store) -> TrackerResult<Self> {
        let pool = store
            .pool_assignments(&[task.id])
            .await?
            .into_iter()
            .map(|assignment| assignment.user_id)
            .collect();

        Ok(Self::new(task, pool))
    }

    /// Loads assignees for many tasks with a single pool query.
    pub async fn for_tasks(tasks: &[Task], store: &dyn Store) -> TrackerResult<HashMap<i64, Self>> {
        let task_ids = tasks.iter().map(|task| task.id).collect::<Vec<_>>();
        let mut pools: HashMap<i64, Vec<i64>> = HashMap::new();
        for assignment in store.pool_assignments(&task_ids).await? {
            pools
                .entry(assignment.task_id)
                .or_default()
                .push(assignment.user_id);
        }

        Ok(tasks
            .iter()
            .map(|task| {
                let pool = pools.remove(&task.id).unwrap_or_default();
                (task.id, Self::new(task, pool))
            })
            .collect())
    }

    /// Whether any channel hands the task to `user`. Roles play no part here.
    pub fn includes(&self, user: &User) -> bool {
        let direct = self.user_id == Some(user.id);
        let team = match (self.team_id, user.team_id) {
            (Some(task_team), Some(user_team)) => task_team == user_team,
            _ => false,
        };
        let pooled = self.pool.contains(&user.id);

        direct || team || pooled
    }

    pub fn is_empty(&self) -> bool {
        self.user_id.is_none() && self.team_id.is_none() && self.pool.is_empty()
    }

    /// Resolves every channel to concrete users, each listed once.
    pub async fn members(&self, store: &dyn Store) -> TrackerResult<Vec<User>> {
        let mut candidates = Vec::new();
        if let Some(user_id) = self.user_id {
            candidates.extend(store.user(user_id).await?);
        }
        if let Some(team_id) = self.team_id {
            candidates.extend(store.team_members(team_id).await?);
        }
        for &user_id in &self.pool {
            candidates.extend(store.user(user_id).await?);
        }

        let mut seen = HashSet::new();
        candidates.retain(|user| seen.insert(user.id));

        Ok(candidates)
    }

    /// The Discord IDs to mention when reminding the assignees, without repeats.
    pub async fn discord_ids(&self, store: &dyn Store) -> TrackerResult<Vec<String>> {
        let mut ids = Vec::new();
        for user in self.members(store).await? {
            if let Some(discord_id) = user.discord_id {
                if !ids.contains(&discord_id) {
                    ids.push(discord_id);
                }
            }
        }

        Ok(ids)
    }
}
