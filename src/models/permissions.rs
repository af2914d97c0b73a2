//! Who may see and change a task.

use crate::db::Store;
use crate::error::{TrackerError, TrackerResult};
use crate::models::member::User;
use crate::models::task::assignment::Assignees;
use crate::models::task::Task;

/// Admins may change any task; everyone else needs one of the three
/// assignment channels. Roster membership is not consulted.
pub fn can_modify_task(user: &User, assignees: &Assignees) -> bool {
    user.is_admin() || assignees.includes(user)
}

/// Reading a task and its comments follows the same rule as changing it.
pub fn can_view_task(user: &User, assignees: &Assignees) -> bool {
    can_modify_task(user, assignees)
}

pub async fn ensure_can_modify(task: &Task, user: &User, store: &dyn Store) -> TrackerResult<()> {
    if user.is_admin() || can_modify_task(user, &Assignees::for_task(task, store).await?) {
        Ok(())
    } else {
        Err(TrackerError::forbidden("Not authorized to modify this task"))
    }
}

pub async fn ensure_can_view(task: &Task, user: &User, store: &dyn Store) -> TrackerResult<()> {
    if user.is_admin() || can_view_task(user, &Assignees::for_task(task, store).await?) {
        Ok(())
    } else {
        Err(TrackerError::forbidden("Not authorized to view this task"))
    }
}
