use async_graphql::SimpleObject;

use crate::db::Store;
use crate::error::{TrackerError, TrackerResult};
use crate::models::audit::NewAuditLog;
use crate::models::member::User;
use crate::models::semester::Semester;

/// The set of users taking part in a semester.
///
/// Non-admins who are not on the roster of the active semester see nothing on
/// their dashboard, even for tasks assigned to them directly.
pub struct Roster;

/// How many users a roster change touched
#[derive(SimpleObject, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RosterChange {
    /// Users newly placed on the roster
    pub added: i32,
    /// Users that were unknown or already on the roster
    pub skipped: i32,
}

impl Roster {
    pub async fn members(semester_id: i64, store: &dyn Store) -> TrackerResult<Vec<User>> {
        Semester::with_id(semester_id, store).await?;
        store.roster(semester_id).await
    }

    /// Non-admin users not yet on the semester's roster.
    pub async fn available(semester_id: i64, store: &dyn Store) -> TrackerResult<Vec<User>> {
        let roster = Self::members(semester_id, store).await?;

        Ok(store
            .users()
            .await?
            .into_iter()
            .filter(|user| !user.is_admin() && !roster.iter().any(|member| member.id == user.id))
            .collect())
    }

    pub async fn add(
        semester_id: i64,
        user_ids: &[i64],
        actor: &User,
        store: &dyn Store,
    ) -> TrackerResult<RosterChange> {
        let semester = Semester::with_id(semester_id, store).await?;
        let mut change = RosterChange::default();

        for &user_id in user_ids {
            if store.user(user_id).await?.is_some()
                && store.add_to_roster(semester_id, user_id).await?
            {
                change.added += 1;
            } else {
                change.skipped += 1;
            }
        }

        NewAuditLog::new("ROSTER_ADD", "semester")
            .entity(semester.id, &semester.name)
            .by(actor)
            .details(format!("added {}, skipped {}", change.added, change.skipped))
            .log(store)
            .await;

        Ok(change)
    }

    pub async fn add_all(
        semester_id: i64,
        actor: &User,
        store: &dyn Store,
    ) -> TrackerResult<RosterChange> {
        let user_ids = store
            .users()
            .await?
            .into_iter()
            .filter(|user| !user.is_admin())
            .map(|user| user.id)
            .collect::<Vec<_>>();

        Self::add(semester_id, &user_ids, actor, store).await
    }

    pub async fn remove(
        semester_id: i64,
        user_id: i64,
        actor: &User,
        store: &dyn Store,
    ) -> TrackerResult<()> {
        let semester = Semester::with_id(semester_id, store).await?;
        if !store.remove_from_roster(semester_id, user_id).await? {
            return Err(TrackerError::not_found("User in roster"));
        }

        NewAuditLog::new("ROSTER_REMOVE", "semester")
            .entity(semester.id, &semester.name)
            .by(actor)
            .details(format!("user {user_id}"))
            .log(store)
            .await;

        Ok(())
    }
}
