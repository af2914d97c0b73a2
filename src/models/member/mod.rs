use async_graphql::{
    ComplexObject, Context, Enum, InputObject, MaybeUndefined, Result, ResultExt, SimpleObject,
};
use serde::{Deserialize, Serialize};

use crate::db::{self, Store};
use crate::error::{TrackerError, TrackerResult};
use crate::models::audit::NewAuditLog;
use crate::models::team::Team;
use crate::models::GqlDateTime;
use crate::util::{field_update, hash_password, require_non_empty, validate_discord_id};

pub mod roster;
pub mod session;

#[derive(SimpleObject, sqlx::FromRow, Clone, Debug)]
#[graphql(complex)]
pub struct User {
    pub id: i64,
    /// The login name, which must be unique
    pub username: String,
    /// The name shown to other members
    pub display_name: String,
    /// The member's Discord user ID, used to mention them in reminders
    pub discord_id: Option<String>,
    pub role: Role,
    /// The single team the user belongs to, if any
    pub team_id: Option<i64>,
    pub created_at: GqlDateTime,

    #[graphql(skip)]
    pub password_hash: String,
}

#[ComplexObject]
impl User {
    /// The team the user belongs to
    pub async fn team(&self, ctx: &Context<'_>) -> Result<Option<Team>> {
        match self.team_id {
            Some(team_id) => db::from_ctx(ctx).team(team_id).await.extend(),
            None => Ok(None),
        }
    }
}

/// What a user is allowed to do
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Enum, sqlx::Type, Serialize, Deserialize,
)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Manages semesters, events and tasks and sees everything
    Admin,
    /// Sees and works on the tasks assigned to them
    Member,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub async fn with_id(id: i64, store: &dyn Store) -> TrackerResult<Self> {
        store
            .user(id)
            .await?
            .ok_or_else(|| TrackerError::not_found(format!("User {id}")))
    }

    pub async fn all(store: &dyn Store) -> TrackerResult<Vec<Self>> {
        store.users().await
    }

    pub async fn login_is_valid(
        username: &str,
        password: &str,
        store: &dyn Store,
    ) -> TrackerResult<Option<Self>> {
        let user = match store.user_by_username(username.trim()).await? {
            Some(user) => user,
            None => return Ok(None),
        };

        let valid = bcrypt::verify(password, &user.password_hash).map_err(|err| {
            TrackerError::Internal(anyhow::anyhow!("Failed to verify password: {err}"))
        })?;

        Ok(valid.then(|| user))
    }

    pub async fn create(new_user: NewUser, actor: &User, store: &dyn Store) -> TrackerResult<Self> {
        let username = require_non_empty(&new_user.username, "Username")?;
        let display_name = require_non_empty(&new_user.display_name, "Display name")?;
        let discord_id = validate_discord_id(new_user.discord_id.as_deref())?;

        if store.user_by_username(&username).await?.is_some() {
            return Err(TrackerError::conflict(format!(
                "Username {username} is already taken"
            )));
        }
        if let Some(team_id) = new_user.team_id {
            Team::with_id(team_id, store).await?;
        }

        let user = store
            .insert_user(UserDraft {
                username,
                display_name,
                discord_id,
                role: new_user.role,
                team_id: new_user.team_id,
                password_hash: hash_password(&new_user.password)?,
            })
            .await?;

        NewAuditLog::new("USER_CREATE", "user")
            .entity(user.id, &user.username)
            .by(actor)
            .log(store)
            .await;

        Ok(user)
    }

    pub async fn update(
        id: i64,
        update: UserUpdate,
        actor: &User,
        store: &dyn Store,
    ) -> TrackerResult<Self> {
        let mut user = Self::with_id(id, store).await?;

        if let Some(username) = update.username {
            let username = require_non_empty(&username, "Username")?;
            if username != user.username && store.user_by_username(&username).await?.is_some() {
                return Err(TrackerError::conflict(format!(
                    "Username {username} is already taken"
                )));
            }
            user.username = username;
        }
        if let Some(display_name) = update.display_name {
            user.display_name = require_non_empty(&display_name, "Display name")?;
        }
        if let Some(discord_id) = field_update(update.discord_id) {
            user.discord_id = validate_discord_id(discord_id.as_deref())?;
        }
        if let Some(role) = update.role {
            user.role = role;
        }
        if let Some(team_id) = field_update(update.team_id) {
            if let Some(team_id) = team_id {
                Team::with_id(team_id, store).await?;
            }
            user.team_id = team_id;
        }
        if let Some(password) = update.password {
            user.password_hash = hash_password(&password)?;
        }

        store.save_user(&user).await?;
        NewAuditLog::new("USER_UPDATE", "user")
            .entity(user.id, &user.username)
            .by(actor)
            .log(store)
            .await;

        Ok(user)
    }

    pub async fn delete(id: i64, actor: &User, store: &dyn Store) -> TrackerResult<()> {
        if id == actor.id {
            return Err(TrackerError::forbidden("You cannot delete your own account"));
        }

        let user = Self::with_id(id, store).await?;
        store.delete_user(id).await?;
        NewAuditLog::new("USER_DELETE", "user")
            .entity(user.id, &user.username)
            .by(actor)
            .log(store)
            .await;

        Ok(())
    }

    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
        store: &dyn Store,
    ) -> TrackerResult<()> {
        let valid = bcrypt::verify(current_password, &self.password_hash).map_err(|err| {
            TrackerError::Internal(anyhow::anyhow!("Failed to verify password: {err}"))
        })?;
        if !valid {
            return Err(TrackerError::Unauthorized(
                "Current password is incorrect".to_owned(),
            ));
        }

        let mut user = self.clone();
        user.password_hash = hash_password(new_password)?;
        store.save_user(&user).await
    }

    /// Creates the bootstrap admin account unless a user with that name exists.
    pub async fn ensure_admin(
        username: &str,
        password: &str,
        discord_id: Option<&str>,
        store: &dyn Store,
    ) -> TrackerResult<Option<Self>> {
        if store.user_by_username(username).await?.is_some() {
            return Ok(None);
        }

        let admin = store
            .insert_user(UserDraft {
                username: username.to_owned(),
                display_name: "Administrator".to_owned(),
                discord_id: validate_discord_id(discord_id)?,
                role: Role::Admin,
                team_id: None,
                password_hash: hash_password(password)?,
            })
            .await?;

        Ok(Some(admin))
    }
}

/// A user as it is about to be stored, with the password already hashed
#[derive(Clone, Debug)]
pub struct UserDraft {
    pub username: String,
    pub display_name: String,
    pub discord_id: Option<String>,
    pub role: Role,
    pub team_id: Option<i64>,
    pub password_hash: String,
}

#[derive(InputObject)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub display_name: String,
    pub discord_id: Option<String>,
    #[graphql(default_with = "Role::Member")]
    pub role: Role,
    pub team_id: Option<i64>,
}

#[derive(InputObject, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub discord_id: MaybeUndefined<String>,
    pub role: Option<Role>,
    pub team_id: MaybeUndefined<i64>,
    pub password: Option<String>,
}
