use async_graphql::{ComplexObject, Context, InputObject, Result, ResultExt, SimpleObject};

use crate::db::{self, Store};
use crate::error::{TrackerError, TrackerResult};
use crate::models::audit::NewAuditLog;
use crate::models::member::User;
use crate::util::require_non_empty;

pub const DEFAULT_TEAM_COLOR: &str = "#6B7280";

/// A standing group of members that tasks can be handed to as a whole
#[derive(SimpleObject, sqlx::FromRow, Clone, Debug, PartialEq, Eq)]
#[graphql(complex)]
pub struct Team {
    pub id: i64,
    /// The team's name, unique ignoring case
    pub name: String,
    /// A hex color used to tag the team's tasks
    pub color: String,
}

#[ComplexObject]
impl Team {
    /// Everyone currently on the team
    pub async fn members(&self, ctx: &Context<'_>) -> Result<Vec<User>> {
        db::from_ctx(ctx).team_members(self.id).await.extend()
    }
}

impl Team {
    pub async fn with_id(id: i64, store: &dyn Store) -> TrackerResult<Self> {
        store
            .team(id)
            .await?
            .ok_or_else(|| TrackerError::not_found(format!("Team {id}")))
    }

    pub async fn all(store: &dyn Store) -> TrackerResult<Vec<Self>> {
        store.teams().await
    }

    async fn ensure_name_free(name: &str, except: Option<i64>, store: &dyn Store) -> TrackerResult<()> {
        match store.team_by_name(name).await? {
            Some(existing) if Some(existing.id) != except => Err(TrackerError::conflict(format!(
                "A team named {} already exists",
                existing.name
            ))),
            _ => Ok(()),
        }
    }

    pub async fn create(new_team: NewTeam, actor: &User, store: &dyn Store) -> TrackerResult<Self> {
        let name = require_non_empty(&new_team.name, "Team name")?;
        Self::ensure_name_free(&name, None, store).await?;

        let color = new_team
            .color
            .as_deref()
            .map(str::trim)
            .filter(|color| !color.is_empty())
            .unwrap_or(DEFAULT_TEAM_COLOR);
        let team = store.insert_team(&name, color).await?;

        NewAuditLog::new("TEAM_CREATE", "team")
            .entity(team.id, &team.name)
            .by(actor)
            .log(store)
            .await;

        Ok(team)
    }

    pub async fn update(
        id: i64,
        update: TeamUpdate,
        actor: &User,
        store: &dyn Store,
    ) -> TrackerResult<Self> {
        let mut team = Self::with_id(id, store).await?;

        if let Some(name) = update.name {
            let name = require_non_empty(&name, "Team name")?;
            Self::ensure_name_free(&name, Some(id), store).await?;
            team.name = name;
        }
        if let Some(color) = update.color {
            team.color = require_non_empty(&color, "Team color")?;
        }

        store.save_team(&team).await?;
        NewAuditLog::new("TEAM_UPDATE", "team")
            .entity(team.id, &team.name)
            .by(actor)
            .log(store)
            .await;

        Ok(team)
    }

    /// Deletes the team; its members stay but lose their team.
    pub async fn delete(id: i64, actor: &User, store: &dyn Store) -> TrackerResult<()> {
        let team = Self::with_id(id, store).await?;
        store.delete_team(id).await?;

        NewAuditLog::new("TEAM_DELETE", "team")
            .entity(team.id, &team.name)
            .by(actor)
            .log(store)
            .await;

        Ok(())
    }
}

#[derive(InputObject)]
pub struct NewTeam {
    pub name: String,
    pub color: Option<String>,
}

#[derive(InputObject, Default)]
pub struct TeamUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
}
