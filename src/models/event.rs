use async_graphql::{
    ComplexObject, Context, InputObject, MaybeUndefined, Result, ResultExt, SimpleObject,
};

use crate::db::{self, Store};
use crate::error::{TrackerError, TrackerResult};
use crate::models::audit::NewAuditLog;
use crate::models::member::User;
use crate::models::task::Task;
use crate::models::week::Week;
use crate::models::GqlDateTime;
use crate::util::{field_update, require_non_empty};

#[derive(SimpleObject, sqlx::FromRow, Clone, Debug, PartialEq, Eq)]
#[graphql(complex)]
pub struct Event {
    pub id: i64,
    pub week_id: i64,
    /// The name of the event
    pub name: String,
    /// When the event starts
    pub datetime: GqlDateTime,
    /// Where the event is held
    pub location: Option<String>,
}

#[ComplexObject]
impl Event {
    /// The tasks on the event that the current user may see
    pub async fn tasks(&self, ctx: &Context<'_>) -> Result<Vec<Task>> {
        let user = ctx.data::<User>()?;
        Task::for_event(self.id, user, db::from_ctx(ctx)).await.extend()
    }
}

impl Event {
    pub async fn with_id(id: i64, store: &dyn Store) -> TrackerResult<Self> {
        store
            .event(id)
            .await?
            .ok_or_else(|| TrackerError::not_found(format!("Event {id}")))
    }

    pub async fn for_week(week_id: i64, store: &dyn Store) -> TrackerResult<Vec<Self>> {
        Week::with_id(week_id, store).await?;
        store.events(week_id).await
    }

    pub async fn create(new_event: NewEvent, actor: &User, store: &dyn Store) -> TrackerResult<Self> {
        Week::with_id(new_event.week_id, store).await?;
        let new_event = NewEvent {
            name: require_non_empty(&new_event.name, "Event name")?,
            ..new_event
        };

        let event = store.insert_event(&new_event, Vec::new()).await?;
        NewAuditLog::new("EVENT_CREATE", "event")
            .entity(event.id, &event.name)
            .by(actor)
            .log(store)
            .await;

        Ok(event)
    }

    pub async fn update(
        id: i64,
        update: EventUpdate,
        actor: &User,
        store: &dyn Store,
    ) -> TrackerResult<Self> {
        let mut event = Self::with_id(id, store).await?;

        if let Some(name) = update.name {
            event.name = require_non_empty(&name, "Event name")?;
        }
        if let Some(datetime) = update.datetime {
            event.datetime = datetime;
        }
        if let Some(location) = field_update(update.location) {
            event.location = location;
        }
        if let Some(week_id) = update.week_id {
            Week::with_id(week_id, store).await?;
            event.week_id = week_id;
        }

        store.save_event(&event).await?;
        NewAuditLog::new("EVENT_UPDATE", "event")
            .entity(event.id, &event.name)
            .by(actor)
            .log(store)
            .await;

        Ok(event)
    }

    /// Deletes the event and all of its tasks.
    pub async fn delete(id: i64, actor: &User, store: &dyn Store) -> TrackerResult<()> {
        let event = Self::with_id(id, store).await?;
        store.delete_event(id).await?;

        NewAuditLog::new("EVENT_DELETE", "event")
            .entity(event.id, &event.name)
            .by(actor)
            .log(store)
            .await;

        Ok(())
    }
}

#[derive(InputObject, Clone, Debug)]
pub struct NewEvent {
    pub week_id: i64,
    pub name: String,
    pub datetime: GqlDateTime,
    pub location: Option<String>,
}

#[derive(InputObject, Default)]
pub struct EventUpdate {
    pub week_id: Option<i64>,
    pub name: Option<String>,
    pub datetime: Option<GqlDateTime>,
    pub location: MaybeUndefined<String>,
}
