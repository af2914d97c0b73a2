use async_graphql::{ComplexObject, Context, InputObject, Result, ResultExt, SimpleObject};
use time::Date;

use crate::db::{self, Store};
use crate::error::{TrackerError, TrackerResult};
use crate::models::audit::NewAuditLog;
use crate::models::member::User;
use crate::models::week::Week;
use crate::models::GqlDate;
use crate::util::require_non_empty;

#[derive(SimpleObject, sqlx::FromRow, Clone, Debug, PartialEq, Eq)]
#[graphql(complex)]
pub struct Semester {
    pub id: i64,
    /// The name of the semester
    pub name: String,
    /// When the semester starts
    pub start_date: GqlDate,
    /// When the semester ends
    pub end_date: GqlDate,
    /// Whether this is the current semester
    pub is_active: bool,
}

#[ComplexObject]
impl Semester {
    /// The weeks of the semester in order
    pub async fn weeks(&self, ctx: &Context<'_>) -> Result<Vec<Week>> {
        db::from_ctx(ctx).weeks(self.id).await.extend()
    }
}

impl Semester {
    pub fn contains(&self, date: Date) -> bool {
        self.start_date.0 <= date && date <= self.end_date.0
    }

    pub async fn with_id(id: i64, store: &dyn Store) -> TrackerResult<Self> {
        store
            .semester(id)
            .await?
            .ok_or_else(|| TrackerError::not_found(format!("Semester {id}")))
    }

    /// The active semester, if one is set. No active semester is not an error.
    pub async fn active(store: &dyn Store) -> TrackerResult<Option<Self>> {
        store.active_semester().await
    }

    pub async fn all(store: &dyn Store) -> TrackerResult<Vec<Self>> {
        store.semesters().await
    }

    fn check_dates(start_date: GqlDate, end_date: GqlDate) -> TrackerResult<()> {
        if start_date > end_date {
            Err(TrackerError::validation(
                "A semester cannot end before it starts",
            ))
        } else {
            Ok(())
        }
    }

    pub async fn create(
        new_semester: NewSemester,
        actor: &User,
        store: &dyn Store,
    ) -> TrackerResult<Self> {
        let name = require_non_empty(&new_semester.name, "Semester name")?;
        Self::check_dates(new_semester.start_date, new_semester.end_date)?;
        if store.semester_by_name(&name).await?.is_some() {
            return Err(TrackerError::conflict(format!(
                "A semester already exists named {name}"
            )));
        }

        let semester = store
            .insert_semester(&NewSemester {
                name,
                ..new_semester
            })
            .await?;

        NewAuditLog::new("SEMESTER_CREATE", "semester")
            .entity(semester.id, &semester.name)
            .by(actor)
            .log(store)
            .await;

        Ok(semester)
    }

    pub async fn update(
        id: i64,
        update: SemesterUpdate,
        actor: &User,
        store: &dyn Store,
    ) -> TrackerResult<Self> {
        let mut semester = Self::with_id(id, store).await?;

        if let Some(name) = update.name {
            let name = require_non_empty(&name, "Semester name")?;
            if name != semester.name && store.semester_by_name(&name).await?.is_some() {
                return Err(TrackerError::conflict(format!(
                    "Another semester is already named {name}"
                )));
            }
            semester.name = name;
        }
        if let Some(start_date) = update.start_date {
            semester.start_date = start_date;
        }
        if let Some(end_date) = update.end_date {
            semester.end_date = end_date;
        }
        if let Some(is_active) = update.is_active {
            semester.is_active = is_active;
        }
        Self::check_dates(semester.start_date, semester.end_date)?;

        store.save_semester(&semester).await?;
        NewAuditLog::new("SEMESTER_UPDATE", "semester")
            .entity(semester.id, &semester.name)
            .by(actor)
            .log(store)
            .await;

        Ok(semester)
    }

    /// Makes this the only active semester.
    pub async fn activate(id: i64, actor: &User, store: &dyn Store) -> TrackerResult<Self> {
        let update = SemesterUpdate {
            is_active: Some(true),
            ..Default::default()
        };

        Self::update(id, update, actor, store).await
    }

    /// Deletes the semester along with its weeks, events, tasks and roster.
    pub async fn delete(id: i64, actor: &User, store: &dyn Store) -> TrackerResult<()> {
        let semester = Self::with_id(id, store).await?;
        store.delete_semester(id).await?;

        NewAuditLog::new("SEMESTER_DELETE", "semester")
            .entity(semester.id, &semester.name)
            .by(actor)
            .log(store)
            .await;

        Ok(())
    }
}

#[derive(InputObject, Clone, Debug)]
pub struct NewSemester {
    pub name: String,
    pub start_date: GqlDate,
    pub end_date: GqlDate,
    /// New semesters are active unless told otherwise
    #[graphql(default = true)]
    pub is_active: bool,
}

#[derive(InputObject, Clone, Debug, Default)]
pub struct SemesterUpdate {
    pub name: Option<String>,
    pub start_date: Option<GqlDate>,
    pub end_date: Option<GqlDate>,
    pub is_active: Option<bool>,
}
