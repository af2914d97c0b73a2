use async_graphql::{ComplexObject, Context, InputObject, Result, ResultExt, SimpleObject};
use time::Date;

use crate::db::{self, Store};
use crate::error::{TrackerError, TrackerResult};
use crate::models::audit::NewAuditLog;
use crate::models::event::Event;
use crate::models::member::User;
use crate::models::semester::Semester;
use crate::models::GqlDate;

/// One numbered week inside a semester
#[derive(SimpleObject, sqlx::FromRow, Clone, Debug, PartialEq, Eq)]
#[graphql(complex)]
pub struct Week {
    pub id: i64,
    pub semester_id: i64,
    /// Unique within the semester
    pub week_number: i32,
    pub start_date: GqlDate,
    pub end_date: GqlDate,
}

#[ComplexObject]
impl Week {
    /// The week's events in chronological order
    pub async fn events(&self, ctx: &Context<'_>) -> Result<Vec<Event>> {
        db::from_ctx(ctx).events(self.id).await.extend()
    }
}

impl Week {
    pub fn contains(&self, date: Date) -> bool {
        self.start_date.0 <= date && date <= self.end_date.0
    }

    pub async fn with_id(id: i64, store: &dyn Store) -> TrackerResult<Self> {
        store
            .week(id)
            .await?
            .ok_or_else(|| TrackerError::not_found(format!("Week {id}")))
    }

    pub async fn for_semester(semester_id: i64, store: &dyn Store) -> TrackerResult<Vec<Self>> {
        Semester::with_id(semester_id, store).await?;
        store.weeks(semester_id).await
    }

    /// Weeks must run forwards and sit inside their semester.
    fn check_dates(
        start_date: GqlDate,
        end_date: GqlDate,
        semester: &Semester,
    ) -> TrackerResult<()> {
        if start_date > end_date {
            return Err(TrackerError::validation("A week cannot end before it starts"));
        }
        if !semester.contains(start_date.0) || !semester.contains(end_date.0) {
            return Err(TrackerError::validation(format!(
                "Week dates must fall between {} and {}",
                semester.start_date.formatted(),
                semester.end_date.formatted()
            )));
        }

        Ok(())
    }

    pub async fn create(new_week: NewWeek, actor: &User, store: &dyn Store) -> TrackerResult<Self> {
        let semester = Semester::with_id(new_week.semester_id, store).await?;
        Self::check_dates(new_week.start_date, new_week.end_date, &semester)?;

        let week = store.insert_week(&new_week).await?;
        NewAuditLog::new("WEEK_CREATE", "week")
            .entity(week.id, format!("{} week {}", semester.name, week.week_number))
            .by(actor)
            .log(store)
            .await;

        Ok(week)
    }

    pub async fn update(
        id: i64,
        update: WeekUpdate,
        actor: &User,
        store: &dyn Store,
    ) -> TrackerResult<Self> {
        let mut week = Self::with_id(id, store).await?;
        let semester = Semester::with_id(week.semester_id, store).await?;

        if let Some(week_number) = update.week_number {
            week.week_number = week_number;
        }
        if let Some(start_date) = update.start_date {
            week.start_date = start_date;
        }
        if let Some(end_date) = update.end_date {
            week.end_date = end_date;
        }
        Self::check_dates(week.start_date, week.end_date, &semester)?;

        store.save_week(&week).await?;
        NewAuditLog::new("WEEK_UPDATE", "week")
            .entity(week.id, format!("{} week {}", semester.name, week.week_number))
            .by(actor)
            .log(store)
            .await;

        Ok(week)
    }

    /// Deletes the week and every event in it.
    pub async fn delete(id: i64, actor: &User, store: &dyn Store) -> TrackerResult<()> {
        let week = Self::with_id(id, store).await?;
        store.delete_week(id).await?;

        NewAuditLog::new("WEEK_DELETE", "week")
            .entity(week.id, format!("week {}", week.week_number))
            .by(actor)
            .log(store)
            .await;

        Ok(())
    }
}

#[derive(InputObject, Clone, Debug)]
pub struct NewWeek {
    pub semester_id: i64,
    pub week_number: i32,
    pub start_date: GqlDate,
    pub end_date: GqlDate,
}

#[derive(InputObject, Clone, Debug, Default)]
pub struct WeekUpdate {
    pub week_number: Option<i32>,
    pub start_date: Option<GqlDate>,
    pub end_date: Option<GqlDate>,
}
