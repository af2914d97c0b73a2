use async_graphql::{Context, Json, Object, Result, ResultExt};

use crate::db;
use crate::graphql::guards::{AdminOnly, LoggedIn};
use crate::models::audit::{AuditFilter, AuditLog, AuditLogPage, DEFAULT_PAGE_SIZE};
use crate::models::comment::TaskComment;
use crate::models::dashboard::Dashboard;
use crate::models::event::Event;
use crate::models::export::ExportData;
use crate::models::member::roster::Roster;
use crate::models::member::User;
use crate::models::semester::Semester;
use crate::models::stats::{OverviewStats, TeamStats, UserStats};
use crate::models::task::Task;
use crate::models::team::Team;
use crate::models::template::{EventTemplate, WeekTemplate};
use crate::models::week::Week;
use crate::util::current_time;

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// The currently logged in user
    pub async fn user<'c>(&self, ctx: &'c Context<'c>) -> Option<User> {
        ctx.data_opt::<User>().cloned()
    }

    #[graphql(guard = "LoggedIn")]
    pub async fn me(&self, ctx: &Context<'_>) -> Result<User> {
        Ok(ctx.data::<User>()?.clone())
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn users(&self, ctx: &Context<'_>) -> Result<Vec<User>> {
        User::all(db::from_ctx(ctx)).await.extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn member(&self, ctx: &Context<'_>, id: i64) -> Result<User> {
        User::with_id(id, db::from_ctx(ctx)).await.extend()
    }

    #[graphql(guard = "LoggedIn")]
    pub async fn teams(&self, ctx: &Context<'_>) -> Result<Vec<Team>> {
        Team::all(db::from_ctx(ctx)).await.extend()
    }

    #[graphql(guard = "LoggedIn")]
    pub async fn team(&self, ctx: &Context<'_>, id: i64) -> Result<Team> {
        Team::with_id(id, db::from_ctx(ctx)).await.extend()
    }

    #[graphql(guard = "LoggedIn")]
    pub async fn semesters(&self, ctx: &Context<'_>) -> Result<Vec<Semester>> {
        Semester::all(db::from_ctx(ctx)).await.extend()
    }

    #[graphql(guard = "LoggedIn")]
    pub async fn semester(&self, ctx: &Context<'_>, id: i64) -> Result<Semester> {
        Semester::with_id(id, db::from_ctx(ctx)).await.extend()
    }

    #[graphql(guard = "LoggedIn")]
    pub async fn active_semester(&self, ctx: &Context<'_>) -> Result<Option<Semester>> {
        Semester::active(db::from_ctx(ctx)).await.extend()
    }

    #[graphql(guard = "LoggedIn")]
    pub async fn weeks(&self, ctx: &Context<'_>, semester_id: i64) -> Result<Vec<Week>> {
        Week::for_semester(semester_id, db::from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "LoggedIn")]
    pub async fn week(&self, ctx: &Context<'_>, id: i64) -> Result<Week> {
        Week::with_id(id, db::from_ctx(ctx)).await.extend()
    }

    #[graphql(guard = "LoggedIn")]
    pub async fn events(&self, ctx: &Context<'_>, week_id: i64) -> Result<Vec<Event>> {
        Event::for_week(week_id, db::from_ctx(ctx)).await.extend()
    }

    #[graphql(guard = "LoggedIn")]
    pub async fn event(&self, ctx: &Context<'_>, id: i64) -> Result<Event> {
        Event::with_id(id, db::from_ctx(ctx)).await.extend()
    }

    /// The tasks of an event that the current user may see
    #[graphql(guard = "LoggedIn")]
    pub async fn tasks(&self, ctx: &Context<'_>, event_id: i64) -> Result<Vec<Task>> {
        let user = ctx.data::<User>()?;
        Task::for_event(event_id, user, db::from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "LoggedIn")]
    pub async fn task(&self, ctx: &Context<'_>, id: i64) -> Result<Task> {
        let user = ctx.data::<User>()?;
        Task::viewable(id, user, db::from_ctx(ctx)).await.extend()
    }

    /// The active semester as the current user sees it
    #[graphql(guard = "LoggedIn")]
    pub async fn dashboard(&self, ctx: &Context<'_>) -> Result<Dashboard> {
        let user = ctx.data::<User>()?;
        Dashboard::for_user(user, current_time().date(), db::from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn roster(&self, ctx: &Context<'_>, semester_id: i64) -> Result<Vec<User>> {
        Roster::members(semester_id, db::from_ctx(ctx))
            .await
            .extend()
    }

    /// Members that could still be added to the semester's roster
    #[graphql(guard = "AdminOnly")]
    pub async fn available_users(&self, ctx: &Context<'_>, semester_id: i64) -> Result<Vec<User>> {
        Roster::available(semester_id, db::from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "LoggedIn")]
    pub async fn comments(&self, ctx: &Context<'_>, task_id: i64) -> Result<Vec<TaskComment>> {
        let user = ctx.data::<User>()?;
        TaskComment::for_task(task_id, user, db::from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn event_templates(&self, ctx: &Context<'_>) -> Result<Vec<EventTemplate>> {
        EventTemplate::all(db::from_ctx(ctx)).await.extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn week_templates(&self, ctx: &Context<'_>) -> Result<Vec<WeekTemplate>> {
        WeekTemplate::all(db::from_ctx(ctx)).await.extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn overview_stats(
        &self,
        ctx: &Context<'_>,
        semester_id: Option<i64>,
    ) -> Result<OverviewStats> {
        OverviewStats::load(semester_id, db::from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn user_stats(
        &self,
        ctx: &Context<'_>,
        semester_id: Option<i64>,
    ) -> Result<Vec<UserStats>> {
        UserStats::load(semester_id, db::from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn team_stats(
        &self,
        ctx: &Context<'_>,
        semester_id: Option<i64>,
    ) -> Result<Vec<TeamStats>> {
        TeamStats::load(semester_id, db::from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn audit_logs(
        &self,
        ctx: &Context<'_>,
        #[graphql(default = 1)] page: i32,
        #[graphql(default_with = "DEFAULT_PAGE_SIZE")] per_page: i32,
        action: Option<String>,
        entity_type: Option<String>,
        user_id: Option<i64>,
    ) -> Result<AuditLogPage> {
        let filter = AuditFilter {
            action,
            entity_type,
            user_id,
        };

        AuditLog::page(filter, page, per_page, db::from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn audit_actions(&self, ctx: &Context<'_>) -> Result<Vec<String>> {
        db::from_ctx(ctx).audit_actions().await.extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn audit_entity_types(&self, ctx: &Context<'_>) -> Result<Vec<String>> {
        db::from_ctx(ctx).audit_entity_types().await.extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn export_semester(&self, ctx: &Context<'_>, id: i64) -> Result<Json<ExportData>> {
        ExportData::semester(id, db::from_ctx(ctx))
            .await
            .map(Json)
            .extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn export_all(&self, ctx: &Context<'_>) -> Result<Json<ExportData>> {
        ExportData::all(db::from_ctx(ctx)).await.map(Json).extend()
    }
}
