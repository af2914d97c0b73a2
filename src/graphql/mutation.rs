use async_graphql::{Context, Json, Object, Result, ResultExt};

use crate::db;
use crate::graphql::guards::{AdminOnly, LoggedIn};
use crate::graphql::{notifier_from_ctx, SUCCESS_MESSAGE};
use crate::models::comment::TaskComment;
use crate::models::event::{Event, EventUpdate, NewEvent};
use crate::models::export::{ExportData, ImportResult};
use crate::models::member::roster::{Roster, RosterChange};
use crate::models::member::session::Session;
use crate::models::member::{NewUser, User, UserUpdate};
use crate::models::semester::{NewSemester, Semester, SemesterUpdate};
use crate::models::task::{NewTask, Task, TaskUpdate};
use crate::models::team::{NewTeam, Team, TeamUpdate};
use crate::models::template::expand;
use crate::models::template::{
    EventTemplate, EventTemplateInput, EventTemplateUpdate, NewWeekTemplate, WeekTemplate,
};
use crate::models::week::{NewWeek, Week, WeekUpdate};
use crate::models::GqlDateTime;

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Gets a login token on successful login
    pub async fn login(
        &self,
        ctx: &Context<'_>,
        username: String,
        password: String,
    ) -> Result<String> {
        Session::login(&username, &password, db::from_ctx(ctx))
            .await
            .extend()
    }

    /// Logs the user out of every session
    #[graphql(guard = "LoggedIn")]
    pub async fn logout(&self, ctx: &Context<'_>) -> Result<&'static str> {
        let user = ctx.data::<User>()?;
        Session::remove(user, db::from_ctx(ctx)).await.extend()?;

        Ok(SUCCESS_MESSAGE)
    }

    #[graphql(guard = "LoggedIn")]
    pub async fn change_password(
        &self,
        ctx: &Context<'_>,
        current_password: String,
        new_password: String,
    ) -> Result<&'static str> {
        let user = ctx.data::<User>()?;
        user.change_password(&current_password, &new_password, db::from_ctx(ctx))
            .await
            .extend()?;

        Ok(SUCCESS_MESSAGE)
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn create_user(&self, ctx: &Context<'_>, new_user: NewUser) -> Result<User> {
        let actor = ctx.data::<User>()?;
        User::create(new_user, actor, db::from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn update_user(
        &self,
        ctx: &Context<'_>,
        id: i64,
        update: UserUpdate,
    ) -> Result<User> {
        let actor = ctx.data::<User>()?;
        User::update(id, update, actor, db::from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn delete_user(&self, ctx: &Context<'_>, id: i64) -> Result<&'static str> {
        let actor = ctx.data::<User>()?;
        User::delete(id, actor, db::from_ctx(ctx)).await.extend()?;

        Ok(SUCCESS_MESSAGE)
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn create_team(&self, ctx: &Context<'_>, new_team: NewTeam) -> Result<Team> {
        let actor = ctx.data::<User>()?;
        Team::create(new_team, actor, db::from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn update_team(
        &self,
        ctx: &Context<'_>,
        id: i64,
        update: TeamUpdate,
    ) -> Result<Team> {
        let actor = ctx.data::<User>()?;
        Team::update(id, update, actor, db::from_ctx(ctx))
            .await
            .extend()
    }

    /// Deletes the team, leaving its members without one
    #[graphql(guard = "AdminOnly")]
    pub async fn delete_team(&self, ctx: &Context<'_>, id: i64) -> Result<&'static str> {
        let actor = ctx.data::<User>()?;
        Team::delete(id, actor, db::from_ctx(ctx)).await.extend()?;

        Ok(SUCCESS_MESSAGE)
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn create_semester(
        &self,
        ctx: &Context<'_>,
        new_semester: NewSemester,
    ) -> Result<Semester> {
        let actor = ctx.data::<User>()?;
        Semester::create(new_semester, actor, db::from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn update_semester(
        &self,
        ctx: &Context<'_>,
        id: i64,
        update: SemesterUpdate,
    ) -> Result<Semester> {
        let actor = ctx.data::<User>()?;
        Semester::update(id, update, actor, db::from_ctx(ctx))
            .await
            .extend()
    }

    /// Makes this the only active semester
    #[graphql(guard = "AdminOnly")]
    pub async fn activate_semester(&self, ctx: &Context<'_>, id: i64) -> Result<Semester> {
        let actor = ctx.data::<User>()?;
        Semester::activate(id, actor, db::from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn delete_semester(&self, ctx: &Context<'_>, id: i64) -> Result<&'static str> {
        let actor = ctx.data::<User>()?;
        Semester::delete(id, actor, db::from_ctx(ctx))
            .await
            .extend()?;

        Ok(SUCCESS_MESSAGE)
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn create_week(&self, ctx: &Context<'_>, new_week: NewWeek) -> Result<Week> {
        let actor = ctx.data::<User>()?;
        Week::create(new_week, actor, db::from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn update_week(
        &self,
        ctx: &Context<'_>,
        id: i64,
        update: WeekUpdate,
    ) -> Result<Week> {
        let actor = ctx.data::<User>()?;
        Week::update(id, update, actor, db::from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn delete_week(&self, ctx: &Context<'_>, id: i64) -> Result<&'static str> {
        let actor = ctx.data::<User>()?;
        Week::delete(id, actor, db::from_ctx(ctx)).await.extend()?;

        Ok(SUCCESS_MESSAGE)
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn create_event(&self, ctx: &Context<'_>, new_event: NewEvent) -> Result<Event> {
        let actor = ctx.data::<User>()?;
        Event::create(new_event, actor, db::from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn update_event(
        &self,
        ctx: &Context<'_>,
        id: i64,
        update: EventUpdate,
    ) -> Result<Event> {
        let actor = ctx.data::<User>()?;
        Event::update(id, update, actor, db::from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn delete_event(&self, ctx: &Context<'_>, id: i64) -> Result<&'static str> {
        let actor = ctx.data::<User>()?;
        Event::delete(id, actor, db::from_ctx(ctx)).await.extend()?;

        Ok(SUCCESS_MESSAGE)
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn create_task(&self, ctx: &Context<'_>, new_task: NewTask) -> Result<Task> {
        let actor = ctx.data::<User>()?;
        Task::create(new_task, actor, db::from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn update_task(
        &self,
        ctx: &Context<'_>,
        id: i64,
        update: TaskUpdate,
    ) -> Result<Task> {
        let actor = ctx.data::<User>()?;
        Task::update(id, update, actor, db::from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn delete_task(&self, ctx: &Context<'_>, id: i64) -> Result<&'static str> {
        let actor = ctx.data::<User>()?;
        Task::delete(id, actor, db::from_ctx(ctx)).await.extend()?;

        Ok(SUCCESS_MESSAGE)
    }

    /// Sets or clears the one-shot reminder, which may then fire again
    #[graphql(guard = "LoggedIn")]
    pub async fn set_task_reminder(
        &self,
        ctx: &Context<'_>,
        id: i64,
        reminder_time: Option<GqlDateTime>,
    ) -> Result<Task> {
        let actor = ctx.data::<User>()?;
        Task::set_reminder(id, reminder_time, actor, db::from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "LoggedIn")]
    pub async fn mark_task_done(&self, ctx: &Context<'_>, id: i64) -> Result<Task> {
        let actor = ctx.data::<User>()?;
        Task::mark_done(id, actor, db::from_ctx(ctx))
            .await
            .extend()
    }

    /// Marks the task as impossible and alerts the admins
    #[graphql(guard = "LoggedIn")]
    pub async fn mark_task_cannot_do(
        &self,
        ctx: &Context<'_>,
        id: i64,
        reason: String,
    ) -> Result<Task> {
        let actor = ctx.data::<User>()?;
        Task::mark_cannot_do(id, actor, &reason, db::from_ctx(ctx), notifier_from_ctx(ctx))
            .await
            .extend()
    }

    /// Puts a resolved task back to pending
    #[graphql(guard = "LoggedIn")]
    pub async fn undo_task(&self, ctx: &Context<'_>, id: i64) -> Result<Task> {
        let actor = ctx.data::<User>()?;
        Task::undo(id, actor, db::from_ctx(ctx)).await.extend()
    }

    /// Pings the task's assignees now, returning whether the message went out
    #[graphql(guard = "AdminOnly")]
    pub async fn send_reminder_now(
        &self,
        ctx: &Context<'_>,
        id: i64,
        message: Option<String>,
    ) -> Result<bool> {
        Task::send_reminder_now(id, message, db::from_ctx(ctx), notifier_from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn add_to_roster(
        &self,
        ctx: &Context<'_>,
        semester_id: i64,
        user_ids: Vec<i64>,
    ) -> Result<RosterChange> {
        let actor = ctx.data::<User>()?;
        Roster::add(semester_id, &user_ids, actor, db::from_ctx(ctx))
            .await
            .extend()
    }

    /// Puts every non-admin user on the semester's roster
    #[graphql(guard = "AdminOnly")]
    pub async fn add_all_to_roster(
        &self,
        ctx: &Context<'_>,
        semester_id: i64,
    ) -> Result<RosterChange> {
        let actor = ctx.data::<User>()?;
        Roster::add_all(semester_id, actor, db::from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn remove_from_roster(
        &self,
        ctx: &Context<'_>,
        semester_id: i64,
        user_id: i64,
    ) -> Result<&'static str> {
        let actor = ctx.data::<User>()?;
        Roster::remove(semester_id, user_id, actor, db::from_ctx(ctx))
            .await
            .extend()?;

        Ok(SUCCESS_MESSAGE)
    }

    #[graphql(guard = "LoggedIn")]
    pub async fn add_comment(
        &self,
        ctx: &Context<'_>,
        task_id: i64,
        content: String,
    ) -> Result<TaskComment> {
        let user = ctx.data::<User>()?;
        TaskComment::add(task_id, &content, user, db::from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "LoggedIn")]
    pub async fn delete_comment(
        &self,
        ctx: &Context<'_>,
        task_id: i64,
        comment_id: i64,
    ) -> Result<&'static str> {
        let user = ctx.data::<User>()?;
        TaskComment::delete(task_id, comment_id, user, db::from_ctx(ctx))
            .await
            .extend()?;

        Ok(SUCCESS_MESSAGE)
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn create_event_template(
        &self,
        ctx: &Context<'_>,
        input: EventTemplateInput,
    ) -> Result<EventTemplate> {
        let actor = ctx.data::<User>()?;
        EventTemplate::create(input, actor, db::from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn update_event_template(
        &self,
        ctx: &Context<'_>,
        id: String,
        update: EventTemplateUpdate,
    ) -> Result<EventTemplate> {
        let actor = ctx.data::<User>()?;
        EventTemplate::update(&id, update, actor, db::from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn delete_event_template(&self, ctx: &Context<'_>, id: String) -> Result<&'static str> {
        let actor = ctx.data::<User>()?;
        EventTemplate::delete(&id, actor, db::from_ctx(ctx))
            .await
            .extend()?;

        Ok(SUCCESS_MESSAGE)
    }

    /// Replaces the content of a built-in template until it is reset
    #[graphql(guard = "AdminOnly")]
    pub async fn override_builtin_template(
        &self,
        ctx: &Context<'_>,
        builtin_id: String,
        input: EventTemplateInput,
    ) -> Result<EventTemplate> {
        let actor = ctx.data::<User>()?;
        EventTemplate::override_builtin(&builtin_id, input, actor, db::from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn reset_builtin_template(
        &self,
        ctx: &Context<'_>,
        builtin_id: String,
    ) -> Result<EventTemplate> {
        let actor = ctx.data::<User>()?;
        EventTemplate::reset_builtin(&builtin_id, actor, db::from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn create_week_template(
        &self,
        ctx: &Context<'_>,
        input: NewWeekTemplate,
    ) -> Result<WeekTemplate> {
        let actor = ctx.data::<User>()?;
        WeekTemplate::create(input, actor, db::from_ctx(ctx))
            .await
            .extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn delete_week_template(&self, ctx: &Context<'_>, id: String) -> Result<&'static str> {
        let actor = ctx.data::<User>()?;
        WeekTemplate::delete(&id, actor, db::from_ctx(ctx))
            .await
            .extend()?;

        Ok(SUCCESS_MESSAGE)
    }

    /// Creates an event with every task the template lists
    #[graphql(guard = "AdminOnly")]
    pub async fn create_from_template(
        &self,
        ctx: &Context<'_>,
        template_id: String,
        week_id: i64,
        datetime: GqlDateTime,
        name: Option<String>,
        location: Option<String>,
    ) -> Result<Event> {
        let actor = ctx.data::<User>()?;
        expand::create_from_template(
            &template_id,
            week_id,
            datetime,
            name,
            location,
            actor,
            db::from_ctx(ctx),
        )
        .await
        .extend()
    }

    /// Fills a week from a week template, returning the created event names
    #[graphql(guard = "AdminOnly")]
    pub async fn create_from_week_template(
        &self,
        ctx: &Context<'_>,
        week_template_id: String,
        week_id: i64,
    ) -> Result<Vec<String>> {
        let actor = ctx.data::<User>()?;
        expand::create_from_week_template(
            &week_template_id,
            week_id,
            actor,
            db::from_ctx(ctx),
        )
        .await
        .extend()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn import_data(
        &self,
        ctx: &Context<'_>,
        data: Json<ExportData>,
    ) -> Result<ImportResult> {
        let actor = ctx.data::<User>()?;
        data.0.import(actor, db::from_ctx(ctx)).await.extend()
    }
}
