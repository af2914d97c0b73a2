use async_graphql::{ComplexObject, Context, Result, ResultExt, SimpleObject};

use crate::db::{self, Store};
use crate::error::{TrackerError, TrackerResult};
use crate::models::member::User;
use crate::models::task::Task;
use crate::models::GqlDateTime;

pub const MAX_COMMENT_LENGTH: usize = 2000;

/// A note left on a task by someone who can see it
#[derive(SimpleObject, sqlx::FromRow, Clone, Debug, PartialEq, Eq)]
#[graphql(complex)]
pub struct TaskComment {
    pub id: i64,
    pub task_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: GqlDateTime,
}

#[ComplexObject]
impl TaskComment {
    /// The display name of the comment's author
    pub async fn user_name(&self, ctx: &Context<'_>) -> Result<String> {
        Ok(db::from_ctx(ctx)
            .user(self.user_id)
            .await
            .extend()?
            .map(|user| user.display_name)
            .unwrap_or_else(|| "Unknown".to_owned()))
    }

    /// Whether the current user may delete this comment
    pub async fn can_delete(&self, ctx: &Context<'_>) -> Result<bool> {
        Ok(self.deletable_by(ctx.data::<User>()?))
    }
}

impl TaskComment {
    pub fn deletable_by(&self, user: &User) -> bool {
        user.is_admin() || self.user_id == user.id
    }

    pub async fn for_task(task_id: i64, user: &User, store: &dyn Store) -> TrackerResult<Vec<Self>> {
        Task::viewable(task_id, user, store).await?;
        store.comments(task_id).await
    }

    pub async fn add(
        task_id: i64,
        content: &str,
        user: &User,
        store: &dyn Store,
    ) -> TrackerResult<Self> {
        Task::viewable(task_id, user, store).await?;

        let content = content.trim();
        if content.is_empty() {
            return Err(TrackerError::validation("Comment cannot be empty"));
        }
        if content.chars().count() > MAX_COMMENT_LENGTH {
            return Err(TrackerError::validation(format!(
                "Comments are limited to {MAX_COMMENT_LENGTH} characters"
            )));
        }

        store.insert_comment(task_id, user.id, content).await
    }

    /// Authors may delete their own comments and admins may delete any.
    pub async fn delete(
        task_id: i64,
        comment_id: i64,
        user: &User,
        store: &dyn Store,
    ) -> TrackerResult<()> {
        let comment = store
            .comment(comment_id)
            .await?
            .filter(|comment| comment.task_id == task_id)
            .ok_or_else(|| TrackerError::not_found(format!("Comment {comment_id}")))?;

        if !comment.deletable_by(user) {
            return Err(TrackerError::forbidden(
                "Not authorized to delete this comment",
            ));
        }

        store.delete_comment(comment_id).await
    }
}
