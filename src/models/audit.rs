//! The append-only record of who changed what.

use async_graphql::{ComplexObject, Context, InputObject, Result, ResultExt, SimpleObject};
use tracing::{error, info};

use crate::db::{self, Store};
use crate::error::{TrackerError, TrackerResult};
use crate::models::member::User;
use crate::models::GqlDateTime;
use crate::util::sanitize_for_log;

pub const DEFAULT_PAGE_SIZE: i32 = 50;

#[derive(SimpleObject, sqlx::FromRow, Clone, Debug)]
#[graphql(complex)]
pub struct AuditLog {
    pub id: i64,
    /// Who made the change, if it was a logged-in user
    pub user_id: Option<i64>,
    /// What happened, e.g. `TASK_DONE`
    pub action: String,
    /// The kind of thing that changed, e.g. `task`
    pub entity_type: String,
    pub entity_id: Option<i64>,
    /// The name of the changed entity when it was changed
    pub entity_name: Option<String>,
    pub details: Option<String>,
    pub created_at: GqlDateTime,
}

#[ComplexObject]
impl AuditLog {
    /// The display name of the user who made the change
    pub async fn user_name(&self, ctx: &Context<'_>) -> Result<Option<String>> {
        match self.user_id {
            Some(user_id) => Ok(db::from_ctx(ctx)
                .user(user_id)
                .await
                .extend()?
                .map(|user| user.display_name)),
            None => Ok(None),
        }
    }
}

/// An audit entry waiting to be written.
///
/// Built up with the helper methods and finished with [`NewAuditLog::log`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAuditLog {
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<i64>,
    pub entity_name: Option<String>,
    pub user_id: Option<i64>,
    pub details: Option<String>,
}

impl NewAuditLog {
    pub fn new(action: &str, entity_type: &str) -> Self {
        Self {
            action: action.to_owned(),
            entity_type: entity_type.to_owned(),
            entity_id: None,
            entity_name: None,
            user_id: None,
            details: None,
        }
    }

    pub fn entity(mut self, id: i64, name: impl Into<String>) -> Self {
        self.entity_id = Some(id);
        self.entity_name = Some(name.into());
        self
    }

    pub fn by(mut self, user: &User) -> Self {
        self.user_id = Some(user.id);
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Strips control characters from the free-text fields so a crafted task
    /// title cannot forge extra log lines.
    pub fn sanitized(mut self) -> Self {
        self.entity_name = self.entity_name.as_deref().map(sanitize_for_log);
        self.details = self.details.as_deref().map(sanitize_for_log);
        self
    }

    /// Writes the entry. Failing to record an audit entry never fails the
    /// change it describes, so errors are only logged.
    pub async fn log(self, store: &dyn Store) {
        let entry = self.sanitized();
        info!(
            action = %entry.action,
            entity_type = %entry.entity_type,
            entity_id = ?entry.entity_id,
            entity_name = entry.entity_name.as_deref().unwrap_or_default(),
            user_id = ?entry.user_id,
            details = entry.details.as_deref().unwrap_or_default(),
            "audit"
        );

        if let Err(err) = store.insert_audit_log(&entry).await {
            error!(action = %entry.action, "Failed to write audit log: {err}");
        }
    }
}

#[derive(InputObject, Clone, Debug, Default)]
pub struct AuditFilter {
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub user_id: Option<i64>,
}

impl AuditFilter {
    pub fn matches(&self, log: &AuditLog) -> bool {
        self.action.as_ref().map_or(true, |action| &log.action == action)
            && self
                .entity_type
                .as_ref()
                .map_or(true, |entity_type| &log.entity_type == entity_type)
            && self.user_id.map_or(true, |user_id| log.user_id == Some(user_id))
    }
}

#[derive(SimpleObject, Debug)]
pub struct AuditLogPage {
    pub items: Vec<AuditLog>,
    pub total: i64,
    pub page: i32,
    pub per_page: i32,
    pub total_pages: i64,
}

impl AuditLog {
    pub async fn page(
        filter: AuditFilter,
        page: i32,
        per_page: i32,
        store: &dyn Store,
    ) -> TrackerResult<AuditLogPage> {
        if page < 1 {
            return Err(TrackerError::validation("Page must be at least 1"));
        }
        if !(10..=100).contains(&per_page) {
            return Err(TrackerError::validation(
                "Page size must be between 10 and 100",
            ));
        }

        let offset = (page as i64 - 1) * per_page as i64;
        let (items, total) = store.audit_logs(&filter, offset, per_page as i64).await?;

        Ok(AuditLogPage {
            items,
            total,
            page,
            per_page,
            total_pages: (total + per_page as i64 - 1) / per_page as i64,
        })
    }
}
