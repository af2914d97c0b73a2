use std::sync::Arc;

use async_graphql::{Context, EmptySubscription, Schema};

use crate::db::Store;
use crate::graphql::mutation::MutationRoot;
use crate::graphql::query::QueryRoot;
use crate::notify::Notifier;

pub mod guards;
pub mod mutation;
pub mod query;

pub const SUCCESS_MESSAGE: &str = "success";

pub type TrackerSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Builds the schema around the shared store and notifier.
///
/// The logged-in [`User`](crate::models::member::User), if any, is attached
/// to each request separately.
pub fn build_schema(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>) -> TrackerSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(store)
        .data(notifier)
        .finish()
}

pub fn notifier_from_ctx(ctx: &Context<'_>) -> Arc<dyn Notifier> {
    ctx.data_unchecked::<Arc<dyn Notifier>>().clone()
}
