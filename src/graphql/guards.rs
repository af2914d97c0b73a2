use async_graphql::{Context, ErrorExtensions, Guard, Result};

use crate::error::TrackerError;
use crate::models::member::User;

pub struct LoggedIn;

#[async_trait::async_trait]
impl Guard for LoggedIn {
    async fn check(&self, ctx: &Context<'_>) -> Result<()> {
        if ctx.data_opt::<User>().is_some() {
            Ok(())
        } else {
            Err(TrackerError::Unauthorized("User must be logged in".to_owned()).extend())
        }
    }
}

pub struct AdminOnly;

#[async_trait::async_trait]
impl Guard for AdminOnly {
    async fn check(&self, ctx: &Context<'_>) -> Result<()> {
        match ctx.data_opt::<User>() {
            Some(user) if user.is_admin() => Ok(()),
            Some(_) => Err(TrackerError::forbidden("Admin access required").extend()),
            None => Err(TrackerError::Unauthorized("User must be logged in".to_owned()).extend()),
        }
    }
}
