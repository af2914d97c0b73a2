use uuid::Uuid;

use crate::db::Store;
use crate::error::{TrackerError, TrackerResult};
use crate::models::member::User;

/// A login token tied to a single user
pub struct Session;

impl Session {
    pub async fn user_for_token(token: &str, store: &dyn Store) -> TrackerResult<User> {
        store.session_user(token).await?.ok_or_else(|| {
            TrackerError::Unauthorized("No login tied to the provided API token".to_owned())
        })
    }

    pub async fn get_or_generate_token(user: &User, store: &dyn Store) -> TrackerResult<String> {
        if let Some(token) = store.session_token(user.id).await? {
            return Ok(token);
        }

        let token = Uuid::new_v4().to_string();
        store.insert_session(user.id, &token).await?;

        Ok(token)
    }

    pub async fn remove(user: &User, store: &dyn Store) -> TrackerResult<()> {
        store.remove_sessions(user.id).await
    }

    /// Checks the credentials and hands back a token for the user.
    pub async fn login(username: &str, password: &str, store: &dyn Store) -> TrackerResult<String> {
        let user = User::login_is_valid(username, password, store)
            .await?
            .ok_or_else(|| TrackerError::Unauthorized("Invalid username or password".to_owned()))?;

        Self::get_or_generate_token(&user, store).await
    }
}
