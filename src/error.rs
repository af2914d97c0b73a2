use async_graphql::ErrorExtensions;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// The referenced resource does not exist (404)
    #[error("{0} not found")]
    NotFound(String),
    /// No valid session was provided (401)
    #[error("{0}")]
    Unauthorized(String),
    /// The caller is logged in but may not do this (403)
    #[error("{0}")]
    Forbidden(String),
    /// Malformed or incomplete input (422)
    #[error("{0}")]
    Validation(String),
    /// The change collides with existing data (409)
    #[error("{0}")]
    Conflict(String),
    /// The database failed (500)
    #[error("database error: {0}")]
    Database(sqlx::Error),
    /// Anything else that went wrong on our end (500)
    #[error("server error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

pub type TrackerResult<T> = Result<T, TrackerError>;

impl TrackerError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict(reason.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Validation(_) => "VALIDATION",
            Self::Conflict(_) => "CONFLICT",
            Self::Database(_) => "DATABASE",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl From<sqlx::Error> for TrackerError {
    fn from(error: sqlx::Error) -> Self {
        let unique_violation = error
            .as_database_error()
            .and_then(|db_error| db_error.code())
            .map(|code| code == "23505")
            .unwrap_or(false);

        if unique_violation {
            Self::Conflict(error.to_string())
        } else {
            Self::Database(error)
        }
    }
}

impl ErrorExtensions for TrackerError {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.to_string()).extend_with(|_, extensions| {
            extensions.set("code", self.code());
            extensions.set("status", self.status().as_u16() as i32);
        })
    }
}

impl IntoResponse for TrackerError {
    fn into_response(self) -> Response {
        let body = json!({
            "code": self.code(),
            "message": self.to_string(),
        });

        (self.status(), Json(body)).into_response()
    }
}
