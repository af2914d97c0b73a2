//! Extra utilities for use elsewhere in the API.

use std::sync::OnceLock;

use async_graphql::MaybeUndefined;
use regex::Regex;
use time::OffsetDateTime;

use crate::error::{TrackerError, TrackerResult};

pub fn current_time() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

fn discord_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]{17,20}$").expect("discord id pattern is valid"))
}

/// Trims a Discord snowflake and checks that it is 17 to 20 digits.
///
/// Blank input counts as "no Discord account" and yields `None`.
pub fn validate_discord_id(discord_id: Option<&str>) -> TrackerResult<Option<String>> {
    let trimmed = match discord_id.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(trimmed) => trimmed,
    };

    if discord_id_pattern().is_match(trimmed) {
        Ok(Some(trimmed.to_owned()))
    } else {
        Err(TrackerError::validation(
            "Discord ID must be 17-20 digits",
        ))
    }
}

/// Strips newlines, tabs and every other control character below 0x20.
pub fn sanitize_for_log(value: &str) -> String {
    value.chars().filter(|c| (*c as u32) >= 0x20).collect()
}

/// Collapses a GraphQL "maybe undefined" input into "leave alone" (`None`)
/// or "set to this" (`Some(new_value)`).
pub fn field_update<T>(value: MaybeUndefined<T>) -> Option<Option<T>> {
    match value {
        MaybeUndefined::Undefined => None,
        MaybeUndefined::Null => Some(None),
        MaybeUndefined::Value(value) => Some(Some(value)),
    }
}

/// A percentage rounded to one decimal place, zero when there is nothing to count.
pub fn completion_rate(completed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (completed as f64 / total as f64 * 1000.0).round() / 10.0
    }
}

/// Name comparison matching the `LOWER(name)` unique indexes in PostgreSQL.
pub fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

pub fn require_non_empty(value: &str, field: &str) -> TrackerResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(TrackerError::validation(format!("{field} cannot be empty")))
    } else {
        Ok(trimmed.to_owned())
    }
}

pub fn hash_password(password: &str) -> TrackerResult<String> {
    if password.len() < 6 {
        return Err(TrackerError::validation(
            "Password must be at least 6 characters",
        ));
    }

    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|err| TrackerError::Internal(anyhow::anyhow!("Failed to hash password: {err}")))
}
