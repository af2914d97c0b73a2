//! Settings read from the environment at startup.

use std::env;
use std::str::FromStr;

use anyhow::Context;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "changeme123";

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    /// Where task reminders are posted; empty disables them
    pub reminder_webhook_url: String,
    /// Where blocked-task alerts are posted; empty disables them
    pub admin_webhook_url: String,
    pub discord_enabled: bool,
    pub admin_username: String,
    pub admin_password: String,
    pub admin_discord_id: Option<String>,
    pub reminder_check_seconds: u64,
    pub auto_reminder_check_seconds: u64,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parsed_var_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("`{key}` has an invalid value: {value:?}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads `.env` if there is one, then reads every setting.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let reminder_check_seconds = parsed_var_or("REMINDER_CHECK_SECONDS", 60)?;
        let auto_reminder_check_seconds = parsed_var_or("AUTO_REMINDER_CHECK_SECONDS", 3600)?;
        if reminder_check_seconds == 0 || auto_reminder_check_seconds == 0 {
            anyhow::bail!("Reminder check periods must be at least one second");
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("`DATABASE_URL` not set")?,
            bind_address: var_or("BIND_ADDRESS", DEFAULT_BIND_ADDRESS),
            reminder_webhook_url: var_or("REMINDER_WEBHOOK_URL", ""),
            admin_webhook_url: var_or("ADMIN_WEBHOOK_URL", ""),
            discord_enabled: parsed_var_or("DISCORD_ENABLED", true)?,
            admin_username: var_or("ADMIN_USERNAME", DEFAULT_ADMIN_USERNAME),
            admin_password: var_or("ADMIN_PASSWORD", DEFAULT_ADMIN_PASSWORD),
            admin_discord_id: env::var("ADMIN_DISCORD_ID")
                .ok()
                .filter(|id| !id.trim().is_empty()),
            reminder_check_seconds,
            auto_reminder_check_seconds,
        })
    }
}
