//! The API server and reminder scheduler

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_graphql::http::{playground_source, GraphQLPlaygroundConfig};
use async_graphql::{Request, Response};
use axum::headers::HeaderMap;
use axum::routing::get;
use axum::{Extension, Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use msa_tracker::config::Config;
use msa_tracker::db::{PgStore, Store};
use msa_tracker::error::{TrackerError, TrackerResult};
use msa_tracker::graphql::{build_schema, TrackerSchema};
use msa_tracker::models::member::session::Session;
use msa_tracker::models::member::User;
use msa_tracker::notify::reminder::{run_reminder_loop, ReminderScan};
use msa_tracker::notify::{DiscordNotifier, Notifier};

const TRACKER_TOKEN: &str = "TRACKER_TOKEN";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let store: Arc<dyn Store> = Arc::new(PgStore::connect(&config.database_url).await?);
    let notifier: Arc<dyn Notifier> = Arc::new(DiscordNotifier::new(&config)?);

    if let Some(admin) = User::ensure_admin(
        &config.admin_username,
        &config.admin_password,
        config.admin_discord_id.as_deref(),
        store.as_ref(),
    )
    .await
    .context("Failed to create the admin account")?
    {
        info!(username = %admin.username, "Created admin account");
    }

    tokio::spawn(run_reminder_loop(
        ReminderScan::OneShot,
        Duration::from_secs(config.reminder_check_seconds),
        store.clone(),
        notifier.clone(),
    ));
    tokio::spawn(run_reminder_loop(
        ReminderScan::Auto,
        Duration::from_secs(config.auto_reminder_check_seconds),
        store.clone(),
        notifier.clone(),
    ));

    let app = Router::new()
        .route("/", get(playground).post(query))
        .route("/health", get(health))
        .layer(Extension(build_schema(store.clone(), notifier)))
        .layer(Extension(store))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr: SocketAddr = config
        .bind_address
        .parse()
        .with_context(|| format!("Invalid bind address {:?}", config.bind_address))?;
    info!("Listening on {addr}");

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server failed")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {err}");
        return;
    }

    info!("Shutting down");
}

async fn query(
    headers: HeaderMap,
    Extension(schema): Extension<TrackerSchema>,
    Extension(store): Extension<Arc<dyn Store>>,
    Json(request): Json<Request>,
) -> TrackerResult<Json<Response>> {
    let request = match get_token(&headers)? {
        Some(token) => request.data(Session::user_for_token(token, store.as_ref()).await?),
        None => request,
    };

    Ok(Json(schema.execute(request).await))
}

async fn playground(headers: HeaderMap) -> TrackerResult<String> {
    let mut config = GraphQLPlaygroundConfig::new("/");
    if let Some(token) = get_token(&headers)? {
        config = config.with_header(TRACKER_TOKEN, token);
    }

    Ok(playground_source(config))
}

async fn health() -> &'static str {
    "ok"
}

fn get_token(headers: &HeaderMap) -> TrackerResult<Option<&str>> {
    headers
        .get(TRACKER_TOKEN)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| TrackerError::Unauthorized("Invalid token header".to_owned()))
        })
        .transpose()
}
