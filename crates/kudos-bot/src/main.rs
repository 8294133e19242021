mod config;
mod session;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing::info;

use kudos_db::Database;
use kudos_emoji::EmojiCatalog;
use kudos_engine::Engine;
use kudos_types::events::SessionEvent;

use crate::config::Config;
use crate::session::HttpSession;

#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kudos=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(Database::open(&PathBuf::from(&config.db_path))?);

    // Collaborators: platform session and emoji validity cache
    let session = Arc::new(HttpSession::new(
        config.platform_url.clone(),
        config.workspace_url.clone(),
        config.bot_token.clone(),
        config.user_token.clone(),
    ));
    let emoji = Arc::new(EmojiCatalog::new(
        config.emoji_catalog_url.clone(),
        session.clone(),
    ));

    let engine = Arc::new(Engine::new(
        db,
        session,
        emoji,
        config.daily_quota,
    ));

    let state = AppState { engine };

    // Routes: the session collaborator delivers platform events here
    let app = Router::new()
        .route("/events", post(receive_event))
        .route("/healthz", get(healthz))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("kudosbot listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Events are acknowledged immediately and handled on their own task:
/// fire-and-forget, with no ordering guarantee between messages.
async fn receive_event(
    State(state): State<AppState>,
    Json(event): Json<SessionEvent>,
) -> StatusCode {
    tokio::spawn(async move {
        state.engine.handle_event(event).await;
    });
    StatusCode::ACCEPTED
}

async fn healthz() -> &'static str {
    "ok"
}
