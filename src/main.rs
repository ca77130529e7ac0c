//! Taskdeck Backend - per-user todo tracking service
//! Mission: JWT-authenticated CRUD over SQLite-backed todo items

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taskdeck_backend::{
    api::create_router,
    auth::{AuthState, JwtHandler, UserStore},
    config::Config,
    todos::{TodoState, TodoStore},
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    // Fails here if the signing secret is missing; a server that cannot
    // verify credentials must not come up.
    let config = Config::from_env()?;

    let user_store = Arc::new(UserStore::new(&config.database_path)?);
    let todo_store = Arc::new(TodoStore::new(&config.database_path)?);
    let jwt_handler = Arc::new(JwtHandler::new(&config.jwt_secret, config.token_ttl_secs));
    info!("Stores initialized at: {}", config.database_path);

    let app = create_router(
        AuthState::new(user_store, jwt_handler),
        TodoState::new(todo_store),
    );

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("API server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskdeck_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
