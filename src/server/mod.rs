//! Server-side code for the calling relay
//!
//! - Signaling relay over WebSocket (`/ws`)
//! - Call history REST API
//! - Authentication (JWT)
//! - Storage (PostgreSQL via sqlx, or in memory)

pub mod auth;
pub mod call_log;
pub mod db;
pub mod relay;


use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{CorsLayer, Any};
use axum::http::Method;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use db::{CallLogStore, MemoryCallLog, PgCallLog};
use relay::Relay;

/// Application state shared across all routes
#[derive(Clone)]
pub struct AppState {
    pub jwt_secret: String,
    pub relay: Relay,
    pub calls: Arc<dyn CallLogStore>,
}

impl AppState {
    /// State backed by the in-memory call log
    pub fn in_memory(jwt_secret: &str) -> Self {
        Self {
            jwt_secret: jwt_secret.to_string(),
            relay: Relay::new(),
            calls: Arc::new(MemoryCallLog::new()),
        }
    }
}

/// Create the Axum router with all API routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/api/health", get(health_check))

        // Signaling socket
        .route("/ws", get(relay::ws_handler))

        // Call history
        .route("/api/calls/log", post(call_log::log_call))
        .route("/api/calls/history", get(call_log::get_history))
        .route("/api/calls/by-users/{caller_id}/{receiver_id}", patch(call_log::update_call_by_users))
        .route("/api/calls/{id}", patch(call_log::update_call))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

// Health check
async fn health_check() -> &'static str {
    "OK"
}

/// Initialize and start the server
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    config.validate()?;

    let calls: Arc<dyn CallLogStore> = match &config.database_url {
        Some(database_url) => {
            let pool = db::init_pool(database_url).await?;

            // Run migrations (non-fatal if already applied)
            if let Err(e) = db::run_migrations(&pool).await {
                tracing::warn!("Migration warning (may be already applied): {}", e);
            }
            Arc::new(PgCallLog::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, call history is kept in memory");
            Arc::new(MemoryCallLog::new())
        }
    };

    let state = AppState {
        jwt_secret: config.jwt_secret.clone(),
        relay: Relay::new(),
        calls,
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!("Server running on http://0.0.0.0:{}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
