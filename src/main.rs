mod ai;
mod app;
mod auth;
mod config;
mod db;
mod error;
mod extract;
mod guest;
mod history;
mod mail;
mod prompt;
mod response;
mod sanitize;
mod state;
mod trend;

use crate::{app::build_app, config::DEFAULT_IP_SALT, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "trendbits=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = AppState::init().await?;

    if app_state.config.security.ip_hash_salt == DEFAULT_IP_SALT {
        tracing::warn!("IP_HASH_SALT is not set; guest IP hashes use the default salt");
    }

    let pool = app_state.db.pool().await?;
    if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
        tracing::warn!(error = %e, "migration failed; continuing");
    }

    let app = build_app(app_state);
    app::serve(app).await
}
