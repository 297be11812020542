mod app;
mod attendance;
mod auth;
mod config;
mod db;
mod error;
mod pages;
mod state;
mod storage;
mod templates;
mod uploads;

#[cfg(test)]
mod tests;

use crate::config::AppConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "attendance=debug,axum=info,tower_http=info".to_string());
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

    let config = AppConfig::from_env()?;
    if config.uses_dev_secret() {
        tracing::warn!("SECRET_KEY is not set; sessions are signed with the development key");
    }
    tracing::info!(
        database_url = %config.database_url,
        upload_dir = %config.upload_dir.display(),
        "starting attendance service"
    );

    let app_state = AppState::init(config).await?;
    app::serve(app::build_app(app_state)).await
}
