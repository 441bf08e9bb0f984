mod auth;
mod capabilities;
mod config;
mod dates;
mod db;
mod error;
mod fields;
mod models;
mod php;
mod response;
mod routes;
mod store;

use crate::config::AppConfig;
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: AppConfig,
}

impl FromRef<AppState> for sqlx::PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let settings = AppConfig::load().expect("Failed to load config.toml");

    let pool = db::setup_database(&settings).await?;
    let state = AppState {
        db: pool,
        config: settings.clone(),
    };
    let app = routes::create_router(state);

    tracing::info!(addr = %settings.server_addr, "listening");
    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
