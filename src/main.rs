use anyhow::Context;
use tracing::info;

mod app;
mod common;
mod config;
mod db;
mod logging;
mod metrics;
mod middleware;
mod orders;
mod registry;
mod routes;
mod state;
mod users;

#[cfg(test)]
mod test_support;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    let _log_guards = logging::init(&config.logging)?;
    logging::install_panic_hook();
    common::error::set_production_mode(config.is_production());

    info!(
        environment = ?config.environment,
        host = %config.server.host,
        port = config.server.port,
        "starting orderdesk"
    );

    let state = AppState::init(config.clone()).await?;

    sqlx::migrate!("./migrations")
        .run(&state.db)
        .await
        .context("run database migrations")?;

    let sweeper = state
        .rate_limiter
        .spawn_sweeper(std::time::Duration::from_secs(
            config.limits.rate_limit_sweep_secs,
        ));

    let db = state.db.clone();
    let app = app::build_app(state);
    let served = app::serve(app, &config).await;

    sweeper.abort();
    db.close().await;
    info!("database pool closed");
    served
}
