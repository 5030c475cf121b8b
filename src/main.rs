use anyhow::{Context, Result};
use log::info;
use tokio_util::sync::CancellationToken;

use cardata::config::Config;
use cardata::db::Database;
use cardata::ingest::{self, SimulatedSensors};
use cardata::server;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env();
    info!("starting cardata with {config:?}");

    let db = Database::new(config.db_path.clone()).context("failed to open database")?;
    db.ensure_user(config.user_id)
        .await
        .context("failed to ensure ingestion user")?;

    let cancel_token = CancellationToken::new();
    let ingest_handle = tokio::spawn(ingest::ingest_loop(
        Box::new(SimulatedSensors::new()),
        db.clone(),
        config.ingest_settings(),
        cancel_token.clone(),
    ));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("serving on {}", config.bind_addr);

    let app = server::router(db);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token.clone()))
        .await
        .context("server error")?;

    cancel_token.cancel();
    ingest_handle.await.context("ingestion task panicked")?;
    info!("shutdown complete");

    Ok(())
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for ctrl-c: {err}");
        return;
    }
    info!("ctrl-c received, shutting down");
    cancel_token.cancel();
}
