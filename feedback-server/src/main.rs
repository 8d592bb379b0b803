//! Feedback Server
//!
//! HTTP collection endpoint for the feedback ingestion protocol:
//! - `POST /responses` - submit (deduplicated by `Idempotency-Key`)
//! - `GET /responses/check` - existing response for an element and end user
//! - `PATCH /responses/{id}` - edit mutable fields
//! - `/health`, `/healthz`, `/metrics`

use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod cli;
mod router;
mod server_utils;
mod state;
#[cfg(test)]
mod test_helpers;

use cli::{Cli, Commands};
use feedback_core::ingest::prometheus;
use feedback_core::modules::{config, credentials, open_store};
use state::AppState;

const IDEMPOTENCY_PURGE_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Some(Commands::HashKey { key }) = &cli.command {
        println!("{}", credentials::hash_key(key));
        return Ok(());
    }

    let mut config = config::load_config(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);

    let store = open_store(&config).await?;
    let seeded = credentials::seed_credentials(store.as_ref(), &config.credentials).await?;
    if seeded > 0 {
        info!("Seeded {} credentials from config", seeded);
    }

    let metrics = match prometheus::init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!("Prometheus recorder unavailable: {}", e);
            None
        },
    };

    server_utils::spawn_idempotency_purge(store.clone(), IDEMPOTENCY_PURGE_INTERVAL);

    let state = AppState::new(store, &config, metrics);
    let app = router::build_router(state);

    let listener = server_utils::create_listener(&config.bind_address, config.port).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(server_utils::shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
