//! The HTTP API binary: OAuth login, project/environment management, and
//! webhook intake, served over axum on a bounded connection pool with a
//! per-request deadline.

mod auth;
mod dto;
mod error;
mod routes;
mod state;

use dockyard_config::Config;
use dockyard_core::Context;
use dockyard_runtime::BollardEngine;
use dockyard_store::PgStore;

use state::AppState;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = Config::from_env()?;
    let store = PgStore::connect(&config.database_url).await?;
    let engine = BollardEngine::connect()?;
    let ctx = Context::new(store, config, engine);
    let state = AppState::new(ctx);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "dockyard-server listening");

    axum::serve(listener, routes::router(state)).await?;
    Ok(())
}
