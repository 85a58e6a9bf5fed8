//! Holiday programs and orders over HTTP.
//!
//! The service exposes a catalog (`Programs`) and an `Orders` collection of a
//! document store, a catalog search endpoint and a static image mount. See
//! [`server::router`] for the routes and [`run`] for the boot sequence.

pub mod cli;
pub mod config;
pub mod errors;
pub mod health;
pub mod json;
pub mod logger;
pub mod query;
pub mod repository;
pub mod server;
pub mod store;
pub mod types;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::errors::ApiError;
use crate::server::{AppState, ShutdownReason};

/// Connect the store, bind the listener and serve until shutdown.
///
/// The store is connected before anything is bound, so a connect failure
/// leaves no listener behind.
///
/// # Errors
/// `Config` for an unusable configuration, `StoreConnect` when the store
/// cannot be reached, `Io` when the address cannot be bound.
pub async fn run(cfg: AppConfig) -> Result<ShutdownReason, ApiError> {
    cfg.validate()?;
    let store = Arc::new(store::connect(&cfg.store).await?);
    let state = AppState::new(store, &cfg.store);
    let health = Arc::clone(&state.health);
    let app = server::router(state, &cfg)?;

    let addr = (cfg.server.host.as_str(), cfg.server.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Server is running on http://{}", listener.local_addr()?);
    server::serve(listener, app, health).await
}
