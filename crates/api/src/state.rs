use std::sync::Arc;

use tokio::sync::watch;

use camvault_sweep::SweepStatus;

use crate::config::{EngineConfig, ServerConfig};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: camvault_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Engine configuration (webhook bounds, storage layout).
    pub engine: Arc<EngineConfig>,
    /// Latest reconciliation sweep status snapshot.
    pub sweep_status: watch::Receiver<SweepStatus>,
}
