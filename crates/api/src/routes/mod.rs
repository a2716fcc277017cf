//! Route tree builders.
//!
//! Route hierarchy:
//!
//! ```text
//! /health                            service + database health
//!
//! /api/v1/hooks/on_record_mp4        completed-segment webhook (POST)
//! /api/v1/reconciliation/status      latest sweep cycle statistics (GET)
//! ```

pub mod health;
pub mod hooks;
pub mod reconciliation;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// `hook_timeout_secs` bounds the webhook route tighter than the global
/// request timeout.
pub fn api_routes(hook_timeout_secs: u64) -> Router<AppState> {
    Router::new()
        .nest("/hooks", hooks::router(hook_timeout_secs))
        .merge(reconciliation::router())
}
