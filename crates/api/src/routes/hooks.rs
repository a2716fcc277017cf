use std::time::Duration;

use axum::http::StatusCode;
use axum::{routing::post, Router};
use tower_http::timeout::TimeoutLayer;

use crate::handlers;
use crate::state::AppState;

/// Mount recorder webhook routes with their strict response bound.
///
/// The recorder piles up retry deliveries when a hook answers slowly, so
/// this subtree gets its own low timeout instead of the global one.
pub fn router(hook_timeout_secs: u64) -> Router<AppState> {
    Router::new()
        .route("/on_record_mp4", post(handlers::hooks::on_record_mp4))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(hook_timeout_secs),
        ))
}
