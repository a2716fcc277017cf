use axum::extract::State;
use axum::{routing::get, Json, Router};

use camvault_sweep::SweepStatus;

use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/reconciliation/status -- latest sweep cycle statistics.
async fn sweep_status(State(state): State<AppState>) -> Json<DataResponse<SweepStatus>> {
    let status = state.sweep_status.borrow().clone();
    Json(DataResponse { data: status })
}

/// Mount reconciliation observability routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/reconciliation/status", get(sweep_status))
}
