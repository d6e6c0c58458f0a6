//! # Dashboard API
//!
//! **GET `/v1/dashboard`** fleet-wide regression health.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use rpk_registry::RegistryOverview;

use crate::state::AppState;

/// Construct the dashboard router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/dashboard", get(overview))
}

/// GET /v1/dashboard: Totals, recent pass rate and failing rulepacks.
#[utoipa::path(
    get,
    path = "/v1/dashboard",
    responses((status = 200, description = "Registry overview")),
    tag = "dashboard"
)]
pub(crate) async fn overview(State(state): State<AppState>) -> Json<RegistryOverview> {
    Json(state.registry.overview())
}
