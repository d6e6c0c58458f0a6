//! # OpenAPI Document
//!
//! Assembles the utoipa-annotated handlers into one document served at
//! `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// OpenAPI document for the whole API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Rulepack Registry API",
        version = "0.3.0",
        description = "Versioned, jurisdiction-scoped tax rulepacks: install, approval, regression-gated activation, canary rollout, snapshots, statute findings and the fleet dashboard.",
        license(name = "BUSL-1.1")
    ),
    paths(
        // Rulepacks
        crate::routes::rulepacks::install_rulepack,
        crate::routes::rulepacks::list_rulepacks,
        crate::routes::rulepacks::get_rulepack,
        crate::routes::rulepacks::submit_rulepack,
        crate::routes::rulepacks::approve_rulepack,
        crate::routes::rulepacks::reject_rulepack,
        crate::routes::rulepacks::activate_rulepack,
        crate::routes::rulepacks::archive_rulepack,
        crate::routes::rulepacks::schedule_canary,
        crate::routes::rulepacks::update_metadata,
        crate::routes::rulepacks::list_runs,
        // Regression
        crate::routes::regression::start_regression,
        crate::routes::regression::latest_regression,
        crate::routes::regression::get_regression,
        crate::routes::regression::cancel_regression,
        // Jurisdictions
        crate::routes::jurisdictions::active_rulepack,
        crate::routes::jurisdictions::suggest_version,
        crate::routes::jurisdictions::resolve_tenant,
        crate::routes::jurisdictions::list_snapshots,
        crate::routes::jurisdictions::diff_snapshots,
        // Dashboard & statute
        crate::routes::dashboard::overview,
        crate::routes::statute::apply_findings,
        crate::routes::statute::clear_review,
        // Operations
        crate::middleware::metrics::metrics_handler,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::auth::Role,
        crate::middleware::metrics::MetricsSnapshot,
        crate::routes::rulepacks::InstallRulepackRequest,
        crate::routes::rulepacks::SubmitRequest,
        crate::routes::rulepacks::ActivateRequest,
        crate::routes::rulepacks::ApproveRequest,
        crate::routes::rulepacks::RejectRequest,
        crate::routes::rulepacks::ScheduleCanaryRequest,
        crate::routes::regression::RunRegressionRequest,
        crate::routes::regression::RunAccepted,
        crate::routes::jurisdictions::VersionSuggestion,
        crate::routes::statute::StatuteFindingsRequest,
    )),
    tags(
        (name = "rulepacks", description = "Rulepack lifecycle"),
        (name = "regression", description = "Regression runs"),
        (name = "jurisdictions", description = "Per-jurisdiction views"),
        (name = "dashboard", description = "Fleet health"),
        (name = "statute", description = "Statute change hooks"),
        (name = "operations", description = "Operational endpoints"),
    )
)]
pub struct ApiDoc;

/// Router serving `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
