//! # Regression API
//!
//! - **POST `/v1/rulepacks/:id/regression`** start a run; `"wait": true`
//!   returns the completed run, otherwise 202 with the run id
//! - **GET `/v1/rulepacks/:id/regression/latest`** most recent run
//! - **GET `/v1/regression/:run_id`** one run
//! - **POST `/v1/regression/:run_id/cancel`** cancel a running run

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rpk_core::{RulepackId, RunId};
use rpk_registry::{RegressionRun, RunStatus, RunType};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_json, parse_path_id};
use crate::state::AppState;

/// Request to start a regression run.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RunRegressionRequest {
    /// `manual` (default), `scheduled` or `pre_activation`.
    #[serde(default = "manual")]
    #[schema(value_type = String)]
    pub run_type: RunType,
    /// Wait for completion instead of returning immediately.
    #[serde(default)]
    pub wait: bool,
}

fn manual() -> RunType {
    RunType::Manual
}

/// Returned when a run was started without waiting.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RunAccepted {
    /// Id of the started run.
    #[schema(value_type = String)]
    pub run_id: RunId,
    /// Always `running`.
    #[schema(value_type = String)]
    pub status: RunStatus,
}

/// Construct the regression router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/rulepacks/:id/regression", post(start_regression))
        .route("/v1/rulepacks/:id/regression/latest", get(latest_regression))
        .route("/v1/regression/:run_id", get(get_regression))
        .route("/v1/regression/:run_id/cancel", post(cancel_regression))
}

/// POST /v1/rulepacks/:id/regression: Start a regression run.
#[utoipa::path(
    post,
    path = "/v1/rulepacks/{id}/regression",
    params(("id" = String, Path, description = "Rulepack id")),
    request_body = RunRegressionRequest,
    responses(
        (status = 200, description = "Completed run (wait = true)"),
        (status = 202, description = "Run started", body = RunAccepted),
        (status = 404, description = "Unknown rulepack", body = crate::error::ErrorBody),
    ),
    tag = "regression"
)]
pub(crate) async fn start_regression(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
    body: Result<Json<RunRegressionRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    require_role(&caller, Role::ComplianceAdmin)?;
    let id: RulepackId = parse_path_id(&id)?;
    let req = extract_json(body)?;
    let actor = Some(caller.actor());
    if req.wait {
        let run = state.registry.run_blocking(&id, req.run_type, actor).await?;
        return Ok(Json(run).into_response());
    }
    let run_id = state.registry.run(&id, req.run_type, actor)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(RunAccepted {
            run_id,
            status: RunStatus::Running,
        }),
    )
        .into_response())
}

/// GET /v1/rulepacks/:id/regression/latest: Most recent run of a rulepack.
#[utoipa::path(
    get,
    path = "/v1/rulepacks/{id}/regression/latest",
    params(("id" = String, Path, description = "Rulepack id")),
    responses(
        (status = 200, description = "Latest run"),
        (status = 404, description = "Unknown rulepack or no run yet", body = crate::error::ErrorBody),
    ),
    tag = "regression"
)]
pub(crate) async fn latest_regression(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RegressionRun>, AppError> {
    let id: RulepackId = parse_path_id(&id)?;
    state.registry.get(&id)?;
    state
        .registry
        .latest_run(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no regression run for rulepack {id}")))
}

/// GET /v1/regression/:run_id: Fetch one run.
#[utoipa::path(
    get,
    path = "/v1/regression/{run_id}",
    params(("run_id" = String, Path, description = "Run id")),
    responses(
        (status = 200, description = "Regression run"),
        (status = 404, description = "Unknown run", body = crate::error::ErrorBody),
    ),
    tag = "regression"
)]
pub(crate) async fn get_regression(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<RegressionRun>, AppError> {
    let run_id: RunId = parse_path_id(&run_id)?;
    Ok(Json(state.registry.get_run(&run_id)?))
}

/// POST /v1/regression/:run_id/cancel: Cancel a running run.
#[utoipa::path(
    post,
    path = "/v1/regression/{run_id}/cancel",
    params(("run_id" = String, Path, description = "Run id")),
    responses(
        (status = 200, description = "Run after the cancellation request"),
        (status = 409, description = "Run already completed", body = crate::error::ErrorBody),
    ),
    tag = "regression"
)]
pub(crate) async fn cancel_regression(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(run_id): Path<String>,
) -> Result<Json<RegressionRun>, AppError> {
    require_role(&caller, Role::ComplianceAdmin)?;
    let run_id: RunId = parse_path_id(&run_id)?;
    state.registry.cancel(&run_id)?;
    Ok(Json(state.registry.get_run(&run_id)?))
}
