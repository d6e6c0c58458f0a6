//! # Statute API
//!
//! - **POST `/v1/statute/findings`** an external statute monitor pushes
//!   scan findings; each is applied through the registry's statute hooks
//! - **POST `/v1/rulepacks/:id/statute-review/clear`** clear the review flag

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use rpk_core::RulepackId;
use rpk_registry::{Rulepack, StatuteFinding, StatuteScanReport};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, parse_path_id, Validate};
use crate::state::AppState;

/// A batch of scan findings.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StatuteFindingsRequest {
    /// One entry per scanned jurisdiction.
    #[schema(value_type = Vec<Object>)]
    pub findings: Vec<StatuteFinding>,
    /// Start a `scheduled` regression run for every flagged pack. Defaults to true.
    #[serde(default = "trigger_by_default")]
    pub trigger_regression: bool,
}

fn trigger_by_default() -> bool {
    true
}

impl Validate for StatuteFindingsRequest {
    fn validate(&self) -> Result<(), String> {
        if self
            .findings
            .iter()
            .any(|f| f.jurisdiction.trim().is_empty())
        {
            return Err("every finding must name a jurisdiction".to_string());
        }
        Ok(())
    }
}

/// Construct the statute router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/statute/findings", post(apply_findings))
        .route(
            "/v1/rulepacks/:id/statute-review/clear",
            post(clear_review),
        )
}

/// POST /v1/statute/findings: Apply statute monitor findings.
#[utoipa::path(
    post,
    path = "/v1/statute/findings",
    request_body = StatuteFindingsRequest,
    responses(
        (status = 200, description = "What the findings changed"),
        (status = 422, description = "Malformed finding", body = crate::error::ErrorBody),
    ),
    tag = "statute"
)]
pub(crate) async fn apply_findings(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<StatuteFindingsRequest>, JsonRejection>,
) -> Result<Json<StatuteScanReport>, AppError> {
    require_role(&caller, Role::ComplianceAdmin)?;
    let req = extract_validated_json(body)?;
    Ok(Json(
        state
            .registry
            .apply_statute_findings(&req.findings, req.trigger_regression),
    ))
}

/// POST /v1/rulepacks/:id/statute-review/clear: Clear the statute review flag.
#[utoipa::path(
    post,
    path = "/v1/rulepacks/{id}/statute-review/clear",
    params(("id" = String, Path, description = "Rulepack id")),
    responses(
        (status = 200, description = "Rulepack with the flag cleared"),
        (status = 404, description = "Unknown rulepack", body = crate::error::ErrorBody),
    ),
    tag = "statute"
)]
pub(crate) async fn clear_review(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<Json<Rulepack>, AppError> {
    require_role(&caller, Role::ComplianceAdmin)?;
    let id: RulepackId = parse_path_id(&id)?;
    Ok(Json(state.registry.clear_statute_review(&id)?))
}
