//! # Rulepack Lifecycle API
//!
//! - **POST `/v1/rulepacks`** install a draft (compliance admin)
//! - **GET `/v1/rulepacks`** list, optionally for one jurisdiction
//! - **GET `/v1/rulepacks/:id`** fetch one rulepack
//! - **POST `/v1/rulepacks/:id/submit`** draft → pending_approval
//! - **POST `/v1/rulepacks/:id/approve`** record approval and activate through the gate
//! - **POST `/v1/rulepacks/:id/reject`** pending_approval → draft
//! - **POST `/v1/rulepacks/:id/activate`** activate through the gate
//! - **POST `/v1/rulepacks/:id/archive`** draft/deprecated → archived
//! - **POST `/v1/rulepacks/:id/canary`** schedule a canary plan
//! - **PATCH `/v1/rulepacks/:id/metadata`** merge caller-owned metadata
//! - **GET `/v1/rulepacks/:id/runs`** regression runs, newest first
//!
//! Every mutation requires `compliance_admin`; the caller's subject is
//! recorded as the actor.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rpk_core::{RulepackId, VersionBump};
use rpk_registry::{
    ActivateOptions, ApproveOptions, CanaryPlan, CanaryWindow, InstallOptions, InstallRequest,
    MetadataPatch, RegressionRun, RegressionTest, ReleaseChannel, Rulepack,
};
use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_json, extract_validated_json, parse_path_id, Validate};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request to install a new draft rulepack.
#[derive(Debug, Deserialize, ToSchema)]
pub struct InstallRulepackRequest {
    /// Jurisdiction code (e.g., "GB").
    pub jurisdiction: String,
    /// Explicit `MAJOR.MINOR.PATCH`; suggested from `change_type` when absent.
    #[serde(default)]
    pub version: Option<String>,
    /// Opaque rule payload.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub rule_data: Value,
    /// Caller-owned metadata (description, authors, source_ref, notifications).
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: MetadataPatch,
    /// Regression vectors.
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub regression_tests: Vec<RegressionTest>,
    /// Start of legal effect.
    #[serde(default)]
    pub effective_from: Option<DateTime<Utc>>,
    /// End of legal effect.
    #[serde(default)]
    pub effective_to: Option<DateTime<Utc>>,
    /// `major`, `minor` or `patch`; used only when `version` is absent.
    #[serde(default)]
    pub change_type: Option<String>,
    /// Short description.
    #[serde(default)]
    pub description: Option<String>,
    /// Upstream source reference.
    #[serde(default)]
    pub source_ref: Option<String>,
}

impl Validate for InstallRulepackRequest {
    fn validate(&self) -> Result<(), String> {
        if self.jurisdiction.trim().is_empty() {
            return Err("jurisdiction must not be empty".to_string());
        }
        if self.rule_data.is_null() {
            return Err("rule_data is required".to_string());
        }
        if let Some(change) = &self.change_type {
            change.parse::<VersionBump>().map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

impl InstallRulepackRequest {
    fn into_install(self) -> Result<InstallRequest, AppError> {
        let change_type = self
            .change_type
            .as_deref()
            .map(str::parse::<VersionBump>)
            .transpose()?;
        Ok(InstallRequest {
            jurisdiction: self.jurisdiction,
            version: self.version,
            rule_data: self.rule_data,
            metadata: self.metadata,
            regression_tests: self.regression_tests,
            effective_from: self.effective_from,
            effective_to: self.effective_to,
            options: InstallOptions {
                change_type,
                description: self.description,
                source_ref: self.source_ref,
            },
        })
    }
}

/// Query parameters for listing rulepacks.
#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
    /// Restrict to one jurisdiction.
    pub jurisdiction: Option<String>,
}

/// Request to submit a draft for approval.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SubmitRequest {
    /// Review checklist items.
    #[serde(default)]
    pub checklist: Vec<String>,
}

/// Activation parameters shared by approve and activate.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ActivateRequest {
    /// Start of legal effect; activation time when absent.
    #[serde(default)]
    pub effective_from: Option<DateTime<Utc>>,
    /// `general` (default) or `canary`.
    #[serde(default)]
    #[schema(value_type = String)]
    pub release_channel: ReleaseChannel,
    /// Bypass the regression gate.
    #[serde(default)]
    pub allow_override: bool,
}

impl From<ActivateRequest> for ActivateOptions {
    fn from(req: ActivateRequest) -> Self {
        Self {
            effective_from: req.effective_from,
            release_channel: req.release_channel,
            allow_override: req.allow_override,
        }
    }
}

/// Request to approve a pending rulepack.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ApproveRequest {
    /// Reviewer notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Activation parameters.
    #[serde(flatten)]
    pub activation: ActivateRequest,
}

/// Request to reject a pending rulepack.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RejectRequest {
    /// Reviewer notes.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Request to schedule a canary rollout.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ScheduleCanaryRequest {
    /// Allow-listed tenants. Must not be empty.
    pub tenant_ids: Vec<String>,
    /// Share of listed tenants exposed, clamped into `[1, 100]`. Defaults to 100.
    #[serde(default = "full_rollout")]
    pub rollout_percent: i64,
    /// Window start.
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    /// Window end.
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
}

fn full_rollout() -> i64 {
    100
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Construct the rulepack lifecycle router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/rulepacks", get(list_rulepacks).post(install_rulepack))
        .route("/v1/rulepacks/:id", get(get_rulepack))
        .route("/v1/rulepacks/:id/submit", post(submit_rulepack))
        .route("/v1/rulepacks/:id/approve", post(approve_rulepack))
        .route("/v1/rulepacks/:id/reject", post(reject_rulepack))
        .route("/v1/rulepacks/:id/activate", post(activate_rulepack))
        .route("/v1/rulepacks/:id/archive", post(archive_rulepack))
        .route("/v1/rulepacks/:id/canary", post(schedule_canary))
        .route("/v1/rulepacks/:id/metadata", patch(update_metadata))
        .route("/v1/rulepacks/:id/runs", get(list_runs))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /v1/rulepacks: Install a draft rulepack.
#[utoipa::path(
    post,
    path = "/v1/rulepacks",
    request_body = InstallRulepackRequest,
    responses(
        (status = 201, description = "Rulepack installed as draft"),
        (status = 422, description = "Invalid or duplicate version", body = crate::error::ErrorBody),
    ),
    tag = "rulepacks"
)]
pub(crate) async fn install_rulepack(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<InstallRulepackRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Rulepack>), AppError> {
    require_role(&caller, Role::ComplianceAdmin)?;
    let req = extract_validated_json(body)?.into_install()?;
    let id = state.registry.install(req, &caller.actor())?;
    Ok((StatusCode::CREATED, Json(state.registry.get(&id)?)))
}

/// GET /v1/rulepacks: List rulepacks by jurisdiction, newest version first.
#[utoipa::path(
    get,
    path = "/v1/rulepacks",
    params(("jurisdiction" = Option<String>, Query, description = "Restrict to one jurisdiction")),
    responses((status = 200, description = "Rulepacks")),
    tag = "rulepacks"
)]
pub(crate) async fn list_rulepacks(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Rulepack>>, AppError> {
    Ok(Json(state.registry.list(params.jurisdiction.as_deref())?))
}

/// GET /v1/rulepacks/:id: Fetch one rulepack.
#[utoipa::path(
    get,
    path = "/v1/rulepacks/{id}",
    params(("id" = String, Path, description = "Rulepack id")),
    responses(
        (status = 200, description = "Rulepack"),
        (status = 404, description = "Unknown rulepack", body = crate::error::ErrorBody),
    ),
    tag = "rulepacks"
)]
pub(crate) async fn get_rulepack(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Rulepack>, AppError> {
    let id: RulepackId = parse_path_id(&id)?;
    Ok(Json(state.registry.get(&id)?))
}

/// POST /v1/rulepacks/:id/submit: Submit a draft for approval.
#[utoipa::path(
    post,
    path = "/v1/rulepacks/{id}/submit",
    params(("id" = String, Path, description = "Rulepack id")),
    request_body = SubmitRequest,
    responses(
        (status = 200, description = "Rulepack pending approval"),
        (status = 409, description = "Not a draft", body = crate::error::ErrorBody),
    ),
    tag = "rulepacks"
)]
pub(crate) async fn submit_rulepack(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<Rulepack>, AppError> {
    require_role(&caller, Role::ComplianceAdmin)?;
    let id: RulepackId = parse_path_id(&id)?;
    let req = extract_json(body)?;
    Ok(Json(state.registry.submit_for_approval(
        &id,
        &caller.actor(),
        req.checklist,
    )?))
}

/// POST /v1/rulepacks/:id/approve: Approve and activate a pending rulepack.
#[utoipa::path(
    post,
    path = "/v1/rulepacks/{id}/approve",
    params(("id" = String, Path, description = "Rulepack id")),
    request_body = ApproveRequest,
    responses(
        (status = 200, description = "Rulepack approved and active"),
        (status = 409, description = "Blocked by the regression gate or not pending", body = crate::error::ErrorBody),
    ),
    tag = "rulepacks"
)]
pub(crate) async fn approve_rulepack(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
    body: Result<Json<ApproveRequest>, JsonRejection>,
) -> Result<Json<Rulepack>, AppError> {
    require_role(&caller, Role::ComplianceAdmin)?;
    let id: RulepackId = parse_path_id(&id)?;
    let req = extract_json(body)?;
    let opts = ApproveOptions {
        notes: req.notes,
        activation: req.activation.into(),
    };
    Ok(Json(state.registry.approve(&id, &caller.actor(), opts)?))
}

/// POST /v1/rulepacks/:id/reject: Return a pending rulepack to draft.
#[utoipa::path(
    post,
    path = "/v1/rulepacks/{id}/reject",
    params(("id" = String, Path, description = "Rulepack id")),
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Rulepack back in draft"),
        (status = 409, description = "Not pending approval", body = crate::error::ErrorBody),
    ),
    tag = "rulepacks"
)]
pub(crate) async fn reject_rulepack(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
    body: Result<Json<RejectRequest>, JsonRejection>,
) -> Result<Json<Rulepack>, AppError> {
    require_role(&caller, Role::ComplianceAdmin)?;
    let id: RulepackId = parse_path_id(&id)?;
    let req = extract_json(body)?;
    Ok(Json(state.registry.reject(&id, &caller.actor(), req.notes)?))
}

/// POST /v1/rulepacks/:id/activate: Activate through the regression gate.
#[utoipa::path(
    post,
    path = "/v1/rulepacks/{id}/activate",
    params(("id" = String, Path, description = "Rulepack id")),
    request_body = ActivateRequest,
    responses(
        (status = 200, description = "Rulepack active"),
        (status = 409, description = "Blocked by the regression gate", body = crate::error::ErrorBody),
    ),
    tag = "rulepacks"
)]
pub(crate) async fn activate_rulepack(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
    body: Result<Json<ActivateRequest>, JsonRejection>,
) -> Result<Json<Rulepack>, AppError> {
    require_role(&caller, Role::ComplianceAdmin)?;
    let id: RulepackId = parse_path_id(&id)?;
    let req = extract_json(body)?;
    Ok(Json(state.registry.activate(&id, &caller.actor(), req.into())?))
}

/// POST /v1/rulepacks/:id/archive: Archive a draft or deprecated rulepack.
#[utoipa::path(
    post,
    path = "/v1/rulepacks/{id}/archive",
    params(("id" = String, Path, description = "Rulepack id")),
    responses(
        (status = 200, description = "Rulepack archived"),
        (status = 409, description = "Active or pending", body = crate::error::ErrorBody),
    ),
    tag = "rulepacks"
)]
pub(crate) async fn archive_rulepack(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<Json<Rulepack>, AppError> {
    require_role(&caller, Role::ComplianceAdmin)?;
    let id: RulepackId = parse_path_id(&id)?;
    Ok(Json(state.registry.archive(&id)?))
}

/// POST /v1/rulepacks/:id/canary: Schedule a canary rollout.
#[utoipa::path(
    post,
    path = "/v1/rulepacks/{id}/canary",
    params(("id" = String, Path, description = "Rulepack id")),
    request_body = ScheduleCanaryRequest,
    responses(
        (status = 200, description = "Canary plan recorded"),
        (status = 422, description = "Empty tenant list or bad window", body = crate::error::ErrorBody),
    ),
    tag = "rulepacks"
)]
pub(crate) async fn schedule_canary(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
    body: Result<Json<ScheduleCanaryRequest>, JsonRejection>,
) -> Result<Json<CanaryPlan>, AppError> {
    require_role(&caller, Role::ComplianceAdmin)?;
    let id: RulepackId = parse_path_id(&id)?;
    let req = extract_json(body)?;
    let plan = state.registry.schedule_canary(
        &id,
        req.tenant_ids,
        req.rollout_percent,
        CanaryWindow {
            start_at: req.start_at,
            end_at: req.end_at,
        },
    )?;
    Ok(Json(plan))
}

/// PATCH /v1/rulepacks/:id/metadata: Merge caller-owned metadata fields.
#[utoipa::path(
    patch,
    path = "/v1/rulepacks/{id}/metadata",
    params(("id" = String, Path, description = "Rulepack id")),
    request_body = Object,
    responses(
        (status = 200, description = "Updated rulepack"),
        (status = 422, description = "Registry-managed field supplied", body = crate::error::ErrorBody),
    ),
    tag = "rulepacks"
)]
pub(crate) async fn update_metadata(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
    body: Result<Json<MetadataPatch>, JsonRejection>,
) -> Result<Json<Rulepack>, AppError> {
    require_role(&caller, Role::ComplianceAdmin)?;
    let id: RulepackId = parse_path_id(&id)?;
    let patch = extract_json(body)?;
    Ok(Json(state.registry.update_metadata(&id, patch)?))
}

/// GET /v1/rulepacks/:id/runs: Regression runs of a rulepack, newest first.
#[utoipa::path(
    get,
    path = "/v1/rulepacks/{id}/runs",
    params(("id" = String, Path, description = "Rulepack id")),
    responses(
        (status = 200, description = "Regression runs"),
        (status = 404, description = "Unknown rulepack", body = crate::error::ErrorBody),
    ),
    tag = "rulepacks"
)]
pub(crate) async fn list_runs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<RegressionRun>>, AppError> {
    let id: RulepackId = parse_path_id(&id)?;
    state.registry.get(&id)?;
    Ok(Json(state.registry.runs_for(&id)))
}
