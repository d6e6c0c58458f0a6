//! # Jurisdiction API
//!
//! Read-only views keyed by jurisdiction: the active pack, the next version
//! suggestion, per-tenant resolution under a canary, and the snapshot
//! history with structural diffs.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use rpk_core::{JurisdictionId, VersionBump};
use rpk_registry::version::validate_semver;
use rpk_registry::{Rulepack, SnapshotDiff, SnapshotSummary};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::state::AppState;

/// Query parameters for the version suggestion.
#[derive(Debug, Deserialize, Default)]
pub struct SuggestParams {
    /// `major`, `minor` (default) or `patch`.
    pub bump: Option<String>,
}

/// Suggested next version.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VersionSuggestion {
    /// Jurisdiction.
    pub jurisdiction: String,
    /// Bump applied.
    pub bump: String,
    /// Suggested `MAJOR.MINOR.PATCH`.
    pub version: String,
}

/// Query parameters for a snapshot diff.
#[derive(Debug, Deserialize)]
pub struct DiffParams {
    /// Older version.
    pub from: String,
    /// Newer version.
    pub to: String,
}

/// Construct the jurisdiction router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/jurisdictions/:jurisdiction/active", get(active_rulepack))
        .route(
            "/v1/jurisdictions/:jurisdiction/suggest-version",
            get(suggest_version),
        )
        .route(
            "/v1/jurisdictions/:jurisdiction/tenants/:tenant_id/rulepack",
            get(resolve_tenant),
        )
        .route("/v1/jurisdictions/:jurisdiction/snapshots", get(list_snapshots))
        .route("/v1/jurisdictions/:jurisdiction/diff", get(diff_snapshots))
}

/// GET /v1/jurisdictions/:jurisdiction/active: General-channel active pack.
#[utoipa::path(
    get,
    path = "/v1/jurisdictions/{jurisdiction}/active",
    params(("jurisdiction" = String, Path, description = "Jurisdiction code")),
    responses(
        (status = 200, description = "Active rulepack"),
        (status = 404, description = "No active rulepack", body = crate::error::ErrorBody),
    ),
    tag = "jurisdictions"
)]
pub(crate) async fn active_rulepack(
    State(state): State<AppState>,
    Path(jurisdiction): Path<String>,
) -> Result<Json<Rulepack>, AppError> {
    state
        .registry
        .get_active(&jurisdiction)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no active rulepack for {jurisdiction}")))
}

/// GET /v1/jurisdictions/:jurisdiction/suggest-version: Next version for a bump.
#[utoipa::path(
    get,
    path = "/v1/jurisdictions/{jurisdiction}/suggest-version",
    params(
        ("jurisdiction" = String, Path, description = "Jurisdiction code"),
        ("bump" = Option<String>, Query, description = "major, minor or patch"),
    ),
    responses(
        (status = 200, description = "Suggested version", body = VersionSuggestion),
        (status = 422, description = "Unknown bump", body = crate::error::ErrorBody),
    ),
    tag = "jurisdictions"
)]
pub(crate) async fn suggest_version(
    State(state): State<AppState>,
    Path(jurisdiction): Path<String>,
    Query(params): Query<SuggestParams>,
) -> Result<Json<VersionSuggestion>, AppError> {
    let bump = match params.bump.as_deref() {
        Some(raw) => raw.parse::<VersionBump>()?,
        None => VersionBump::default(),
    };
    let version = state.registry.suggest_next(&jurisdiction, bump)?;
    Ok(Json(VersionSuggestion {
        jurisdiction: JurisdictionId::new(jurisdiction.as_str())?.to_string(),
        bump: bump.to_string(),
        version: version.to_string(),
    }))
}

/// GET /v1/jurisdictions/:jurisdiction/tenants/:tenant_id/rulepack: Pack serving a tenant.
#[utoipa::path(
    get,
    path = "/v1/jurisdictions/{jurisdiction}/tenants/{tenant_id}/rulepack",
    params(
        ("jurisdiction" = String, Path, description = "Jurisdiction code"),
        ("tenant_id" = String, Path, description = "Tenant id"),
    ),
    responses(
        (status = 200, description = "Rulepack serving the tenant"),
        (status = 404, description = "No active rulepack", body = crate::error::ErrorBody),
    ),
    tag = "jurisdictions"
)]
pub(crate) async fn resolve_tenant(
    State(state): State<AppState>,
    Path((jurisdiction, tenant_id)): Path<(String, String)>,
) -> Result<Json<Rulepack>, AppError> {
    state
        .registry
        .resolve_for_tenant(&jurisdiction, &tenant_id)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no active rulepack for {jurisdiction}")))
}

/// GET /v1/jurisdictions/:jurisdiction/snapshots: Stored snapshots, oldest version first.
#[utoipa::path(
    get,
    path = "/v1/jurisdictions/{jurisdiction}/snapshots",
    params(("jurisdiction" = String, Path, description = "Jurisdiction code")),
    responses((status = 200, description = "Snapshots")),
    tag = "jurisdictions"
)]
pub(crate) async fn list_snapshots(
    State(state): State<AppState>,
    Path(jurisdiction): Path<String>,
) -> Result<Json<Vec<SnapshotSummary>>, AppError> {
    let jurisdiction = JurisdictionId::new(jurisdiction.as_str())?;
    let snapshots = state
        .registry
        .snapshots()
        .list_snapshots(&jurisdiction)
        .map_err(rpk_registry::RegistryError::from)?;
    Ok(Json(snapshots))
}

/// GET /v1/jurisdictions/:jurisdiction/diff: Structural diff of two snapshot versions.
#[utoipa::path(
    get,
    path = "/v1/jurisdictions/{jurisdiction}/diff",
    params(
        ("jurisdiction" = String, Path, description = "Jurisdiction code"),
        ("from" = String, Query, description = "Older version"),
        ("to" = String, Query, description = "Newer version"),
    ),
    responses(
        (status = 200, description = "Diff"),
        (status = 404, description = "Version not stored", body = crate::error::ErrorBody),
    ),
    tag = "jurisdictions"
)]
pub(crate) async fn diff_snapshots(
    State(state): State<AppState>,
    Path(jurisdiction): Path<String>,
    Query(params): Query<DiffParams>,
) -> Result<Json<SnapshotDiff>, AppError> {
    let jurisdiction = JurisdictionId::new(jurisdiction.as_str())?;
    let from = validate_semver(&params.from)?;
    let to = validate_semver(&params.to)?;
    let diff = state
        .registry
        .snapshots()
        .diff_snapshots(&jurisdiction, &from, &to)
        .map_err(rpk_registry::RegistryError::from)?;
    Ok(Json(diff))
}
