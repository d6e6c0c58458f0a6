//! # rpk-api: Axum API for the Rulepack Registry
//!
//! Thin request-facing layer over [`rpk_registry::RulepackRegistry`]. All
//! domain rules live in the registry; handlers parse, authorize, call one
//! registry operation and map its error kind onto HTTP.
//!
//! ## API Surface
//!
//! | Prefix                    | Module                        |
//! |---------------------------|-------------------------------|
//! | `/v1/rulepacks/*`         | [`routes::rulepacks`], [`routes::regression`] |
//! | `/v1/regression/*`        | [`routes::regression`]        |
//! | `/v1/jurisdictions/*`     | [`routes::jurisdictions`]     |
//! | `/v1/dashboard`           | [`routes::dashboard`]         |
//! | `/v1/statute/*`           | [`routes::statute`]           |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```
//!
//! Health probes (`/health/*`) sit outside the auth middleware.

pub mod auth;
pub mod error;
pub mod evaluator;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::middleware::from_fn;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::middleware::metrics::ApiMetrics;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };
    let metrics = ApiMetrics::new();

    let api = Router::new()
        .merge(routes::rulepacks::router())
        .merge(routes::regression::router())
        .merge(routes::jurisdictions::router())
        .merge(routes::dashboard::router())
        .merge(routes::statute::router())
        .merge(openapi::router())
        .route("/metrics", get(middleware::metrics::metrics_handler))
        .layer(from_fn(auth::auth_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .layer(axum::Extension(metrics))
        .with_state(state);

    let health = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness));

    Router::new().merge(health).merge(api)
}

/// Liveness probe.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe.
async fn readiness() -> &'static str {
    "ready"
}
