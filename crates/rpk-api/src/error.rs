//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Registry errors keep their kind on the wire so a client can tell
//! "fix your input" (422) apart from "blocked by policy" (409
//! `POLICY_BLOCKED`, with an override hint) and from a workflow conflict
//! (409 `CONFLICT`). Internal details are logged, never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rpk_registry::RegistryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "POLICY_BLOCKED").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for some client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body or path could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Insufficient role (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Workflow transition not allowed from the current status (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Well-formed request refused by the regression gate (409).
    #[error("blocked by policy: {0}")]
    Policy(String),

    /// A collaborator could not serve the request (503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Policy(_) => (StatusCode::CONFLICT, "POLICY_BLOCKED"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }

        let details = match &self {
            Self::Policy(_) => Some(serde_json::json!({ "override_available": true })),
            _ => None,
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Validation(msg) => Self::Validation(msg),
            RegistryError::Policy(msg) => Self::Policy(msg),
            RegistryError::IllegalState(msg) => Self::Conflict(msg),
            RegistryError::NotFound(msg) => Self::NotFound(msg),
            RegistryError::Collaborator(msg) => Self::ServiceUnavailable(msg),
            RegistryError::Persistence(msg) => Self::Internal(msg),
        }
    }
}

impl From<rpk_core::ValidationError> for AppError {
    fn from(err: rpk_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn response_parts(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, body)
    }

    #[test]
    fn registry_kinds_map_to_distinct_responses() {
        let cases = [
            (RegistryError::Validation("v".into()), StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            (RegistryError::Policy("p".into()), StatusCode::CONFLICT, "POLICY_BLOCKED"),
            (RegistryError::IllegalState("i".into()), StatusCode::CONFLICT, "CONFLICT"),
            (RegistryError::NotFound("n".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (RegistryError::Collaborator("c".into()), StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
            (RegistryError::Persistence("x".into()), StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        ];
        for (err, status, code) in cases {
            let app = AppError::from(err);
            assert_eq!(app.status_and_code(), (status, code), "{app:?}");
        }
    }

    #[tokio::test]
    async fn policy_error_carries_override_hint() {
        let (status, body) =
            response_parts(AppError::Policy("latest regression run failed".into())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error.code, "POLICY_BLOCKED");
        assert!(body.error.message.contains("latest regression run failed"));
        assert_eq!(
            body.error.details,
            Some(serde_json::json!({"override_available": true}))
        );
    }

    #[tokio::test]
    async fn conflict_has_no_details() {
        let (status, body) = response_parts(AppError::Conflict("already active".into())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error.code, "CONFLICT");
        assert!(body.error.details.is_none());
    }

    #[tokio::test]
    async fn internal_hides_details() {
        let (status, body) =
            response_parts(AppError::Internal("run store write failed".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.code, "INTERNAL_ERROR");
        assert_eq!(body.error.message, "An internal error occurred");
    }

    #[test]
    fn core_validation_error_converts() {
        let err = AppError::from(rpk_core::ValidationError::InvalidVersion("1.x".into()));
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("1.x")));
    }

    #[test]
    fn error_body_skips_absent_details() {
        let body = ErrorBody {
            error: ErrorDetail {
                code: "NOT_FOUND".into(),
                message: "rulepack".into(),
                details: None,
            },
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(!json.contains("details"));
    }
}
