//! # Custom Extractors & Validation
//!
//! The [`Validate`] trait for request DTOs, JSON body helpers that map
//! rejections onto [`AppError`], and path-identifier parsing.

use std::str::FromStr;

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::AppError;

/// Business rules a request DTO checks beyond what serde enforces.
pub trait Validate {
    /// Validate business rules. Returns an error message on failure.
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and validate it using the [`Validate`] trait.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

/// Parse an identifier taken from the request path.
///
/// Malformed identifiers are a 400, not a 404: the resource was never
/// addressable.
pub fn parse_path_id<T>(raw: &str) -> Result<T, AppError>
where
    T: FromStr<Err = rpk_core::ValidationError>,
{
    raw.parse::<T>()
        .map_err(|err| AppError::BadRequest(err.to_string()))
}
