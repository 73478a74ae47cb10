//! API error taxonomy.
//!
//! One variant per error category; each maps to a fixed HTTP status and a
//! JSON `{"error": …}` body. Store and media failures are converted at the
//! service boundary so handlers only ever deal in `ApiError`.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::media::MediaError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed input; surfaced before any store access.
    #[error("{0}")]
    Validation(String),
    /// Missing or invalid credential; surfaced before any mutation.
    #[error("Unauthorized")]
    Unauthorized,
    /// A referenced user, blog, comment or like does not exist.
    #[error("{0}")]
    NotFound(String),
    /// State conflict: duplicate like, duplicate email/username.
    #[error("{0}")]
    Conflict(String),
    /// Store or external-service failure; details stay in the server log.
    #[error("{0}")]
    Dependency(String),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ApiError::Conflict(msg.into())
    }

    pub fn dependency(msg: impl Into<String>) -> Self {
        ApiError::Dependency(msg.into())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Dependency(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => ApiError::NotFound(msg),
            StoreError::Duplicate(msg) => ApiError::Conflict(msg),
            StoreError::Unavailable(msg) => {
                log::error!("store failure: {}", msg);
                ApiError::Dependency("Internal storage error".to_string())
            }
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::UnsupportedType(_) => ApiError::Validation("Invalid file type".to_string()),
            MediaError::TooLarge(_) => ApiError::Validation("File size too large".to_string()),
            MediaError::InvalidPayload(_) => ApiError::Validation("Invalid image data".to_string()),
            MediaError::Staging(e) => {
                log::error!("image staging failure: {}", e);
                ApiError::Dependency("Failed to stage image".to_string())
            }
            MediaError::Upload(e) => {
                log::error!("image upload failure: {}", e);
                ApiError::Dependency("Failed to upload image".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(ApiError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::conflict("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::dependency("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn store_duplicate_maps_to_conflict() {
        let err: ApiError = StoreError::Duplicate("Email already exists".to_string()).into();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(err.to_string(), "Email already exists");
    }

    #[test]
    fn dependency_failures_stay_opaque() {
        let err: ApiError = StoreError::Unavailable("connection reset by peer".to_string()).into();
        assert_eq!(err.to_string(), "Internal storage error");
    }
}
