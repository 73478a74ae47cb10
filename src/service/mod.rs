//! Business services sitting between the HTTP handlers and the stores.
//!
//! Handlers validate transport concerns (cookies, JSON shape) and hand the
//! verified claims plus typed requests to these services.

pub mod account;
pub mod blog;
pub mod engagement;

use bson::oid::ObjectId;

use crate::error::ApiError;

/// Parse a path id, distinguishing an absent id from a malformed one.
pub(crate) fn parse_object_id(value: &str, what: &str) -> Result<ObjectId, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::validation(format!("Missing {what} id")));
    }
    ObjectId::parse_str(value).map_err(|_| ApiError::validation(format!("Invalid {what} id")))
}
