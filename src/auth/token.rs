//! Signed session tokens.
//!
//! `TokenAuthority` turns a stored user into an opaque HS256 token and
//! back into a verified claim set. Verification is pure: no store access,
//! no panics; absent, malformed, tampered or expired tokens all come back
//! as `Unauthorized`.

use bson::oid::ObjectId;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::{Role, User};

/// Name of the http-only cookie carrying the token.
pub const AUTH_COOKIE: &str = "auth";

/// Verified payload of a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Hex-encoded user id
    pub id: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// The caller's id as a store key. A claim set that was signed by us
    /// always carries a valid hex id, so failure here means a token signed
    /// for a foreign payload and is treated as unauthorized.
    pub fn object_id(&self) -> Result<ObjectId, ApiError> {
        ObjectId::parse_str(&self.id).map_err(|_| ApiError::Unauthorized)
    }
}

pub struct TokenAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenAuthority {
    pub fn new(secret: &str, ttl_days: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::days(ttl_days),
        }
    }

    /// Sign a claim set for the given user.
    pub fn sign(&self, user: &User) -> Result<String, ApiError> {
        let id = user
            .id
            .ok_or_else(|| ApiError::dependency("user record has no id"))?;
        let now = Utc::now();
        let claims = Claims {
            id: id.to_hex(),
            role: user.role,
            name: user.name.clone(),
            email: user.email.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::dependency(format!("failed to sign token: {e}")))
    }

    /// Verify a token and return its claims. Signature and expiry are both
    /// checked; any failure maps to `Unauthorized`.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| ApiError::Unauthorized)
    }
}
