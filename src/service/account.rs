//! Account operations: sign-up, sign-in, profile, password, avatar.

use bson::DateTime;
use chrono::Utc;
use log::info;
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::{hash_password, verify_password, Claims, TokenAuthority};
use crate::error::ApiError;
use crate::media::{ImagePayload, MediaPipeline, AVATARS_FOLDER};
use crate::models::{User, UserUpdate, UserView};
use crate::service::parse_object_id;
use crate::store::{DataStore, StoreError};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub personal_website: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<chrono::DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

pub struct AccountService {
    store: Arc<dyn DataStore>,
    media: Arc<MediaPipeline>,
    tokens: Arc<TokenAuthority>,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn DataStore>,
        media: Arc<MediaPipeline>,
        tokens: Arc<TokenAuthority>,
    ) -> Self {
        Self {
            store,
            media,
            tokens,
        }
    }

    pub async fn sign_up(&self, request: &SignUpRequest) -> Result<UserView, ApiError> {
        let username = request.username.trim();
        let email = request.email.trim().to_lowercase();
        if username.is_empty() || email.is_empty() || request.password.is_empty() {
            return Err(ApiError::validation(
                "Missing 'username', 'email' or 'password'",
            ));
        }
        if request.password.len() < MIN_PASSWORD_LEN {
            return Err(ApiError::validation(
                "Password must be at least 8 characters",
            ));
        }

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(ApiError::conflict("Email already exists"));
        }
        if self.store.find_user_by_username(username).await?.is_some() {
            return Err(ApiError::conflict("Username already exists"));
        }

        let hash = hash_password(&request.password)?;
        let mut user = User::new(username, request.name.clone(), &email, &hash);
        // The unique index can still reject a racing duplicate sign-up.
        let id = self.store.insert_user(&user).await.map_err(|e| match e {
            StoreError::Duplicate(_) => ApiError::conflict("Email already exists"),
            e => e.into(),
        })?;
        user.id = Some(id);
        info!("created user {} ({})", username, id.to_hex());
        Ok(UserView::from(user))
    }

    /// Verify credentials and issue a signed token for the cookie.
    pub async fn sign_in(&self, request: &SignInRequest) -> Result<(UserView, String), ApiError> {
        let email = request.email.trim().to_lowercase();
        if email.is_empty() || request.password.is_empty() {
            return Err(ApiError::validation("Missing email or password"));
        }

        let user = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| ApiError::validation("User does not exist"))?;
        if !verify_password(&request.password, &user.password)? {
            return Err(ApiError::validation("Incorrect password"));
        }

        let token = self.tokens.sign(&user)?;
        Ok((UserView::from(user), token))
    }

    pub async fn me(&self, claims: &Claims) -> Result<UserView, ApiError> {
        let id = claims.object_id()?;
        let user = self
            .store
            .find_user_by_id(&id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))?;
        Ok(UserView::from(user))
    }

    pub async fn get_user(&self, user_id: &str) -> Result<UserView, ApiError> {
        let id = parse_object_id(user_id, "user")?;
        let user = self
            .store
            .find_user_by_id(&id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))?;
        Ok(UserView::from(user))
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        request: &UpdateProfileRequest,
    ) -> Result<UserView, ApiError> {
        let id = parse_object_id(user_id, "user")?;
        if self.store.find_user_by_id(&id).await?.is_none() {
            return Err(ApiError::not_found("User not found"));
        }

        let update = UserUpdate {
            username: request.username.as_ref().map(|v| v.trim().to_string()),
            email: request.email.as_ref().map(|v| v.trim().to_lowercase()),
            name: request.name.clone(),
            location: request.location.clone(),
            bio: request.bio.clone(),
            personal_website: request.personal_website.clone(),
            date_of_birth: request.date_of_birth.map(DateTime::from_chrono),
        };
        let user = self
            .store
            .update_user_profile(&id, &update)
            .await
            .map_err(|e| match e {
                StoreError::Duplicate(_) => {
                    ApiError::conflict("Email or username already exists")
                }
                e => e.into(),
            })?
            .ok_or_else(|| ApiError::not_found("User not found"))?;
        Ok(UserView::from(user))
    }

    pub async fn update_password(
        &self,
        claims: &Claims,
        request: &UpdatePasswordRequest,
    ) -> Result<(), ApiError> {
        let id = claims.object_id()?;
        let user = self
            .store
            .find_user_by_id(&id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))?;

        if !verify_password(&request.current_password, &user.password)? {
            return Err(ApiError::validation("Incorrect password"));
        }
        if request.new_password.len() < MIN_PASSWORD_LEN {
            return Err(ApiError::validation(
                "Password must be at least 8 characters",
            ));
        }

        let hash = hash_password(&request.new_password)?;
        self.store.set_user_password(&id, &hash).await?;
        info!("password updated for user {}", id.to_hex());
        Ok(())
    }

    /// Upload a new avatar through the media pipeline and store its URL.
    pub async fn update_avatar(
        &self,
        claims: &Claims,
        image: &ImagePayload,
    ) -> Result<(String, UserView), ApiError> {
        let id = claims.object_id()?;
        if self.store.find_user_by_id(&id).await?.is_none() {
            return Err(ApiError::not_found("User not found"));
        }

        let url = self
            .media
            .stage_and_upload(image, AVATARS_FOLDER, &id.to_hex())
            .await?;
        let user = self
            .store
            .set_user_avatar(&id, &url)
            .await?
            .ok_or_else(|| ApiError::dependency("Update failed"))?;
        Ok((url, UserView::from(user)))
    }
}
