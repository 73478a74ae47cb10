//! Engagement workflows: like, unlike, comment creation.
//!
//! Each workflow runs its precondition checks in order, then wraps its
//! multi-document mutation in one store transaction: the ledger write and
//! the blog reference-list write become visible together or not at all.
//! Any intermediate failure aborts the transaction and surfaces as an
//! opaque server error; there are no retries.

use log::{error, info, warn};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::Claims;
use crate::error::ApiError;
use crate::media::{ImagePayload, MediaPipeline, COMMENTS_FOLDER};
use crate::models::{Comment, Like};
use crate::service::parse_object_id;
use crate::store::{DataStore, StoreError, StoreTransaction};

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
    /// Optional base64 data-URL image attachment.
    #[serde(default)]
    pub image: Option<String>,
}

pub struct EngagementService {
    store: Arc<dyn DataStore>,
    media: Arc<MediaPipeline>,
}

impl EngagementService {
    pub fn new(store: Arc<dyn DataStore>, media: Arc<MediaPipeline>) -> Self {
        Self { store, media }
    }

    /// Record that the caller likes a blog. Rejects a second like for the
    /// same pair rather than silently accepting it.
    pub async fn like(&self, blog_id: &str, claims: &Claims) -> Result<Like, ApiError> {
        let blog_id = parse_object_id(blog_id, "blog")?;
        let caller = claims.object_id()?;

        if self.store.find_user_by_id(&caller).await?.is_none() {
            return Err(ApiError::not_found("User not found"));
        }
        if self.store.find_blog(&blog_id).await?.is_none() {
            return Err(ApiError::not_found("Blog not found"));
        }
        if self.store.find_like(&blog_id, &caller).await?.is_some() {
            return Err(ApiError::conflict("You have already liked this blog"));
        }

        let like = Like::new(blog_id, caller);
        let mut txn = self.store.begin().await?;
        let staged = match Self::apply_like(txn.as_mut(), &like).await {
            Ok(staged) => match txn.commit().await {
                Ok(()) => Ok(staged),
                Err(e) => Err(e),
            },
            Err(e) => {
                abort_quietly(txn).await;
                Err(e)
            }
        };

        match staged {
            Ok(stored) => {
                info!("user {} liked blog {}", caller.to_hex(), blog_id.to_hex());
                Ok(stored)
            }
            // The unique (blog, user) index may beat the precondition check
            // under concurrent likes; that race is still "already liked".
            Err(StoreError::Duplicate(_)) => {
                Err(ApiError::conflict("You have already liked this blog"))
            }
            Err(e) => Err(workflow_failure("like", e)),
        }
    }

    async fn apply_like(
        txn: &mut dyn StoreTransaction,
        like: &Like,
    ) -> Result<Like, StoreError> {
        let id = txn.insert_like(like).await?;
        txn.push_blog_like(&like.blog, &id).await?;
        let mut stored = like.clone();
        stored.id = Some(id);
        Ok(stored)
    }

    /// Remove the caller's like. The ledger entry and the blog's reference
    /// are removed in the same transaction so they never diverge.
    pub async fn unlike(&self, blog_id: &str, claims: &Claims) -> Result<Like, ApiError> {
        let blog_id = parse_object_id(blog_id, "blog")?;
        let caller = claims.object_id()?;

        if self.store.find_user_by_id(&caller).await?.is_none() {
            return Err(ApiError::not_found("User not found"));
        }
        if self.store.find_blog(&blog_id).await?.is_none() {
            return Err(ApiError::not_found("Blog not found"));
        }
        let like = self
            .store
            .find_like(&blog_id, &caller)
            .await?
            .ok_or_else(|| ApiError::conflict("You have not liked this blog"))?;
        let like_id = like
            .id
            .ok_or_else(|| ApiError::dependency("ledger entry has no id"))?;

        let mut txn = self.store.begin().await?;
        let result = match Self::apply_unlike(txn.as_mut(), &blog_id, &like_id).await {
            Ok(()) => txn.commit().await,
            Err(e) => {
                abort_quietly(txn).await;
                Err(e)
            }
        };

        match result {
            Ok(()) => {
                info!("user {} unliked blog {}", caller.to_hex(), blog_id.to_hex());
                Ok(like)
            }
            Err(e) => Err(workflow_failure("unlike", e)),
        }
    }

    async fn apply_unlike(
        txn: &mut dyn StoreTransaction,
        blog_id: &bson::oid::ObjectId,
        like_id: &bson::oid::ObjectId,
    ) -> Result<(), StoreError> {
        txn.delete_like(like_id).await?;
        txn.pull_blog_like(blog_id, like_id).await?;
        Ok(())
    }

    /// Create a comment, optionally with an image attachment. The image is
    /// validated and uploaded before any store write; the comment insert
    /// and the blog reference append then share one transaction.
    pub async fn create_comment(
        &self,
        blog_id: &str,
        request: &CreateCommentRequest,
        claims: &Claims,
    ) -> Result<Comment, ApiError> {
        if request.content.trim().is_empty() || blog_id.trim().is_empty() {
            return Err(ApiError::validation("Missing content or blog id"));
        }
        let blog_id = parse_object_id(blog_id, "blog")?;
        let caller = claims.object_id()?;

        if self.store.find_user_by_id(&caller).await?.is_none() {
            return Err(ApiError::not_found("User not found"));
        }

        let image_url = match request.image.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(encoded) => {
                let payload = ImagePayload::from_base64(encoded)?;
                let hint = format!("{}-{}", caller.to_hex(), blog_id.to_hex());
                Some(
                    self.media
                        .stage_and_upload(&payload, COMMENTS_FOLDER, &hint)
                        .await?,
                )
            }
            None => None,
        };

        let comment = Comment::new(blog_id, caller, request.content.trim(), image_url.clone());
        let mut txn = self.store.begin().await?;
        let result = match Self::apply_comment(txn.as_mut(), &comment).await {
            Ok(stored) => match txn.commit().await {
                Ok(()) => Ok(stored),
                Err(e) => Err(e),
            },
            Err(e) => {
                abort_quietly(txn).await;
                Err(e)
            }
        };

        match result {
            Ok(stored) => {
                info!(
                    "user {} commented on blog {}",
                    caller.to_hex(),
                    blog_id.to_hex()
                );
                Ok(stored)
            }
            Err(e) => {
                // The remote copy has no owning comment now; nothing deletes
                // it (see DESIGN.md).
                if let Some(url) = &image_url {
                    warn!("comment transaction failed, uploaded image orphaned at {url}");
                }
                Err(workflow_failure("comment", e))
            }
        }
    }

    async fn apply_comment(
        txn: &mut dyn StoreTransaction,
        comment: &Comment,
    ) -> Result<Comment, StoreError> {
        let id = txn.insert_comment(comment).await?;
        txn.push_blog_comment(&comment.blog, &id).await?;
        let mut stored = comment.clone();
        stored.id = Some(id);
        Ok(stored)
    }
}

/// Transaction-phase failures are dependency errors: the caller learns the
/// workflow failed, the specifics stay in the log.
fn workflow_failure(workflow: &str, err: StoreError) -> ApiError {
    error!("{workflow} workflow aborted: {err}");
    ApiError::dependency("Failed to complete request")
}

async fn abort_quietly(txn: Box<dyn StoreTransaction>) {
    if let Err(e) = txn.abort().await {
        warn!("transaction abort failed: {e}");
    }
}
