//! Document Store Layer Abstraction
//!
//! This module provides an abstraction over the document store backends,
//! allowing the system to use different implementations (MongoDB, in-memory
//! mock) without affecting higher-level services.
//!
//! Reads and single-document writes go through [`DataStore`] directly.
//! Multi-document mutations (the like/unlike/comment workflows) go through
//! a [`StoreTransaction`] obtained from [`DataStore::begin`]: every write
//! staged on the transaction becomes visible at `commit` or not at all.

pub mod mock_store;
pub mod mongo_store;

use async_trait::async_trait;
use bson::oid::ObjectId;
use thiserror::Error;

use crate::models::{Blog, BlogUpdate, Comment, Like, User, UserUpdate};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced document does not exist.
    #[error("{0}")]
    NotFound(String),
    /// A uniqueness constraint rejected the write.
    #[error("{0}")]
    Duplicate(String),
    /// The backend failed or is unreachable.
    #[error("storage backend failure: {0}")]
    Unavailable(String),
}

/// Trait defining the document store interface: identity store, content
/// store and like ledger over the user/blog/comment/like collections.
#[async_trait]
pub trait DataStore: Send + Sync {
    // --- identity store ---

    async fn insert_user(&self, user: &User) -> Result<ObjectId, StoreError>;
    async fn find_user_by_id(&self, id: &ObjectId) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    /// Apply a partial profile update; returns the updated record, or
    /// `None` when the user does not exist.
    async fn update_user_profile(
        &self,
        id: &ObjectId,
        update: &UserUpdate,
    ) -> Result<Option<User>, StoreError>;
    async fn set_user_password(&self, id: &ObjectId, password_hash: &str)
        -> Result<(), StoreError>;
    async fn set_user_avatar(
        &self,
        id: &ObjectId,
        image_url: &str,
    ) -> Result<Option<User>, StoreError>;

    // --- content store ---

    async fn insert_blog(&self, blog: &Blog) -> Result<ObjectId, StoreError>;
    async fn find_blog(&self, id: &ObjectId) -> Result<Option<Blog>, StoreError>;
    async fn list_blogs(&self) -> Result<Vec<Blog>, StoreError>;
    async fn update_blog(
        &self,
        id: &ObjectId,
        update: &BlogUpdate,
    ) -> Result<Option<Blog>, StoreError>;
    /// Remove a blog; returns the deleted record. Comments and likes are
    /// intentionally left in place (no cascade).
    async fn delete_blog(&self, id: &ObjectId) -> Result<Option<Blog>, StoreError>;
    /// Distinct tag values across all blogs.
    async fn list_tags(&self) -> Result<Vec<String>, StoreError>;

    // --- like ledger ---

    async fn find_like(
        &self,
        blog_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<Option<Like>, StoreError>;

    // --- transactions ---

    /// Start a multi-document transaction.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;
}

/// Writes staged on one transaction commit together or not at all. A
/// transaction dropped without `commit` leaves the store untouched.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Insert a ledger entry. The (blog, user) uniqueness constraint may
    /// reject this at insert time or at commit time.
    async fn insert_like(&mut self, like: &Like) -> Result<ObjectId, StoreError>;
    async fn delete_like(&mut self, like_id: &ObjectId) -> Result<(), StoreError>;
    async fn push_blog_like(
        &mut self,
        blog_id: &ObjectId,
        like_id: &ObjectId,
    ) -> Result<(), StoreError>;
    async fn pull_blog_like(
        &mut self,
        blog_id: &ObjectId,
        like_id: &ObjectId,
    ) -> Result<(), StoreError>;
    async fn insert_comment(&mut self, comment: &Comment) -> Result<ObjectId, StoreError>;
    async fn push_blog_comment(
        &mut self,
        blog_id: &ObjectId,
        comment_id: &ObjectId,
    ) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn abort(self: Box<Self>) -> Result<(), StoreError>;
}
