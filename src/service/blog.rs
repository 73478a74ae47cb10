//! Blog CRUD and tag listing.

use log::info;
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::Claims;
use crate::error::ApiError;
use crate::models::{Blog, BlogUpdate};
use crate::service::parse_object_id;
use crate::store::DataStore;

#[derive(Debug, Deserialize)]
pub struct CreateBlogRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBlogRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub published: Option<bool>,
}

/// Lowercased title with spaces replaced by hyphens. Not unique.
fn slugify(title: &str) -> String {
    title.to_lowercase().replace(' ', "-")
}

pub struct BlogService {
    store: Arc<dyn DataStore>,
}

impl BlogService {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    /// Create an unpublished blog owned by the caller.
    pub async fn create(
        &self,
        request: &CreateBlogRequest,
        claims: &Claims,
    ) -> Result<Blog, ApiError> {
        let title = request.title.trim();
        if title.is_empty() || request.content.is_empty() {
            return Err(ApiError::validation("Missing title or content"));
        }
        let author = claims.object_id()?;

        let mut blog = Blog::new(
            author,
            title,
            &slugify(title),
            &request.content,
            request.tags.clone(),
        );
        let id = self.store.insert_blog(&blog).await?;
        blog.id = Some(id);
        info!("user {} created blog {}", author.to_hex(), id.to_hex());
        Ok(blog)
    }

    pub async fn get(&self, blog_id: &str) -> Result<Blog, ApiError> {
        let id = parse_object_id(blog_id, "blog")?;
        self.store
            .find_blog(&id)
            .await?
            .ok_or_else(|| ApiError::not_found("Blog not found"))
    }

    pub async fn list(&self) -> Result<Vec<Blog>, ApiError> {
        Ok(self.store.list_blogs().await?)
    }

    /// Update a blog; a new title re-derives the slug.
    pub async fn update(
        &self,
        blog_id: &str,
        request: &UpdateBlogRequest,
    ) -> Result<Blog, ApiError> {
        let id = parse_object_id(blog_id, "blog")?;
        let update = BlogUpdate {
            title: request.title.as_ref().map(|t| t.trim().to_string()),
            slug: request.title.as_ref().map(|t| slugify(t.trim())),
            content: request.content.clone(),
            tags: request.tags.clone(),
            published: request.published,
        };
        self.store
            .update_blog(&id, &update)
            .await?
            .ok_or_else(|| ApiError::not_found("Blog not found"))
    }

    /// Delete a blog and return the removed record. Its comments and likes
    /// are left in place (no cascade).
    pub async fn delete(&self, blog_id: &str) -> Result<Blog, ApiError> {
        let id = parse_object_id(blog_id, "blog")?;
        let blog = self
            .store
            .delete_blog(&id)
            .await?
            .ok_or_else(|| ApiError::not_found("Blog not found"))?;
        info!("deleted blog {}", id.to_hex());
        Ok(blog)
    }

    pub async fn tags(&self) -> Result<Vec<String>, ApiError> {
        Ok(self.store.list_tags().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_lowercases_and_hyphenates() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Already-Hyphenated Title"), "already-hyphenated-title");
        assert_eq!(slugify("MiXeD Case"), "mixed-case");
    }
}
