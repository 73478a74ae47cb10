//! Mock implementation of the document store for testing.
//!
//! All four collections live behind one mutex. Transactions stage their
//! writes and apply them to a copy of the data at commit time, swapping it
//! in only if every write validates — commits are therefore atomic and
//! serialized, and a racing duplicate like is rejected at commit exactly
//! like the real unique index would.

use async_trait::async_trait;
use bson::{oid::ObjectId, DateTime};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use crate::models::{Blog, BlogUpdate, Comment, Like, User, UserUpdate};
use crate::store::{DataStore, StoreError, StoreTransaction};

#[derive(Default, Clone)]
struct Collections {
    users: HashMap<ObjectId, User>,
    blogs: HashMap<ObjectId, Blog>,
    comments: HashMap<ObjectId, Comment>,
    likes: HashMap<ObjectId, Like>,
}

impl Collections {
    fn like_pair_exists(&self, blog: &ObjectId, user: &ObjectId) -> bool {
        self.likes
            .values()
            .any(|l| &l.blog == blog && &l.user == user)
    }
}

pub struct MockDataStore {
    data: Arc<Mutex<Collections>>,
}

impl MockDataStore {
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(Collections::default())),
        }
    }

    // Inspection helpers for tests.

    pub fn user_count(&self) -> usize {
        self.data.lock().unwrap().users.len()
    }

    pub fn like_count(&self) -> usize {
        self.data.lock().unwrap().likes.len()
    }

    pub fn comment_count(&self) -> usize {
        self.data.lock().unwrap().comments.len()
    }

    pub fn blog_likes(&self, blog_id: &ObjectId) -> Vec<ObjectId> {
        self.data
            .lock()
            .unwrap()
            .blogs
            .get(blog_id)
            .map(|b| b.likes.clone())
            .unwrap_or_default()
    }

    pub fn blog_comments(&self, blog_id: &ObjectId) -> Vec<ObjectId> {
        self.data
            .lock()
            .unwrap()
            .blogs
            .get(blog_id)
            .map(|b| b.comments.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        let mut data = self.data.lock().unwrap();
        *data = Collections::default();
    }
}

impl Default for MockDataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataStore for MockDataStore {
    async fn insert_user(&self, user: &User) -> Result<ObjectId, StoreError> {
        let mut data = self.data.lock().unwrap();
        if data.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate("duplicate key".to_string()));
        }
        if data.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Duplicate("duplicate key".to_string()));
        }
        let id = ObjectId::new();
        let mut stored = user.clone();
        stored.id = Some(id);
        data.users.insert(id, stored);
        Ok(id)
    }

    async fn find_user_by_id(&self, id: &ObjectId) -> Result<Option<User>, StoreError> {
        Ok(self.data.lock().unwrap().users.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let data = self.data.lock().unwrap();
        Ok(data.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let data = self.data.lock().unwrap();
        Ok(data.users.values().find(|u| u.username == username).cloned())
    }

    async fn update_user_profile(
        &self,
        id: &ObjectId,
        update: &UserUpdate,
    ) -> Result<Option<User>, StoreError> {
        let mut data = self.data.lock().unwrap();
        let Some(user) = data.users.get_mut(id) else {
            return Ok(None);
        };
        if let Some(v) = &update.username {
            user.username = v.clone();
        }
        if let Some(v) = &update.email {
            user.email = v.clone();
        }
        if let Some(v) = &update.name {
            user.name = Some(v.clone());
        }
        if let Some(v) = &update.location {
            user.location = Some(v.clone());
        }
        if let Some(v) = &update.bio {
            user.bio = Some(v.clone());
        }
        if let Some(v) = &update.personal_website {
            user.personal_website = Some(v.clone());
        }
        if let Some(v) = &update.date_of_birth {
            user.date_of_birth = Some(*v);
        }
        user.updated_at = DateTime::now();
        Ok(Some(user.clone()))
    }

    async fn set_user_password(
        &self,
        id: &ObjectId,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        let mut data = self.data.lock().unwrap();
        let user = data
            .users
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound("User not found".to_string()))?;
        user.password = password_hash.to_string();
        user.updated_at = DateTime::now();
        Ok(())
    }

    async fn set_user_avatar(
        &self,
        id: &ObjectId,
        image_url: &str,
    ) -> Result<Option<User>, StoreError> {
        let mut data = self.data.lock().unwrap();
        let Some(user) = data.users.get_mut(id) else {
            return Ok(None);
        };
        user.image_url = Some(image_url.to_string());
        user.updated_at = DateTime::now();
        Ok(Some(user.clone()))
    }

    async fn insert_blog(&self, blog: &Blog) -> Result<ObjectId, StoreError> {
        let mut data = self.data.lock().unwrap();
        let id = ObjectId::new();
        let mut stored = blog.clone();
        stored.id = Some(id);
        data.blogs.insert(id, stored);
        Ok(id)
    }

    async fn find_blog(&self, id: &ObjectId) -> Result<Option<Blog>, StoreError> {
        Ok(self.data.lock().unwrap().blogs.get(id).cloned())
    }

    async fn list_blogs(&self) -> Result<Vec<Blog>, StoreError> {
        Ok(self.data.lock().unwrap().blogs.values().cloned().collect())
    }

    async fn update_blog(
        &self,
        id: &ObjectId,
        update: &BlogUpdate,
    ) -> Result<Option<Blog>, StoreError> {
        let mut data = self.data.lock().unwrap();
        let Some(blog) = data.blogs.get_mut(id) else {
            return Ok(None);
        };
        if let Some(v) = &update.title {
            blog.title = v.clone();
        }
        if let Some(v) = &update.slug {
            blog.slug = v.clone();
        }
        if let Some(v) = &update.content {
            blog.content = v.clone();
        }
        if let Some(v) = &update.tags {
            blog.tags = v.clone();
        }
        if let Some(v) = update.published {
            blog.published = v;
        }
        blog.updated_at = DateTime::now();
        Ok(Some(blog.clone()))
    }

    async fn delete_blog(&self, id: &ObjectId) -> Result<Option<Blog>, StoreError> {
        Ok(self.data.lock().unwrap().blogs.remove(id))
    }

    async fn list_tags(&self) -> Result<Vec<String>, StoreError> {
        let data = self.data.lock().unwrap();
        let tags: BTreeSet<String> = data
            .blogs
            .values()
            .flat_map(|b| b.tags.iter().cloned())
            .collect();
        Ok(tags.into_iter().collect())
    }

    async fn find_like(
        &self,
        blog_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<Option<Like>, StoreError> {
        let data = self.data.lock().unwrap();
        Ok(data
            .likes
            .values()
            .find(|l| &l.blog == blog_id && &l.user == user_id)
            .cloned())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        Ok(Box::new(MockTransaction {
            data: Arc::clone(&self.data),
            staged: Vec::new(),
        }))
    }
}

enum StagedWrite {
    InsertLike(Like),
    DeleteLike(ObjectId),
    PushBlogLike { blog: ObjectId, like: ObjectId },
    PullBlogLike { blog: ObjectId, like: ObjectId },
    InsertComment(Comment),
    PushBlogComment { blog: ObjectId, comment: ObjectId },
}

/// Staged writes applied to a copy of the collections at commit; the copy
/// replaces the shared state only when every write validates.
pub struct MockTransaction {
    data: Arc<Mutex<Collections>>,
    staged: Vec<StagedWrite>,
}

fn apply(data: &mut Collections, op: &StagedWrite) -> Result<(), StoreError> {
    match op {
        StagedWrite::InsertLike(like) => {
            if data.like_pair_exists(&like.blog, &like.user) {
                return Err(StoreError::Duplicate("duplicate key".to_string()));
            }
            let id = like.id.expect("staged like has an id");
            data.likes.insert(id, like.clone());
        }
        StagedWrite::DeleteLike(id) => {
            if data.likes.remove(id).is_none() {
                return Err(StoreError::NotFound("Like not found".to_string()));
            }
        }
        StagedWrite::PushBlogLike { blog, like } => {
            let blog = data
                .blogs
                .get_mut(blog)
                .ok_or_else(|| StoreError::NotFound("Blog not found".to_string()))?;
            blog.likes.push(*like);
            blog.updated_at = DateTime::now();
        }
        StagedWrite::PullBlogLike { blog, like } => {
            let blog = data
                .blogs
                .get_mut(blog)
                .ok_or_else(|| StoreError::NotFound("Blog not found".to_string()))?;
            blog.likes.retain(|id| id != like);
            blog.updated_at = DateTime::now();
        }
        StagedWrite::InsertComment(comment) => {
            let id = comment.id.expect("staged comment has an id");
            data.comments.insert(id, comment.clone());
        }
        StagedWrite::PushBlogComment { blog, comment } => {
            let blog = data
                .blogs
                .get_mut(blog)
                .ok_or_else(|| StoreError::NotFound("Blog not found".to_string()))?;
            blog.comments.push(*comment);
            blog.updated_at = DateTime::now();
        }
    }
    Ok(())
}

#[async_trait]
impl StoreTransaction for MockTransaction {
    async fn insert_like(&mut self, like: &Like) -> Result<ObjectId, StoreError> {
        // Fast-path duplicate check against committed state; the
        // authoritative check re-runs under the commit lock.
        {
            let data = self.data.lock().unwrap();
            if data.like_pair_exists(&like.blog, &like.user) {
                return Err(StoreError::Duplicate("duplicate key".to_string()));
            }
        }
        for op in &self.staged {
            if let StagedWrite::InsertLike(staged) = op {
                if staged.blog == like.blog && staged.user == like.user {
                    return Err(StoreError::Duplicate("duplicate key".to_string()));
                }
            }
        }
        let id = ObjectId::new();
        let mut staged = like.clone();
        staged.id = Some(id);
        self.staged.push(StagedWrite::InsertLike(staged));
        Ok(id)
    }

    async fn delete_like(&mut self, like_id: &ObjectId) -> Result<(), StoreError> {
        {
            let data = self.data.lock().unwrap();
            if !data.likes.contains_key(like_id) {
                return Err(StoreError::NotFound("Like not found".to_string()));
            }
        }
        self.staged.push(StagedWrite::DeleteLike(*like_id));
        Ok(())
    }

    async fn push_blog_like(
        &mut self,
        blog_id: &ObjectId,
        like_id: &ObjectId,
    ) -> Result<(), StoreError> {
        {
            let data = self.data.lock().unwrap();
            if !data.blogs.contains_key(blog_id) {
                return Err(StoreError::NotFound("Blog not found".to_string()));
            }
        }
        self.staged.push(StagedWrite::PushBlogLike {
            blog: *blog_id,
            like: *like_id,
        });
        Ok(())
    }

    async fn pull_blog_like(
        &mut self,
        blog_id: &ObjectId,
        like_id: &ObjectId,
    ) -> Result<(), StoreError> {
        {
            let data = self.data.lock().unwrap();
            if !data.blogs.contains_key(blog_id) {
                return Err(StoreError::NotFound("Blog not found".to_string()));
            }
        }
        self.staged.push(StagedWrite::PullBlogLike {
            blog: *blog_id,
            like: *like_id,
        });
        Ok(())
    }

    async fn insert_comment(&mut self, comment: &Comment) -> Result<ObjectId, StoreError> {
        let id = ObjectId::new();
        let mut staged = comment.clone();
        staged.id = Some(id);
        self.staged.push(StagedWrite::InsertComment(staged));
        Ok(id)
    }

    async fn push_blog_comment(
        &mut self,
        blog_id: &ObjectId,
        comment_id: &ObjectId,
    ) -> Result<(), StoreError> {
        {
            let data = self.data.lock().unwrap();
            if !data.blogs.contains_key(blog_id) {
                return Err(StoreError::NotFound("Blog not found".to_string()));
            }
        }
        self.staged.push(StagedWrite::PushBlogComment {
            blog: *blog_id,
            comment: *comment_id,
        });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut data = self.data.lock().unwrap();
        let mut next = data.clone();
        for op in &self.staged {
            apply(&mut next, op)?;
        }
        *data = next;
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed(store: &MockDataStore) -> (ObjectId, ObjectId) {
        let user = User::new("alice", None, "a@x.com", "$argon2id$x");
        let user_id = store.insert_user(&user).await.unwrap();
        let blog = Blog::new(user_id, "Post", "post", "body", vec![]);
        let blog_id = store.insert_blog(&blog).await.unwrap();
        (user_id, blog_id)
    }

    #[tokio::test]
    async fn committed_writes_are_visible_together() {
        let store = MockDataStore::new();
        let (user_id, blog_id) = seed(&store).await;

        let mut txn = store.begin().await.unwrap();
        let like_id = txn.insert_like(&Like::new(blog_id, user_id)).await.unwrap();
        txn.push_blog_like(&blog_id, &like_id).await.unwrap();

        // Nothing visible before commit.
        assert_eq!(store.like_count(), 0);
        assert!(store.blog_likes(&blog_id).is_empty());

        txn.commit().await.unwrap();
        assert_eq!(store.like_count(), 1);
        assert_eq!(store.blog_likes(&blog_id), vec![like_id]);
    }

    #[tokio::test]
    async fn aborted_transaction_leaves_no_trace() {
        let store = MockDataStore::new();
        let (user_id, blog_id) = seed(&store).await;

        let mut txn = store.begin().await.unwrap();
        let like_id = txn.insert_like(&Like::new(blog_id, user_id)).await.unwrap();
        txn.push_blog_like(&blog_id, &like_id).await.unwrap();
        txn.abort().await.unwrap();

        assert_eq!(store.like_count(), 0);
        assert!(store.blog_likes(&blog_id).is_empty());
    }

    #[tokio::test]
    async fn racing_duplicate_like_is_rejected_at_commit() {
        let store = MockDataStore::new();
        let (user_id, blog_id) = seed(&store).await;

        // Two transactions stage the same pair before either commits.
        let mut txn1 = store.begin().await.unwrap();
        let mut txn2 = store.begin().await.unwrap();
        let id1 = txn1.insert_like(&Like::new(blog_id, user_id)).await.unwrap();
        let id2 = txn2.insert_like(&Like::new(blog_id, user_id)).await.unwrap();
        txn1.push_blog_like(&blog_id, &id1).await.unwrap();
        txn2.push_blog_like(&blog_id, &id2).await.unwrap();

        txn1.commit().await.unwrap();
        let err = txn2.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));

        assert_eq!(store.like_count(), 1);
        assert_eq!(store.blog_likes(&blog_id).len(), 1);
    }

    #[tokio::test]
    async fn committed_pair_rejects_new_insert_immediately() {
        let store = MockDataStore::new();
        let (user_id, blog_id) = seed(&store).await;

        let mut txn = store.begin().await.unwrap();
        let like_id = txn.insert_like(&Like::new(blog_id, user_id)).await.unwrap();
        txn.push_blog_like(&blog_id, &like_id).await.unwrap();
        txn.commit().await.unwrap();

        let mut txn = store.begin().await.unwrap();
        let err = txn
            .insert_like(&Like::new(blog_id, user_id))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn failed_commit_applies_nothing() {
        let store = MockDataStore::new();
        let (user_id, blog_id) = seed(&store).await;

        let mut txn = store.begin().await.unwrap();
        let comment_id = txn
            .insert_comment(&Comment::new(blog_id, user_id, "hi", None))
            .await
            .unwrap();
        txn.push_blog_comment(&blog_id, &comment_id).await.unwrap();

        // Blog disappears between staging and commit.
        store.delete_blog(&blog_id).await.unwrap();

        let err = txn.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(store.comment_count(), 0);
    }

    #[tokio::test]
    async fn blog_delete_does_not_cascade() {
        let store = MockDataStore::new();
        let (user_id, blog_id) = seed(&store).await;

        let mut txn = store.begin().await.unwrap();
        let like_id = txn.insert_like(&Like::new(blog_id, user_id)).await.unwrap();
        txn.push_blog_like(&blog_id, &like_id).await.unwrap();
        txn.commit().await.unwrap();

        store.delete_blog(&blog_id).await.unwrap();
        assert_eq!(store.like_count(), 1);
    }

    #[tokio::test]
    async fn duplicate_email_rejected_on_insert() {
        let store = MockDataStore::new();
        let user = User::new("alice", None, "a@x.com", "$argon2id$x");
        store.insert_user(&user).await.unwrap();

        let dup = User::new("alice2", None, "a@x.com", "$argon2id$x");
        assert!(matches!(
            store.insert_user(&dup).await,
            Err(StoreError::Duplicate(_))
        ));
    }
}
