//! Document models for the users, blogs, comments and likes collections.
//!
//! Field names are serialized in camelCase to match the wire and storage
//! layout; `_id` is assigned by the store on insert.

use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// A registered account. The `password` field holds the Argon2 PHC hash,
/// never plaintext; API responses go through [`UserView`] which drops it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personal_website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<DateTime>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub blogs: Vec<ObjectId>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl User {
    pub fn new(username: &str, name: Option<String>, email: &str, password_hash: &str) -> Self {
        let now = DateTime::now();
        Self {
            id: None,
            username: username.to_string(),
            name,
            email: email.to_string(),
            password: password_hash.to_string(),
            image_url: None,
            location: None,
            bio: None,
            personal_website: None,
            date_of_birth: None,
            role: Role::User,
            blogs: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// User record as returned by the API: id rendered as hex, timestamps as
/// RFC 3339, password omitted entirely.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personal_website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    pub role: Role,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            username: user.username,
            name: user.name,
            email: user.email,
            image_url: user.image_url,
            location: user.location,
            bio: user.bio,
            personal_website: user.personal_website,
            date_of_birth: user.date_of_birth.map(|d| d.to_chrono().to_rfc3339()),
            role: user.role,
            created_at: user.created_at.to_chrono().to_rfc3339(),
            updated_at: user.updated_at.to_chrono().to_rfc3339(),
        }
    }
}

/// Partial update of user profile fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub personal_website: Option<String>,
    pub date_of_birth: Option<DateTime>,
}

/// A blog post. `comments` and `likes` are reference lists owned by the
/// blog and mutated only inside engagement transactions: every id in
/// `likes` corresponds to exactly one ledger entry for this blog, every id
/// in `comments` to one comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub published: bool,
    pub author: ObjectId,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub comments: Vec<ObjectId>,
    #[serde(default)]
    pub likes: Vec<ObjectId>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Blog {
    pub fn new(author: ObjectId, title: &str, slug: &str, content: &str, tags: Vec<String>) -> Self {
        let now = DateTime::now();
        Self {
            id: None,
            title: title.to_string(),
            slug: slug.to_string(),
            image_url: None,
            published: false,
            author,
            content: content.to_string(),
            tags,
            comments: Vec::new(),
            likes: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of blog fields. The slug is re-derived by the service
/// whenever the title changes.
#[derive(Debug, Clone, Default)]
pub struct BlogUpdate {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub published: Option<bool>,
}

/// An embedded reply on a comment. Created empty with the comment; the
/// reply endpoints are outside the current surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentReply {
    pub user: ObjectId,
    pub content: String,
    #[serde(default)]
    pub votes: i32,
    #[serde(default)]
    pub likes: i32,
}

/// A comment on a blog. `blog` and `user` are immutable back-references.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub blog: ObjectId,
    pub user: ObjectId,
    #[serde(default)]
    pub votes: i32,
    #[serde(default)]
    pub likes: i32,
    #[serde(default)]
    pub replies: Vec<CommentReply>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Comment {
    pub fn new(blog: ObjectId, user: ObjectId, content: &str, image_url: Option<String>) -> Self {
        let now = DateTime::now();
        Self {
            id: None,
            content: content.to_string(),
            image_url,
            blog,
            user,
            votes: 0,
            likes: 0,
            replies: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One ledger entry: "user likes blog". At most one entry may exist per
/// (blog, user) pair; unliking deletes the entry rather than flipping
/// `liked`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub blog: ObjectId,
    pub user: ObjectId,
    pub liked: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Like {
    pub fn new(blog: ObjectId, user: ObjectId) -> Self {
        let now = DateTime::now();
        Self {
            id: None,
            blog,
            user,
            liked: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_view_drops_password() {
        let mut user = User::new("alice", None, "a@x.com", "$argon2id$fake");
        user.id = Some(ObjectId::new());
        let view = UserView::from(user.clone());
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["username"], "alice");
        assert_eq!(json["id"], user.id.unwrap().to_hex());
    }

    #[test]
    fn new_like_is_liked() {
        let like = Like::new(ObjectId::new(), ObjectId::new());
        assert!(like.liked);
        assert!(like.id.is_none());
    }

    #[test]
    fn blog_serializes_reference_lists() {
        let blog = Blog::new(ObjectId::new(), "Hello World", "hello-world", "body", vec![]);
        let doc = bson::to_document(&blog).unwrap();
        assert!(doc.get_array("comments").unwrap().is_empty());
        assert!(doc.get_array("likes").unwrap().is_empty());
        assert_eq!(doc.get_str("slug").unwrap(), "hello-world");
        assert!(!doc.contains_key("_id"));
    }
}
