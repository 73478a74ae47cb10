//! MongoDB document store implementation.
//!
//! Uniqueness of (blog, user) like pairs and of user email/username is
//! enforced by unique indexes created at connect time; the workflows'
//! multi-document writes run inside a `ClientSession` transaction.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, DateTime, Document};
use futures::TryStreamExt;
use log::info;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Client, ClientSession, Collection, Database, IndexModel};

use crate::config::DatabaseConfig;
use crate::models::{Blog, BlogUpdate, Comment, Like, User, UserUpdate};
use crate::store::{DataStore, StoreError, StoreTransaction};

const USERS: &str = "users";
const BLOGS: &str = "blogs";
const COMMENTS: &str = "comments";
const LIKES: &str = "likes";

fn map_mongo_err(err: mongodb::error::Error) -> StoreError {
    if is_duplicate_key(&err) {
        return StoreError::Duplicate("duplicate key".to_string());
    }
    StoreError::Unavailable(err.to_string())
}

/// MongoDB reports uniqueness violations as error code 11000, either as a
/// write error or (inside transactions) as a command error.
fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match &*err.kind {
        ErrorKind::Write(WriteFailure::WriteError(we)) => we.code == 11000,
        ErrorKind::Command(ce) => ce.code == 11000,
        _ => false,
    }
}

pub struct MongoDataStore {
    client: Client,
    db: Database,
}

impl MongoDataStore {
    /// Connect, verify the connection with a ping, and apply the schema
    /// indexes.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        info!("Connecting to MongoDB at {}", config.uri);
        let client = Client::with_uri_str(&config.uri)
            .await
            .map_err(map_mongo_err)?;
        let db = client.database(&config.db_name);
        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(map_mongo_err)?;

        let store = Self { client, db };
        store.ensure_indexes().await?;
        info!("Connected to MongoDB database '{}'", config.db_name);
        Ok(store)
    }

    async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let unique = |name: &str| {
            IndexOptions::builder()
                .unique(true)
                .name(name.to_string())
                .build()
        };

        self.users()
            .create_indexes(vec![
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique("email_unique"))
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "username": 1 })
                    .options(unique("username_unique"))
                    .build(),
            ])
            .await
            .map_err(map_mongo_err)?;

        self.likes()
            .create_indexes(vec![
                IndexModel::builder()
                    .keys(doc! { "blog": 1, "user": 1 })
                    .options(unique("blog_user_unique"))
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "createdAt": 1 })
                    .build(),
            ])
            .await
            .map_err(map_mongo_err)?;

        self.blogs()
            .create_indexes(vec![IndexModel::builder().keys(doc! { "tags": 1 }).build()])
            .await
            .map_err(map_mongo_err)?;

        self.comments()
            .create_indexes(vec![IndexModel::builder()
                .keys(doc! { "createdAt": 1 })
                .build()])
            .await
            .map_err(map_mongo_err)?;

        Ok(())
    }

    fn users(&self) -> Collection<User> {
        self.db.collection(USERS)
    }

    fn blogs(&self) -> Collection<Blog> {
        self.db.collection(BLOGS)
    }

    fn comments(&self) -> Collection<Comment> {
        self.db.collection(COMMENTS)
    }

    fn likes(&self) -> Collection<Like> {
        self.db.collection(LIKES)
    }
}

fn inserted_object_id(result: mongodb::results::InsertOneResult) -> Result<ObjectId, StoreError> {
    result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| StoreError::Unavailable("inserted id is not an ObjectId".to_string()))
}

#[async_trait]
impl DataStore for MongoDataStore {
    async fn insert_user(&self, user: &User) -> Result<ObjectId, StoreError> {
        let result = self.users().insert_one(user).await.map_err(map_mongo_err)?;
        inserted_object_id(result)
    }

    async fn find_user_by_id(&self, id: &ObjectId) -> Result<Option<User>, StoreError> {
        self.users()
            .find_one(doc! { "_id": *id })
            .await
            .map_err(map_mongo_err)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.users()
            .find_one(doc! { "email": email })
            .await
            .map_err(map_mongo_err)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.users()
            .find_one(doc! { "username": username })
            .await
            .map_err(map_mongo_err)
    }

    async fn update_user_profile(
        &self,
        id: &ObjectId,
        update: &UserUpdate,
    ) -> Result<Option<User>, StoreError> {
        let mut set = Document::new();
        if let Some(v) = &update.username {
            set.insert("username", v);
        }
        if let Some(v) = &update.email {
            set.insert("email", v);
        }
        if let Some(v) = &update.name {
            set.insert("name", v);
        }
        if let Some(v) = &update.location {
            set.insert("location", v);
        }
        if let Some(v) = &update.bio {
            set.insert("bio", v);
        }
        if let Some(v) = &update.personal_website {
            set.insert("personalWebsite", v);
        }
        if let Some(v) = &update.date_of_birth {
            set.insert("dateOfBirth", Bson::DateTime(*v));
        }
        set.insert("updatedAt", DateTime::now());

        self.users()
            .find_one_and_update(doc! { "_id": *id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
            .map_err(map_mongo_err)
    }

    async fn set_user_password(
        &self,
        id: &ObjectId,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        let result = self
            .users()
            .update_one(
                doc! { "_id": *id },
                doc! { "$set": { "password": password_hash, "updatedAt": DateTime::now() } },
            )
            .await
            .map_err(map_mongo_err)?;
        if result.matched_count == 0 {
            return Err(StoreError::NotFound("User not found".to_string()));
        }
        Ok(())
    }

    async fn set_user_avatar(
        &self,
        id: &ObjectId,
        image_url: &str,
    ) -> Result<Option<User>, StoreError> {
        self.users()
            .find_one_and_update(
                doc! { "_id": *id },
                doc! { "$set": { "imageUrl": image_url, "updatedAt": DateTime::now() } },
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(map_mongo_err)
    }

    async fn insert_blog(&self, blog: &Blog) -> Result<ObjectId, StoreError> {
        let result = self.blogs().insert_one(blog).await.map_err(map_mongo_err)?;
        inserted_object_id(result)
    }

    async fn find_blog(&self, id: &ObjectId) -> Result<Option<Blog>, StoreError> {
        self.blogs()
            .find_one(doc! { "_id": *id })
            .await
            .map_err(map_mongo_err)
    }

    async fn list_blogs(&self) -> Result<Vec<Blog>, StoreError> {
        let cursor = self.blogs().find(doc! {}).await.map_err(map_mongo_err)?;
        cursor.try_collect().await.map_err(map_mongo_err)
    }

    async fn update_blog(
        &self,
        id: &ObjectId,
        update: &BlogUpdate,
    ) -> Result<Option<Blog>, StoreError> {
        let mut set = Document::new();
        if let Some(v) = &update.title {
            set.insert("title", v);
        }
        if let Some(v) = &update.slug {
            set.insert("slug", v);
        }
        if let Some(v) = &update.content {
            set.insert("content", v);
        }
        if let Some(v) = &update.tags {
            set.insert("tags", v);
        }
        if let Some(v) = update.published {
            set.insert("published", v);
        }
        set.insert("updatedAt", DateTime::now());

        self.blogs()
            .find_one_and_update(doc! { "_id": *id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
            .map_err(map_mongo_err)
    }

    async fn delete_blog(&self, id: &ObjectId) -> Result<Option<Blog>, StoreError> {
        self.blogs()
            .find_one_and_delete(doc! { "_id": *id })
            .await
            .map_err(map_mongo_err)
    }

    async fn list_tags(&self) -> Result<Vec<String>, StoreError> {
        let values = self
            .blogs()
            .distinct("tags", doc! {})
            .await
            .map_err(map_mongo_err)?;
        Ok(values
            .into_iter()
            .filter_map(|v| match v {
                Bson::String(s) => Some(s),
                _ => None,
            })
            .collect())
    }

    async fn find_like(
        &self,
        blog_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<Option<Like>, StoreError> {
        self.likes()
            .find_one(doc! { "blog": *blog_id, "user": *user_id })
            .await
            .map_err(map_mongo_err)
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let mut session = self.client.start_session().await.map_err(map_mongo_err)?;
        session.start_transaction().await.map_err(map_mongo_err)?;
        Ok(Box::new(MongoTransaction {
            session,
            db: self.db.clone(),
        }))
    }
}

pub struct MongoTransaction {
    session: ClientSession,
    db: Database,
}

impl MongoTransaction {
    fn likes(&self) -> Collection<Like> {
        self.db.collection(LIKES)
    }

    fn comments(&self) -> Collection<Comment> {
        self.db.collection(COMMENTS)
    }

    fn blogs(&self) -> Collection<Document> {
        self.db.collection(BLOGS)
    }

    async fn update_blog_refs(
        &mut self,
        blog_id: &ObjectId,
        update: Document,
    ) -> Result<(), StoreError> {
        let result = self
            .blogs()
            .update_one(doc! { "_id": *blog_id }, update)
            .session(&mut self.session)
            .await
            .map_err(map_mongo_err)?;
        if result.matched_count == 0 {
            return Err(StoreError::NotFound("Blog not found".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for MongoTransaction {
    async fn insert_like(&mut self, like: &Like) -> Result<ObjectId, StoreError> {
        let result = self
            .likes()
            .insert_one(like)
            .session(&mut self.session)
            .await
            .map_err(map_mongo_err)?;
        inserted_object_id(result)
    }

    async fn delete_like(&mut self, like_id: &ObjectId) -> Result<(), StoreError> {
        let result = self
            .likes()
            .delete_one(doc! { "_id": *like_id })
            .session(&mut self.session)
            .await
            .map_err(map_mongo_err)?;
        if result.deleted_count == 0 {
            return Err(StoreError::NotFound("Like not found".to_string()));
        }
        Ok(())
    }

    async fn push_blog_like(
        &mut self,
        blog_id: &ObjectId,
        like_id: &ObjectId,
    ) -> Result<(), StoreError> {
        self.update_blog_refs(
            blog_id,
            doc! { "$push": { "likes": *like_id }, "$set": { "updatedAt": DateTime::now() } },
        )
        .await
    }

    async fn pull_blog_like(
        &mut self,
        blog_id: &ObjectId,
        like_id: &ObjectId,
    ) -> Result<(), StoreError> {
        self.update_blog_refs(
            blog_id,
            doc! { "$pull": { "likes": *like_id }, "$set": { "updatedAt": DateTime::now() } },
        )
        .await
    }

    async fn insert_comment(&mut self, comment: &Comment) -> Result<ObjectId, StoreError> {
        let result = self
            .comments()
            .insert_one(comment)
            .session(&mut self.session)
            .await
            .map_err(map_mongo_err)?;
        inserted_object_id(result)
    }

    async fn push_blog_comment(
        &mut self,
        blog_id: &ObjectId,
        comment_id: &ObjectId,
    ) -> Result<(), StoreError> {
        self.update_blog_refs(
            blog_id,
            doc! { "$push": { "comments": *comment_id }, "$set": { "updatedAt": DateTime::now() } },
        )
        .await
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        self.session.commit_transaction().await.map_err(map_mongo_err)
    }

    async fn abort(mut self: Box<Self>) -> Result<(), StoreError> {
        self.session.abort_transaction().await.map_err(map_mongo_err)
    }
}
