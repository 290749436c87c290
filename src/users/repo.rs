#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::{
    bson::doc,
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
    Collection, Database, IndexModel,
};
#[cfg(test)]
use tokio::sync::RwLock;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::users::model::User;

/// Persistence abstraction over the user collection.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: User) -> Result<User, ApiError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, ApiError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, ApiError>;
    async fn list(&self) -> Result<Vec<User>, ApiError>;
    async fn update(&self, user: User) -> Result<User, ApiError>;
    async fn delete(&self, id: Uuid) -> Result<bool, ApiError>;
}

/// MongoDB-backed implementation of `UserStore`.
pub struct MongoUserStore {
    collection: Collection<User>,
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == 11000
    )
}

/// Uniqueness clashes that slip past the pre-checks hit the unique indexes
/// and come back as duplicate-key write errors.
fn translate_write_error(err: mongodb::error::Error) -> ApiError {
    if is_duplicate_key(&err) {
        ApiError::Conflict("Email or username already in use".into())
    } else {
        ApiError::Database(err)
    }
}

impl MongoUserStore {
    pub fn new(db: &Database) -> Self {
        let collection = db.collection::<User>("users");
        Self { collection }
    }

    /// Unique indexes on email and username; closes the race window left by
    /// the read-then-write existence checks.
    pub async fn init_indexes(&self) -> Result<(), ApiError> {
        let indexes = vec![
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .name("idx_email_unique".to_string())
                        .build(),
                )
                .build(),
            IndexModel::builder()
                .keys(doc! { "username": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .name("idx_username_unique".to_string())
                        .build(),
                )
                .build(),
        ];
        self.collection.create_indexes(indexes).await?;
        info!("user indexes created");
        Ok(())
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn insert(&self, user: User) -> Result<User, ApiError> {
        self.collection
            .insert_one(&user)
            .await
            .map_err(translate_write_error)?;
        info!(user_id = %user.id, email = %user.email, "user created");
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, ApiError> {
        let user = self
            .collection
            .find_one(doc! { "_id": id.to_string() })
            .await?;
        Ok(user)
    }

    #[instrument(skip(self, email))]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let user = self.collection.find_one(doc! { "email": email }).await?;
        Ok(user)
    }

    #[instrument(skip(self, username))]
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
        let user = self
            .collection
            .find_one(doc! { "username": username })
            .await?;
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<User>, ApiError> {
        let cursor = self
            .collection
            .find(doc! {})
            .sort(doc! { "created_at": -1 })
            .await?;
        let users: Vec<User> = cursor.try_collect().await?;
        Ok(users)
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn update(&self, user: User) -> Result<User, ApiError> {
        let result = self
            .collection
            .replace_one(doc! { "_id": user.id.to_string() }, &user)
            .await
            .map_err(translate_write_error)?;
        if result.matched_count == 0 {
            return Err(ApiError::NotFound("User not found".into()));
        }
        info!(user_id = %user.id, "user updated");
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> Result<bool, ApiError> {
        let result = self
            .collection
            .delete_one(doc! { "_id": id.to_string() })
            .await?;
        if result.deleted_count == 0 {
            return Ok(false);
        }
        info!(user_id = %id, "user deleted");
        Ok(true)
    }
}

/// In-memory implementation used by tests. Mirrors the unique-index behavior
/// of the Mongo store so the service sees the same conflicts.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

#[cfg(test)]
impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn insert(&self, user: User) -> Result<User, ApiError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(ApiError::Conflict("Email or username already in use".into()));
        }
        if users.values().any(|u| u.username == user.username) {
            return Err(ApiError::Conflict("Email or username already in use".into()));
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, ApiError> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn list(&self) -> Result<Vec<User>, ApiError> {
        let users = self.users.read().await;
        let mut result: Vec<User> = users.values().cloned().collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn update(&self, user: User) -> Result<User, ApiError> {
        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) {
            return Err(ApiError::NotFound("User not found".into()));
        }
        let clash = users
            .values()
            .any(|u| u.id != user.id && (u.email == user.email || u.username == user.username));
        if clash {
            return Err(ApiError::Conflict("Email or username already in use".into()));
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, ApiError> {
        let mut users = self.users.write().await;
        Ok(users.remove(&id).is_some())
    }
}
