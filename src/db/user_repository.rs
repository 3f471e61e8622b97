use async_trait::async_trait;
use chrono::Utc;

use crate::db::models::{Role, User, UserProfile};
use crate::error::AppError;

/// Fields needed to register a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub is_staff: bool,
}

/// Repository trait for users and their profiles.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. Fails with `Conflict` if the username is taken.
    async fn create(&self, new_user: NewUser) -> Result<User, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    /// Batch lookup used when rendering lists. Missing ids are skipped.
    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, AppError>;

    /// Create or replace the profile role of a user.
    async fn set_role(&self, user_id: i64, role: Role) -> Result<(), AppError>;
}

/// MongoDB implementation of the UserRepository.
pub struct MongoUserRepository {
    users: mongodb::Collection<User>,
    profiles: mongodb::Collection<UserProfile>,
    sequence: crate::db::sequence::Sequence,
}

impl MongoUserRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            users: db.collection("users"),
            profiles: db.collection("user_profiles"),
            sequence: crate::db::sequence::Sequence::new(db),
        }
    }
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    async fn create(&self, new_user: NewUser) -> Result<User, AppError> {
        if self.find_by_username(&new_user.username).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Username '{}' is already taken",
                new_user.username
            )));
        }

        let user = User {
            id: self.sequence.next("users").await?,
            username: new_user.username,
            email: new_user.email,
            is_staff: new_user.is_staff,
            date_joined: Utc::now(),
        };

        self.users.insert_one(&user).await.map_err(|e| {
            if crate::db::is_duplicate_key(&e) {
                AppError::Conflict(format!("Username '{}' is already taken", user.username))
            } else {
                AppError::Database(e.to_string())
            }
        })?;

        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        use mongodb::bson::doc;

        Ok(self.users.find_one(doc! { "_id": id }).await?)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        use mongodb::bson::doc;

        Ok(self.users.find_one(doc! { "username": username }).await?)
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let cursor = self.users.find(doc! { "_id": { "$in": ids.to_vec() } }).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn set_role(&self, user_id: i64, role: Role) -> Result<(), AppError> {
        use mongodb::bson::doc;
        use mongodb::options::ReplaceOptions;

        let options = ReplaceOptions::builder().upsert(true).build();
        self.profiles
            .replace_one(doc! { "user_id": user_id }, &UserProfile { user_id, role })
            .with_options(options)
            .await?;

        Ok(())
    }
}
