use async_trait::async_trait;

use crate::db::models::Tag;
use crate::error::AppError;

/// Repository trait for tags.
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Return the tag with this exact name, creating it if needed.
    async fn get_or_create(&self, name: &str) -> Result<Tag, AppError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Tag>, AppError>;

    /// Batch lookup used when rendering lists. Missing ids are skipped.
    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Tag>, AppError>;

    /// All tags, alphabetically.
    async fn list_all(&self) -> Result<Vec<Tag>, AppError>;
}

/// MongoDB implementation of the TagRepository.
pub struct MongoTagRepository {
    collection: mongodb::Collection<Tag>,
    sequence: crate::db::sequence::Sequence,
}

impl MongoTagRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("tags"),
            sequence: crate::db::sequence::Sequence::new(db),
        }
    }
}

#[async_trait]
impl TagRepository for MongoTagRepository {
    async fn get_or_create(&self, name: &str) -> Result<Tag, AppError> {
        if let Some(tag) = self.find_by_name(name).await? {
            return Ok(tag);
        }

        let tag = Tag {
            id: self.sequence.next("tags").await?,
            name: name.to_string(),
        };

        match self.collection.insert_one(&tag).await {
            Ok(_) => Ok(tag),
            // Another request created it first; use theirs.
            Err(e) if crate::db::is_duplicate_key(&e) => self
                .find_by_name(name)
                .await?
                .ok_or_else(|| AppError::Database(format!("Tag '{}' vanished after insert", name))),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Tag>, AppError> {
        use mongodb::bson::doc;

        Ok(self.collection.find_one(doc! { "name": name }).await?)
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Tag>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let cursor = self
            .collection
            .find(doc! { "_id": { "$in": ids.to_vec() } })
            .sort(doc! { "name": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn list_all(&self) -> Result<Vec<Tag>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;

        let cursor = self.collection.find(doc! {}).sort(doc! { "name": 1 }).await?;
        Ok(cursor.try_collect().await?)
    }
}
