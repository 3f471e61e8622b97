use async_trait::async_trait;
use chrono::Utc;

use crate::db::models::Text;
use crate::error::AppError;

/// Fields of a text before it has an id. `body` must already be sanitized.
#[derive(Debug, Clone)]
pub struct NewText {
    pub title: String,
    pub body: String,
    pub created_by: i64,
    pub tag_ids: Vec<i64>,
}

/// Editable fields of an existing text. `body` must already be sanitized.
#[derive(Debug, Clone)]
pub struct TextChanges {
    pub title: String,
    pub body: String,
    pub tag_ids: Vec<i64>,
}

/// Repository trait for texts.
///
/// Listing is newest first, ties broken by descending id so that pages
/// never overlap.
#[async_trait]
pub trait TextRepository: Send + Sync {
    async fn insert(&self, new_text: NewText) -> Result<Text, AppError>;

    /// Apply changes and return the updated text, or `None` if it doesn't exist.
    async fn update(&self, id: i64, changes: TextChanges) -> Result<Option<Text>, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Text>, AppError>;

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Text>, AppError>;

    /// Number of texts, optionally restricted to those carrying `tag_id`.
    async fn count(&self, tag_id: Option<i64>) -> Result<u64, AppError>;

    async fn list(&self, tag_id: Option<i64>, skip: u64, limit: u64)
        -> Result<Vec<Text>, AppError>;

    /// Returns `true` if a text was deleted.
    async fn delete(&self, id: i64) -> Result<bool, AppError>;
}

fn tag_filter(tag_id: Option<i64>) -> mongodb::bson::Document {
    use mongodb::bson::doc;

    match tag_id {
        Some(id) => doc! { "tag_ids": id },
        None => doc! {},
    }
}

/// MongoDB implementation of the TextRepository.
pub struct MongoTextRepository {
    collection: mongodb::Collection<Text>,
    sequence: crate::db::sequence::Sequence,
}

impl MongoTextRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("texts"),
            sequence: crate::db::sequence::Sequence::new(db),
        }
    }
}

#[async_trait]
impl TextRepository for MongoTextRepository {
    async fn insert(&self, new_text: NewText) -> Result<Text, AppError> {
        let text = Text {
            id: self.sequence.next("texts").await?,
            title: new_text.title,
            body: new_text.body,
            created_by: new_text.created_by,
            created_at: Utc::now(),
            tag_ids: new_text.tag_ids,
        };

        self.collection.insert_one(&text).await?;
        Ok(text)
    }

    async fn update(&self, id: i64, changes: TextChanges) -> Result<Option<Text>, AppError> {
        use mongodb::bson::doc;
        use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        Ok(self
            .collection
            .find_one_and_update(
                doc! { "_id": id },
                doc! { "$set": {
                    "title": changes.title,
                    "body": changes.body,
                    "tag_ids": changes.tag_ids,
                } },
            )
            .with_options(options)
            .await?)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Text>, AppError> {
        use mongodb::bson::doc;

        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Text>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let cursor = self
            .collection
            .find(doc! { "_id": { "$in": ids.to_vec() } })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn count(&self, tag_id: Option<i64>) -> Result<u64, AppError> {
        Ok(self.collection.count_documents(tag_filter(tag_id)).await?)
    }

    async fn list(
        &self,
        tag_id: Option<i64>,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Text>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;
        use mongodb::options::FindOptions;

        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1, "_id": -1 })
            .skip(skip)
            .limit(limit as i64)
            .build();

        let cursor = self
            .collection
            .find(tag_filter(tag_id))
            .with_options(options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        use mongodb::bson::doc;

        let result = self.collection.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }
}
