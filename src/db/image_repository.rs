use async_trait::async_trait;
use chrono::Utc;

use crate::db::models::Image;
use crate::error::AppError;

/// Fields of an image before it has an id.
#[derive(Debug, Clone)]
pub struct NewImage {
    /// Storage key of the already uploaded file.
    pub file: String,
    pub description: String,
    pub uploaded_by: i64,
    pub tag_ids: Vec<i64>,
}

/// Repository trait for images. Listing is newest upload first.
#[async_trait]
pub trait ImageRepository: Send + Sync {
    async fn insert(&self, new_image: NewImage) -> Result<Image, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Image>, AppError>;

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Image>, AppError>;

    async fn count(&self, tag_id: Option<i64>) -> Result<u64, AppError>;

    async fn list(&self, tag_id: Option<i64>, skip: u64, limit: u64)
        -> Result<Vec<Image>, AppError>;

    /// Returns `true` if an image was deleted.
    async fn delete(&self, id: i64) -> Result<bool, AppError>;
}

/// MongoDB implementation of the ImageRepository.
pub struct MongoImageRepository {
    collection: mongodb::Collection<Image>,
    sequence: crate::db::sequence::Sequence,
}

impl MongoImageRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("images"),
            sequence: crate::db::sequence::Sequence::new(db),
        }
    }

    fn filter(tag_id: Option<i64>) -> mongodb::bson::Document {
        use mongodb::bson::doc;

        match tag_id {
            Some(id) => doc! { "tag_ids": id },
            None => doc! {},
        }
    }
}

#[async_trait]
impl ImageRepository for MongoImageRepository {
    async fn insert(&self, new_image: NewImage) -> Result<Image, AppError> {
        let image = Image {
            id: self.sequence.next("images").await?,
            file: new_image.file,
            description: new_image.description,
            uploaded_by: new_image.uploaded_by,
            uploaded_at: Utc::now(),
            tag_ids: new_image.tag_ids,
        };

        self.collection.insert_one(&image).await?;
        Ok(image)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Image>, AppError> {
        use mongodb::bson::doc;

        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Image>, AppError> {
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
        Ok(self.collection.count_documents(Self::filter(tag_id)).await?)
    }

    async fn list(
        &self,
        tag_id: Option<i64>,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Image>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;
        use mongodb::options::FindOptions;

        let options = FindOptions::builder()
            .sort(doc! { "uploaded_at": -1, "_id": -1 })
            .skip(skip)
            .limit(limit as i64)
            .build();

        let cursor = self
            .collection
            .find(Self::filter(tag_id))
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
