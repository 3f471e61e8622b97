use async_trait::async_trait;
use chrono::Utc;

use crate::db::models::{Comment, ContentRef};
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct NewComment {
    pub target: ContentRef,
    pub user_id: i64,
    pub comment: String,
}

/// Repository trait for comments attached to texts and images.
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn insert(&self, new_comment: NewComment) -> Result<Comment, AppError>;

    /// Comments on one object, oldest first.
    async fn list_for(&self, target: ContentRef) -> Result<Vec<Comment>, AppError>;

    /// Remove every comment on one object. Returns how many were removed.
    async fn delete_for(&self, target: ContentRef) -> Result<u64, AppError>;
}

fn target_filter(target: ContentRef) -> mongodb::bson::Document {
    use mongodb::bson::doc;

    doc! {
        "content_type": target.content_type.to_string(),
        "object_id": target.object_id,
    }
}

/// MongoDB implementation of the CommentRepository.
pub struct MongoCommentRepository {
    collection: mongodb::Collection<Comment>,
    sequence: crate::db::sequence::Sequence,
}

impl MongoCommentRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("comments"),
            sequence: crate::db::sequence::Sequence::new(db),
        }
    }
}

#[async_trait]
impl CommentRepository for MongoCommentRepository {
    async fn insert(&self, new_comment: NewComment) -> Result<Comment, AppError> {
        let comment = Comment {
            id: self.sequence.next("comments").await?,
            content_type: new_comment.target.content_type,
            object_id: new_comment.target.object_id,
            user_id: new_comment.user_id,
            comment: new_comment.comment,
            created_at: Utc::now(),
        };

        self.collection.insert_one(&comment).await?;
        Ok(comment)
    }

    async fn list_for(&self, target: ContentRef) -> Result<Vec<Comment>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;

        let cursor = self
            .collection
            .find(target_filter(target))
            .sort(doc! { "created_at": 1, "_id": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn delete_for(&self, target: ContentRef) -> Result<u64, AppError> {
        let result = self.collection.delete_many(target_filter(target)).await?;
        Ok(result.deleted_count)
    }
}
