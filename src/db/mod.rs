pub mod comment_repository;
pub mod image_repository;
pub mod models;
pub mod node_repository;
pub mod sequence;
pub mod tag_repository;
pub mod text_repository;
pub mod user_repository;

use mongodb::bson::doc;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::IndexModel;

use crate::error::AppError;

const DUPLICATE_KEY: i32 = 11000;

/// Returns `true` if the error is a unique index violation.
pub(crate) fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY
    )
}

fn unique_index(keys: mongodb::bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

fn plain_index(keys: mongodb::bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

/// Create the indexes the repositories rely on. Safe to call on every start.
pub async fn ensure_indexes(db: &mongodb::Database) -> Result<(), AppError> {
    use mongodb::bson::Document;

    let indexes: Vec<(&str, IndexModel)> = vec![
        ("users", unique_index(doc! { "username": 1 })),
        ("user_profiles", unique_index(doc! { "user_id": 1 })),
        ("tags", unique_index(doc! { "name": 1 })),
        ("texts", plain_index(doc! { "created_at": -1, "_id": -1 })),
        ("texts", plain_index(doc! { "tag_ids": 1 })),
        ("images", plain_index(doc! { "uploaded_at": -1, "_id": -1 })),
        ("images", plain_index(doc! { "tag_ids": 1 })),
        ("comments", plain_index(doc! { "content_type": 1, "object_id": 1 })),
        ("nodes", unique_index(doc! { "parent_id": 1, "slug": 1 })),
        ("node_texts", unique_index(doc! { "node_id": 1, "text_id": 1 })),
        ("node_images", unique_index(doc! { "node_id": 1, "image_id": 1 })),
    ];

    for (collection, index) in indexes {
        db.collection::<Document>(collection)
            .create_index(index)
            .await?;
    }

    tracing::info!("MongoDB indexes ensured");
    Ok(())
}
