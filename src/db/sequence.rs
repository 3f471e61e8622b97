use mongodb::bson::{doc, Document};
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};

use crate::error::AppError;

/// Allocates sequential integer ids from the `counters` collection.
///
/// Each named counter is a single document `{ _id: <name>, seq: <i64> }`
/// bumped atomically, so ids stay unique across concurrent requests.
#[derive(Clone)]
pub struct Sequence {
    counters: mongodb::Collection<Document>,
}

impl Sequence {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            counters: db.collection("counters"),
        }
    }

    /// Return the next id for `name`, starting at 1.
    pub async fn next(&self, name: &str) -> Result<i64, AppError> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        let counter = self
            .counters
            .find_one_and_update(doc! { "_id": name }, doc! { "$inc": { "seq": 1_i64 } })
            .with_options(options)
            .await?
            .ok_or_else(|| AppError::Database(format!("Counter '{}' was not created", name)))?;

        counter
            .get_i64("seq")
            .map_err(|e| AppError::Database(format!("Counter '{}' is corrupt: {}", name, e)))
    }
}
