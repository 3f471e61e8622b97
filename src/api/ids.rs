use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;

use crate::error::AppError;

/// Numeric `{id}` path segment. Anything that is not an integer cannot name
/// a row, so it is rejected with `404` rather than axum's `400`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordId(pub i64);

impl<S> FromRequestParts<S> for RecordId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<i64>::from_request_parts(parts, state).await {
            Ok(Path(id)) => Ok(RecordId(id)),
            Err(_) => Err(AppError::NotFound(format!(
                "Nothing found at {}",
                parts.uri.path()
            ))),
        }
    }
}
