use axum::extract::State;
use axum::Json;

use crate::app::AppState;
use crate::db::models::{normalize_tag_names, Tag, TAG_NAME_MAX_LEN};
use crate::db::tag_repository::TagRepository;
use crate::error::AppError;

/// Turn submitted tag names into tag ids, creating missing tags.
///
/// Names are trimmed and deduplicated; blank names are ignored.
pub async fn resolve_tag_ids<S: AsRef<str>>(
    tags: &dyn TagRepository,
    names: &[S],
) -> Result<Vec<i64>, AppError> {
    let names = normalize_tag_names(names);
    if let Some(long) = names.iter().find(|n| n.chars().count() > TAG_NAME_MAX_LEN) {
        return Err(AppError::BadRequest(format!(
            "Tag '{}' is longer than {} characters",
            long, TAG_NAME_MAX_LEN
        )));
    }

    let mut ids = Vec::with_capacity(names.len());
    for name in &names {
        ids.push(tags.get_or_create(name).await?.id);
    }
    Ok(ids)
}

/// Axum handler for `GET /api/v1/tags`.
pub async fn list_tags_handler(State(state): State<AppState>) -> Result<Json<Vec<Tag>>, AppError> {
    Ok(Json(state.tags.list_all().await?))
}
