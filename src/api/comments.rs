use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::auth::ServiceAuth;
use crate::api::views::{present_comments, CommentView};
use crate::app::AppState;
use crate::db::comment_repository::{CommentRepository, NewComment};
use crate::db::image_repository::ImageRepository;
use crate::db::models::{ContentRef, ContentType};
use crate::db::text_repository::TextRepository;
use crate::db::user_repository::UserRepository;
use crate::error::AppError;

/// Request payload for `POST /api/v1/comments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommentRequest {
    pub content_type: ContentType,
    pub object_id: i64,
    pub user_id: i64,
    pub comment: String,
}

/// Store a comment on an existing text or image by an existing user.
pub async fn process_create_comment(
    users: &dyn UserRepository,
    texts: &dyn TextRepository,
    images: &dyn ImageRepository,
    comments: &dyn CommentRepository,
    request: CreateCommentRequest,
) -> Result<CommentView, AppError> {
    let body = request.comment.trim();
    if body.is_empty() {
        return Err(AppError::BadRequest("Comment cannot be empty".into()));
    }

    let exists = match request.content_type {
        ContentType::Text => texts.find_by_id(request.object_id).await?.is_some(),
        ContentType::Image => images.find_by_id(request.object_id).await?.is_some(),
    };
    if !exists {
        return Err(AppError::NotFound(format!(
            "No {} with id {}",
            request.content_type, request.object_id
        )));
    }

    if users.find_by_id(request.user_id).await?.is_none() {
        return Err(AppError::BadRequest(format!(
            "User {} does not exist",
            request.user_id
        )));
    }

    let target = ContentRef {
        content_type: request.content_type,
        object_id: request.object_id,
    };
    let comment = comments
        .insert(NewComment {
            target,
            user_id: request.user_id,
            comment: body.to_string(),
        })
        .await?;

    tracing::info!(
        comment_id = comment.id,
        content_type = %target.content_type,
        object_id = target.object_id,
        "Comment added"
    );

    present_comments(users, vec![comment])
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal("Comment vanished while rendering".into()))
}

/// Axum handler for `POST /api/v1/comments`.
pub async fn create_comment_handler(
    State(state): State<AppState>,
    _auth: ServiceAuth,
    Json(request): Json<CreateCommentRequest>,
) -> Result<Json<CommentView>, AppError> {
    let view = process_create_comment(
        state.users.as_ref(),
        state.texts.as_ref(),
        state.images.as_ref(),
        state.comments.as_ref(),
        request,
    )
    .await?;

    Ok(Json(view))
}
