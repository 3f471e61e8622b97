use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::auth::ServiceAuth;
use crate::api::ids::RecordId;
use crate::api::tags::resolve_tag_ids;
use crate::api::views::{present_comments, present_texts, resolve_tag_filter, CommentView, TagFilter, TextView};
use crate::app::AppState;
use crate::db::comment_repository::CommentRepository;
use crate::db::models::{ContentRef, Text, TITLE_MAX_LEN};
use crate::db::node_repository::NodeRepository;
use crate::db::tag_repository::TagRepository;
use crate::db::text_repository::{NewText, TextChanges, TextRepository};
use crate::db::user_repository::UserRepository;
use crate::error::AppError;
use crate::pagination::{ListQuery, Page, Paginator, TEXTS_PER_PAGE};
use crate::rendering::sanitize::sanitize_html;

/// Response of `GET /texts/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextListView {
    pub page: Page<TextView>,
    /// The tag filter that was applied, if any.
    pub tag: Option<String>,
}

/// Response of `GET /texts/{id}/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextDetailView {
    pub text: TextView,
    pub comments: Vec<CommentView>,
}

/// Request payload for creating a text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTextRequest {
    pub title: String,
    /// Raw HTML; sanitized before storage.
    pub body: String,
    /// Id of the authoring user.
    pub created_by: i64,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Request payload for replacing a text's editable fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTextRequest {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Response of the delete endpoints for content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteContentResponse {
    pub message: String,
    pub comments_removed: u64,
    pub attachments_removed: u64,
}

fn validate_title(title: &str) -> Result<String, AppError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("Title cannot be empty".into()));
    }
    if title.chars().count() > TITLE_MAX_LEN {
        return Err(AppError::BadRequest(format!(
            "Title is longer than {} characters",
            TITLE_MAX_LEN
        )));
    }
    Ok(title.to_string())
}

/// Newest texts first, optionally filtered by tag name, 10 per page.
pub async fn list_texts(state: &AppState, query: &ListQuery) -> Result<TextListView, AppError> {
    let tag = query.tag.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let filter = resolve_tag_filter(state.tags.as_ref(), tag).await?;

    let (tag_id, count) = match filter {
        TagFilter::All => (None, state.texts.count(None).await?),
        TagFilter::Tag(id) => (Some(id), state.texts.count(Some(id)).await?),
        TagFilter::Unknown => (None, 0),
    };

    let window = Paginator::new(count, TEXTS_PER_PAGE).get_page(query.page.as_deref());
    let texts = if window.is_empty() {
        Vec::new()
    } else {
        state
            .texts
            .list(tag_id, window.offset(), window.per_page)
            .await?
    };
    let items = present_texts(state.users.as_ref(), state.tags.as_ref(), texts).await?;

    Ok(TextListView {
        page: Page::new(items, window),
        tag: tag.map(str::to_string),
    })
}

pub async fn text_detail(state: &AppState, id: i64) -> Result<TextDetailView, AppError> {
    let text = state
        .texts
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Text {} not found", id)))?;

    let comments = state.comments.list_for(ContentRef::text(id)).await?;
    let comments = present_comments(state.users.as_ref(), comments).await?;
    let text = present_texts(state.users.as_ref(), state.tags.as_ref(), vec![text])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Internal(format!("Text {} vanished while rendering", id)))?;

    Ok(TextDetailView { text, comments })
}

/// Core text creation logic, separated from the HTTP layer for testability.
///
/// Validates the title and author, sanitizes the body and attaches tags.
pub async fn process_create_text(
    users: &dyn UserRepository,
    tags: &dyn TagRepository,
    texts: &dyn TextRepository,
    request: CreateTextRequest,
) -> Result<Text, AppError> {
    let title = validate_title(&request.title)?;

    if users.find_by_id(request.created_by).await?.is_none() {
        return Err(AppError::BadRequest(format!(
            "Author {} does not exist",
            request.created_by
        )));
    }

    let tag_ids = resolve_tag_ids(tags, &request.tags).await?;

    let text = texts
        .insert(NewText {
            title,
            body: sanitize_html(&request.body),
            created_by: request.created_by,
            tag_ids,
        })
        .await?;

    tracing::info!(text_id = text.id, "Text created");
    Ok(text)
}

/// Replace title, body and tags of an existing text. The body is sanitized again.
pub async fn process_update_text(
    tags: &dyn TagRepository,
    texts: &dyn TextRepository,
    id: i64,
    request: UpdateTextRequest,
) -> Result<Text, AppError> {
    let title = validate_title(&request.title)?;
    let tag_ids = resolve_tag_ids(tags, &request.tags).await?;

    texts
        .update(
            id,
            TextChanges {
                title,
                body: sanitize_html(&request.body),
                tag_ids,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Text {} not found", id)))
}

/// Delete a text together with its comments and node attachments.
pub async fn process_delete_text(
    texts: &dyn TextRepository,
    comments: &dyn CommentRepository,
    nodes: &dyn NodeRepository,
    id: i64,
) -> Result<DeleteContentResponse, AppError> {
    if !texts.delete(id).await? {
        return Err(AppError::NotFound(format!("Text {} not found", id)));
    }

    let target = ContentRef::text(id);
    let comments_removed = comments.delete_for(target).await?;
    let attachments_removed = nodes.detach_content(target).await?;

    tracing::info!(text_id = id, comments_removed, attachments_removed, "Text deleted");
    Ok(DeleteContentResponse {
        message: "Text deleted".to_string(),
        comments_removed,
        attachments_removed,
    })
}

/// Axum handler for `GET /texts/`.
pub async fn text_list_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<TextListView>, AppError> {
    Ok(Json(list_texts(&state, &query).await?))
}

/// Axum handler for `GET /texts/{id}/`.
pub async fn text_detail_handler(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> Result<Json<TextDetailView>, AppError> {
    Ok(Json(text_detail(&state, id).await?))
}

/// Axum handler for `POST /api/v1/texts`.
pub async fn create_text_handler(
    State(state): State<AppState>,
    _auth: ServiceAuth,
    Json(request): Json<CreateTextRequest>,
) -> Result<Json<TextDetailView>, AppError> {
    let text = process_create_text(
        state.users.as_ref(),
        state.tags.as_ref(),
        state.texts.as_ref(),
        request,
    )
    .await?;

    Ok(Json(text_detail(&state, text.id).await?))
}

/// Axum handler for `PUT /api/v1/texts/{id}`.
pub async fn update_text_handler(
    State(state): State<AppState>,
    _auth: ServiceAuth,
    RecordId(id): RecordId,
    Json(request): Json<UpdateTextRequest>,
) -> Result<Json<TextDetailView>, AppError> {
    process_update_text(state.tags.as_ref(), state.texts.as_ref(), id, request).await?;
    Ok(Json(text_detail(&state, id).await?))
}

/// Axum handler for `DELETE /api/v1/texts/{id}`.
pub async fn delete_text_handler(
    State(state): State<AppState>,
    _auth: ServiceAuth,
    RecordId(id): RecordId,
) -> Result<Json<DeleteContentResponse>, AppError> {
    let response = process_delete_text(
        state.texts.as_ref(),
        state.comments.as_ref(),
        state.nodes.as_ref(),
        id,
    )
    .await?;

    Ok(Json(response))
}
