use axum::extract::{Multipart, Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::auth::ServiceAuth;
use crate::api::ids::RecordId;
use crate::api::tags::resolve_tag_ids;
use crate::api::texts::DeleteContentResponse;
use crate::api::views::{present_comments, present_images, resolve_tag_filter, CommentView, ImageView, TagFilter};
use crate::app::AppState;
use crate::db::comment_repository::CommentRepository;
use crate::db::image_repository::{ImageRepository, NewImage};
use crate::db::models::{ContentRef, Image};
use crate::db::node_repository::NodeRepository;
use crate::db::tag_repository::TagRepository;
use crate::db::user_repository::UserRepository;
use crate::error::AppError;
use crate::pagination::{ListQuery, Page, Paginator, IMAGES_PER_PAGE};
use crate::storage::client::StorageClient;

/// Key prefix of uploaded image files in the bucket.
pub const IMAGE_PREFIX: &str = "images/";

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageListView {
    pub page: Page<ImageView>,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageDetailView {
    pub image: ImageView,
    pub comments: Vec<CommentView>,
}

/// A decoded multipart upload.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
    pub description: String,
    pub tags: Vec<String>,
    pub uploaded_by: i64,
}

/// Replace anything outside `[A-Za-z0-9.-]` so the name is safe as a key suffix.
fn sanitize_file_name(name: &str) -> String {
    let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    if cleaned.trim_matches(['.', '_']).is_empty() {
        "upload.bin".to_string()
    } else {
        cleaned
    }
}

/// Raster formats accepted for upload, recognized by their leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
    Bmp,
}

impl RasterFormat {
    /// Sniff the format from the file signature. SVG and other text-based
    /// formats are never recognized.
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else if data.starts_with(b"BM") && data.len() >= 14 {
            Some(Self::Bmp)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Bmp => "bmp",
        }
    }
}

/// Storage key for a new upload, unique even for identical file names.
///
/// The extension always comes from `format`, so media is served with the
/// content type of the bytes actually stored.
pub fn image_key(file_name: &str, format: RasterFormat) -> String {
    let name = sanitize_file_name(file_name);
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name.as_str(),
    };
    format!(
        "{}{}_{}.{}",
        IMAGE_PREFIX,
        uuid::Uuid::new_v4().simple(),
        stem,
        format.extension()
    )
}

/// Newest images first, optionally filtered by tag name, 24 per page.
pub async fn list_images(state: &AppState, query: &ListQuery) -> Result<ImageListView, AppError> {
    let tag = query.tag.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let filter = resolve_tag_filter(state.tags.as_ref(), tag).await?;

    let (tag_id, count) = match filter {
        TagFilter::All => (None, state.images.count(None).await?),
        TagFilter::Tag(id) => (Some(id), state.images.count(Some(id)).await?),
        TagFilter::Unknown => (None, 0),
    };

    let window = Paginator::new(count, IMAGES_PER_PAGE).get_page(query.page.as_deref());
    let images = if window.is_empty() {
        Vec::new()
    } else {
        state
            .images
            .list(tag_id, window.offset(), window.per_page)
            .await?
    };
    let items = present_images(state.users.as_ref(), state.tags.as_ref(), images).await?;

    Ok(ImageListView {
        page: Page::new(items, window),
        tag: tag.map(str::to_string),
    })
}

pub async fn image_detail(state: &AppState, id: i64) -> Result<ImageDetailView, AppError> {
    let image = state
        .images
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Image {} not found", id)))?;

    let comments = state.comments.list_for(ContentRef::image(id)).await?;
    let comments = present_comments(state.users.as_ref(), comments).await?;
    let image = present_images(state.users.as_ref(), state.tags.as_ref(), vec![image])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Internal(format!("Image {} vanished while rendering", id)))?;

    Ok(ImageDetailView { image, comments })
}

/// Read the `file`, `description`, `tags` and `uploaded_by` fields of an
/// upload form. `tags` is a comma-separated list.
pub async fn read_upload(mut multipart: Multipart) -> Result<ImageUpload, AppError> {
    let mut file: Option<(String, String, Vec<u8>)> = None;
    let mut description = String::new();
    let mut tags = Vec::new();
    let mut uploaded_by: Option<i64> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload.bin").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read file: {e}")))?;
                file = Some((file_name, content_type, data.to_vec()));
            }
            "description" | "tags" | "uploaded_by" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read '{name}': {e}")))?;
                match name.as_str() {
                    "description" => description = value,
                    "tags" => tags = value.split(',').map(str::to_string).collect(),
                    _ => {
                        let id = value.trim().parse::<i64>().map_err(|_| {
                            AppError::BadRequest(format!("Invalid uploaded_by '{}'", value.trim()))
                        })?;
                        uploaded_by = Some(id);
                    }
                }
            }
            _ => {}
        }
    }

    let (file_name, content_type, data) =
        file.ok_or_else(|| AppError::BadRequest("No file field found in request".into()))?;
    let uploaded_by =
        uploaded_by.ok_or_else(|| AppError::BadRequest("Missing uploaded_by field".into()))?;

    Ok(ImageUpload {
        file_name,
        content_type,
        data,
        description,
        tags,
        uploaded_by,
    })
}

/// Core upload logic, separated from the HTTP layer for testability.
///
/// Only `image/*` payloads whose bytes are a known raster format are
/// accepted. The bytes are stored first, then the image row is recorded.
pub async fn process_image_upload(
    users: &dyn UserRepository,
    tags: &dyn TagRepository,
    images: &dyn ImageRepository,
    storage: &dyn StorageClient,
    upload: ImageUpload,
) -> Result<Image, AppError> {
    if !upload.content_type.starts_with("image/") {
        return Err(AppError::BadRequest("Only image files are allowed".into()));
    }
    if upload.data.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".into()));
    }
    let format = RasterFormat::detect(&upload.data).ok_or_else(|| {
        AppError::BadRequest("Unsupported image format: use PNG, JPEG, GIF, WebP or BMP".into())
    })?;
    if users.find_by_id(upload.uploaded_by).await?.is_none() {
        return Err(AppError::BadRequest(format!(
            "Uploader {} does not exist",
            upload.uploaded_by
        )));
    }

    let tag_ids = resolve_tag_ids(tags, &upload.tags).await?;
    let key = image_key(&upload.file_name, format);
    storage.put_object(&key, upload.data).await?;

    let image = images
        .insert(NewImage {
            file: key,
            description: upload.description.trim().to_string(),
            uploaded_by: upload.uploaded_by,
            tag_ids,
        })
        .await?;

    tracing::info!(image_id = image.id, file = %image.file, "Image uploaded");
    Ok(image)
}

/// Delete an image row with its comments and node attachments. The stored
/// file is left in the bucket.
pub async fn process_delete_image(
    images: &dyn ImageRepository,
    comments: &dyn CommentRepository,
    nodes: &dyn NodeRepository,
    id: i64,
) -> Result<DeleteContentResponse, AppError> {
    if !images.delete(id).await? {
        return Err(AppError::NotFound(format!("Image {} not found", id)));
    }

    let target = ContentRef::image(id);
    let comments_removed = comments.delete_for(target).await?;
    let attachments_removed = nodes.detach_content(target).await?;

    tracing::info!(image_id = id, comments_removed, attachments_removed, "Image deleted");
    Ok(DeleteContentResponse {
        message: "Image deleted".to_string(),
        comments_removed,
        attachments_removed,
    })
}

/// Axum handler for `GET /images/`.
pub async fn image_list_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ImageListView>, AppError> {
    Ok(Json(list_images(&state, &query).await?))
}

/// Axum handler for `GET /images/{id}/`.
pub async fn image_detail_handler(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> Result<Json<ImageDetailView>, AppError> {
    Ok(Json(image_detail(&state, id).await?))
}

/// Axum handler for `POST /api/v1/images`.
pub async fn upload_image_handler(
    State(state): State<AppState>,
    _auth: ServiceAuth,
    multipart: Multipart,
) -> Result<Json<ImageDetailView>, AppError> {
    let upload = read_upload(multipart).await?;
    let image = process_image_upload(
        state.users.as_ref(),
        state.tags.as_ref(),
        state.images.as_ref(),
        state.storage.as_ref(),
        upload,
    )
    .await?;

    Ok(Json(image_detail(&state, image.id).await?))
}

/// Axum handler for `DELETE /api/v1/images/{id}`.
pub async fn delete_image_handler(
    State(state): State<AppState>,
    _auth: ServiceAuth,
    RecordId(id): RecordId,
) -> Result<Json<DeleteContentResponse>, AppError> {
    let response = process_delete_image(
        state.images.as_ref(),
        state.comments.as_ref(),
        state.nodes.as_ref(),
        id,
    )
    .await?;

    Ok(Json(response))
}

/// Axum handler for `GET /media/images/{filename}`.
///
/// Streams a stored image back with a content type guessed from its extension.
pub async fn serve_media_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    if filename.contains('/') || filename.contains("..") {
        return Err(AppError::NotFound("Image not found".into()));
    }

    let key = format!("{}{}", IMAGE_PREFIX, filename);
    let data = state
        .storage
        .get_object(&key)
        .await?
        .ok_or_else(|| AppError::NotFound("Image not found".into()))?;

    let content_type = mime_guess::from_path(&filename)
        .first_or_octet_stream()
        .to_string();

    Ok((
        [
            (axum::http::header::CONTENT_TYPE, content_type),
            (axum::http::header::X_CONTENT_TYPE_OPTIONS, "nosniff".to_string()),
        ],
        data,
    )
        .into_response())
}
