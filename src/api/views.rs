use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{Comment, Image, Tag, Text, User};
use crate::db::tag_repository::TagRepository;
use crate::db::user_repository::UserRepository;
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
        }
    }
}

/// A text as shown in lists and on its detail page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextView {
    pub id: i64,
    pub title: String,
    /// Sanitized HTML, safe to embed as-is.
    pub body: String,
    pub author: Option<UserSummary>,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageView {
    pub id: i64,
    pub file_url: String,
    pub description: String,
    pub uploaded_by: Option<UserSummary>,
    pub uploaded_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentView {
    pub id: i64,
    pub user: Option<UserSummary>,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

pub fn text_url(id: i64) -> String {
    format!("/texts/{id}/")
}

pub fn image_url(id: i64) -> String {
    format!("/images/{id}/")
}

/// Public URL of a stored file key such as `images/abc.png`.
pub fn media_url(file_key: &str) -> String {
    format!("/media/{}", file_key.trim_start_matches('/'))
}

/// How a list view narrows its query by tag name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagFilter {
    All,
    Tag(i64),
    /// The requested tag doesn't exist, so nothing can match.
    Unknown,
}

pub async fn resolve_tag_filter(
    tags: &dyn TagRepository,
    name: Option<&str>,
) -> Result<TagFilter, AppError> {
    let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(TagFilter::All);
    };
    Ok(match tags.find_by_name(name).await? {
        Some(tag) => TagFilter::Tag(tag.id),
        None => TagFilter::Unknown,
    })
}

fn unique_ids(ids: impl Iterator<Item = i64>) -> Vec<i64> {
    let mut ids: Vec<i64> = ids.collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

async fn load_users(
    users: &dyn UserRepository,
    ids: impl Iterator<Item = i64>,
) -> Result<HashMap<i64, UserSummary>, AppError> {
    Ok(users
        .find_by_ids(&unique_ids(ids))
        .await?
        .into_iter()
        .map(|u| (u.id, UserSummary::from(u)))
        .collect())
}

async fn load_tags(
    tags: &dyn TagRepository,
    ids: impl Iterator<Item = i64>,
) -> Result<HashMap<i64, String>, AppError> {
    Ok(tags
        .find_by_ids(&unique_ids(ids))
        .await?
        .into_iter()
        .map(|Tag { id, name }| (id, name))
        .collect())
}

fn tag_names(ids: &[i64], names: &HashMap<i64, String>) -> Vec<String> {
    let mut out: Vec<String> = ids.iter().filter_map(|id| names.get(id).cloned()).collect();
    out.sort();
    out
}

/// Build text views, fetching authors and tags for the whole batch at once.
pub async fn present_texts(
    users: &dyn UserRepository,
    tags: &dyn TagRepository,
    texts: Vec<Text>,
) -> Result<Vec<TextView>, AppError> {
    let authors = load_users(users, texts.iter().map(|t| t.created_by)).await?;
    let names = load_tags(tags, texts.iter().flat_map(|t| t.tag_ids.iter().copied())).await?;

    Ok(texts
        .into_iter()
        .map(|t| TextView {
            url: text_url(t.id),
            tags: tag_names(&t.tag_ids, &names),
            author: authors.get(&t.created_by).cloned(),
            id: t.id,
            title: t.title,
            body: t.body,
            created_at: t.created_at,
        })
        .collect())
}

/// Build image views, fetching uploaders and tags for the whole batch at once.
pub async fn present_images(
    users: &dyn UserRepository,
    tags: &dyn TagRepository,
    images: Vec<Image>,
) -> Result<Vec<ImageView>, AppError> {
    let uploaders = load_users(users, images.iter().map(|i| i.uploaded_by)).await?;
    let names = load_tags(tags, images.iter().flat_map(|i| i.tag_ids.iter().copied())).await?;

    Ok(images
        .into_iter()
        .map(|i| ImageView {
            url: image_url(i.id),
            file_url: media_url(&i.file),
            tags: tag_names(&i.tag_ids, &names),
            uploaded_by: uploaders.get(&i.uploaded_by).cloned(),
            id: i.id,
            description: i.description,
            uploaded_at: i.uploaded_at,
        })
        .collect())
}

pub async fn present_comments(
    users: &dyn UserRepository,
    comments: Vec<Comment>,
) -> Result<Vec<CommentView>, AppError> {
    let authors = load_users(users, comments.iter().map(|c| c.user_id)).await?;

    Ok(comments
        .into_iter()
        .map(|c| CommentView {
            user: authors.get(&c.user_id).cloned(),
            id: c.id,
            comment: c.comment,
            created_at: c.created_at,
        })
        .collect())
}
