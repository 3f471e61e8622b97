use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of a text title.
pub const TITLE_MAX_LEN: usize = 200;
/// Maximum length of a tag name.
pub const TAG_NAME_MAX_LEN: usize = 50;

/// A registered account. Identity only; there is no login flow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub date_joined: DateTime<Utc>,
}

/// Editorial role attached to a user through their profile.
///
/// The order of variants defines the privilege hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reader,
    Author,
    Editor,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Reader => write!(f, "reader"),
            Role::Author => write!(f, "author"),
            Role::Editor => write!(f, "editor"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl Role {
    /// Parse a role from a string (case-insensitive).
    pub fn from_str_ci(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "reader" => Some(Role::Reader),
            "author" => Some(Role::Author),
            "editor" => Some(Role::Editor),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Optional one-to-one extension of a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub user_id: i64,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    #[serde(rename = "_id")]
    pub id: i64,
    pub name: String,
}

/// A rich-text article. `body` is always stored sanitized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Text {
    #[serde(rename = "_id")]
    pub id: i64,
    pub title: String,
    pub body: String,
    pub created_by: i64,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Image {
    #[serde(rename = "_id")]
    pub id: i64,
    /// Storage key of the uploaded file (e.g. `images/<uuid>_photo.png`).
    pub file: String,
    #[serde(default)]
    pub description: String,
    pub uploaded_by: i64,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
}

/// The kinds of content a comment can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentType::Text => write!(f, "text"),
            ContentType::Image => write!(f, "image"),
        }
    }
}

/// Generic back-reference to a piece of taggable content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef {
    pub content_type: ContentType,
    pub object_id: i64,
}

impl ContentRef {
    pub fn text(id: i64) -> Self {
        Self {
            content_type: ContentType::Text,
            object_id: id,
        }
    }

    pub fn image(id: i64) -> Self {
        Self {
            content_type: ContentType::Image,
            object_id: id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: i64,
    pub content_type: ContentType,
    pub object_id: i64,
    pub user_id: i64,
    pub comment: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// An entry of the category/page tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    #[serde(rename = "_id")]
    pub id: i64,
    pub title: String,
    pub slug: String,
    /// `None` for root nodes.
    #[serde(default)]
    pub parent_id: Option<i64>,
    /// Sibling order, lower first.
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub is_published: bool,
    pub created_by: i64,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// Join row placing a text inside a node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeText {
    #[serde(rename = "_id")]
    pub id: i64,
    pub node_id: i64,
    pub text_id: i64,
    #[serde(default)]
    pub position: i32,
}

/// Join row placing an image inside a node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeImage {
    #[serde(rename = "_id")]
    pub id: i64,
    pub node_id: i64,
    pub image_id: i64,
    #[serde(default)]
    pub position: i32,
}

/// Returns `true` if `slug` is non-empty and only contains ASCII letters,
/// digits, hyphens and underscores.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Trim, drop empties and deduplicate tag names, keeping first-seen order.
pub fn normalize_tag_names<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names {
        let name = name.as_ref().trim();
        if !name.is_empty() && !out.iter().any(|n| n == name) {
            out.push(name.to_string());
        }
    }
    out
}
