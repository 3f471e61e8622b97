use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::auth::ServiceAuth;
use crate::api::ids::RecordId;
use crate::api::views::{present_images, present_texts, ImageView, TextView};
use crate::app::AppState;
use crate::db::image_repository::ImageRepository;
use crate::db::models::{is_valid_slug, ContentType, Node, TITLE_MAX_LEN};
use crate::db::node_repository::{NewNode, NodeRepository};
use crate::db::text_repository::TextRepository;
use crate::db::user_repository::UserRepository;
use crate::error::AppError;
use crate::tree::{node_path, resolve_path};

/// A node as linked from listings and breadcrumbs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeSummary {
    pub id: i64,
    pub title: String,
    pub slug: String,
    /// Slash-joined slugs from the root, e.g. `docs/guides`.
    pub path: String,
    pub url: String,
    pub position: i32,
}

impl NodeSummary {
    fn new(node: &Node, path: String) -> Self {
        Self {
            id: node.id,
            title: node.title.clone(),
            slug: node.slug.clone(),
            url: tree_url(&path),
            path,
            position: node.position,
        }
    }
}

pub fn tree_url(path: &str) -> String {
    format!("/tree/{}/", path)
}

fn child_path(parent_path: &str, slug: &str) -> String {
    if parent_path.is_empty() {
        slug.to_string()
    } else {
        format!("{parent_path}/{slug}")
    }
}

/// Response of `GET /tree/{*path}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodePageView {
    pub node: NodeSummary,
    /// Root first, the node itself last.
    pub breadcrumbs: Vec<NodeSummary>,
    /// Published children in sibling order.
    pub children: Vec<NodeSummary>,
    /// Attached texts in attachment order.
    pub texts: Vec<TextView>,
    /// Attached images in attachment order.
    pub images: Vec<ImageView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNodeRequest {
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub is_published: bool,
    pub created_by: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeCreatedView {
    pub node: NodeSummary,
    pub parent_id: Option<i64>,
    pub is_published: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachTextRequest {
    pub text_id: i64,
    #[serde(default)]
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachImageRequest {
    pub image_id: i64,
    #[serde(default)]
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttachmentView {
    pub node_id: i64,
    pub content_type: ContentType,
    pub object_id: i64,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteNodeResponse {
    pub message: String,
    pub nodes_removed: u64,
}

/// Keep `items` in the order of `ids`, dropping ids with no item.
fn in_order<T>(ids: &[i64], items: Vec<T>, id_of: impl Fn(&T) -> i64) -> Vec<T> {
    let mut by_id: HashMap<i64, T> = items.into_iter().map(|i| (id_of(&i), i)).collect();
    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}

/// Published root nodes in sibling order.
pub async fn root_nodes(nodes: &dyn NodeRepository) -> Result<Vec<NodeSummary>, AppError> {
    Ok(nodes
        .list_children(None, true)
        .await?
        .iter()
        .map(|n| NodeSummary::new(n, n.slug.clone()))
        .collect())
}

/// Everything shown on a tree page: breadcrumbs, published children and the
/// attached content.
pub async fn node_page(state: &AppState, path: &str) -> Result<NodePageView, AppError> {
    let resolved = resolve_path(state.nodes.as_ref(), path).await?;

    let mut breadcrumbs = Vec::with_capacity(resolved.ancestors.len() + 1);
    let mut crumb_path = String::new();
    for node in resolved.trail() {
        crumb_path = child_path(&crumb_path, &node.slug);
        breadcrumbs.push(NodeSummary::new(node, crumb_path.clone()));
    }

    let node = &resolved.node;
    let children = state
        .nodes
        .list_children(Some(node.id), true)
        .await?
        .iter()
        .map(|c| NodeSummary::new(c, child_path(&crumb_path, &c.slug)))
        .collect();

    let text_ids: Vec<i64> = state
        .nodes
        .list_texts(node.id)
        .await?
        .into_iter()
        .map(|a| a.text_id)
        .collect();
    let texts = in_order(&text_ids, state.texts.find_by_ids(&text_ids).await?, |t| t.id);
    let texts = present_texts(state.users.as_ref(), state.tags.as_ref(), texts).await?;

    let image_ids: Vec<i64> = state
        .nodes
        .list_images(node.id)
        .await?
        .into_iter()
        .map(|a| a.image_id)
        .collect();
    let images = in_order(&image_ids, state.images.find_by_ids(&image_ids).await?, |i| i.id);
    let images = present_images(state.users.as_ref(), state.tags.as_ref(), images).await?;

    Ok(NodePageView {
        node: NodeSummary::new(node, crumb_path),
        breadcrumbs,
        children,
        texts,
        images,
    })
}

/// Canonical path of any node, published or not, walking up its parents.
async fn path_of(nodes: &dyn NodeRepository, node: &Node) -> Result<String, AppError> {
    let mut chain = vec![node.clone()];
    let mut parent_id = node.parent_id;
    while let Some(id) = parent_id {
        let parent = nodes
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Node {} has a dangling parent {}", node.id, id)))?;
        parent_id = parent.parent_id;
        chain.push(parent);
    }
    chain.reverse();
    Ok(node_path(&chain))
}

/// Validate and insert a node. Sibling slugs must be unique.
pub async fn process_create_node(
    users: &dyn UserRepository,
    nodes: &dyn NodeRepository,
    request: CreateNodeRequest,
) -> Result<NodeCreatedView, AppError> {
    let title = request.title.trim();
    if title.is_empty() || title.chars().count() > TITLE_MAX_LEN {
        return Err(AppError::BadRequest(format!(
            "Title must be between 1 and {} characters",
            TITLE_MAX_LEN
        )));
    }
    let slug = request.slug.trim();
    if !is_valid_slug(slug) {
        return Err(AppError::BadRequest(format!(
            "Invalid slug '{}': use letters, digits, '-' or '_'",
            slug
        )));
    }
    if let Some(parent_id) = request.parent_id {
        if nodes.find_by_id(parent_id).await?.is_none() {
            return Err(AppError::BadRequest(format!(
                "Parent node {} does not exist",
                parent_id
            )));
        }
    }
    if users.find_by_id(request.created_by).await?.is_none() {
        return Err(AppError::BadRequest(format!(
            "User {} does not exist",
            request.created_by
        )));
    }

    let node = nodes
        .insert(NewNode {
            title: title.to_string(),
            slug: slug.to_string(),
            parent_id: request.parent_id,
            position: request.position,
            is_published: request.is_published,
            created_by: request.created_by,
        })
        .await?;

    let path = path_of(nodes, &node).await?;
    tracing::info!(node_id = node.id, path = %path, "Node created");

    Ok(NodeCreatedView {
        node: NodeSummary::new(&node, path),
        parent_id: node.parent_id,
        is_published: node.is_published,
    })
}

async fn require_node(nodes: &dyn NodeRepository, id: i64) -> Result<Node, AppError> {
    nodes
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Node {} not found", id)))
}

pub async fn process_attach_text(
    nodes: &dyn NodeRepository,
    texts: &dyn TextRepository,
    node_id: i64,
    request: AttachTextRequest,
) -> Result<AttachmentView, AppError> {
    require_node(nodes, node_id).await?;
    if texts.find_by_id(request.text_id).await?.is_none() {
        return Err(AppError::BadRequest(format!(
            "Text {} does not exist",
            request.text_id
        )));
    }

    let row = nodes
        .attach_text(node_id, request.text_id, request.position)
        .await?;
    Ok(AttachmentView {
        node_id: row.node_id,
        content_type: ContentType::Text,
        object_id: row.text_id,
        position: row.position,
    })
}

pub async fn process_attach_image(
    nodes: &dyn NodeRepository,
    images: &dyn ImageRepository,
    node_id: i64,
    request: AttachImageRequest,
) -> Result<AttachmentView, AppError> {
    require_node(nodes, node_id).await?;
    if images.find_by_id(request.image_id).await?.is_none() {
        return Err(AppError::BadRequest(format!(
            "Image {} does not exist",
            request.image_id
        )));
    }

    let row = nodes
        .attach_image(node_id, request.image_id, request.position)
        .await?;
    Ok(AttachmentView {
        node_id: row.node_id,
        content_type: ContentType::Image,
        object_id: row.image_id,
        position: row.position,
    })
}

/// Delete a node with all its descendants.
pub async fn process_delete_node(
    nodes: &dyn NodeRepository,
    id: i64,
) -> Result<DeleteNodeResponse, AppError> {
    let nodes_removed = nodes.delete_subtree(id).await?;
    if nodes_removed == 0 {
        return Err(AppError::NotFound(format!("Node {} not found", id)));
    }

    tracing::info!(node_id = id, nodes_removed, "Node subtree deleted");
    Ok(DeleteNodeResponse {
        message: "Node deleted".to_string(),
        nodes_removed,
    })
}

/// Axum handler for `GET /tree/`.
pub async fn root_nodes_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<NodeSummary>>, AppError> {
    Ok(Json(root_nodes(state.nodes.as_ref()).await?))
}

/// Axum handler for `GET /tree/{*path}`.
pub async fn node_page_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<NodePageView>, AppError> {
    Ok(Json(node_page(&state, &path).await?))
}

/// Axum handler for `POST /api/v1/nodes`.
pub async fn create_node_handler(
    State(state): State<AppState>,
    _auth: ServiceAuth,
    Json(request): Json<CreateNodeRequest>,
) -> Result<Json<NodeCreatedView>, AppError> {
    let view = process_create_node(state.users.as_ref(), state.nodes.as_ref(), request).await?;
    Ok(Json(view))
}

/// Axum handler for `POST /api/v1/nodes/{id}/texts`.
pub async fn attach_text_handler(
    State(state): State<AppState>,
    _auth: ServiceAuth,
    RecordId(id): RecordId,
    Json(request): Json<AttachTextRequest>,
) -> Result<Json<AttachmentView>, AppError> {
    let view = process_attach_text(state.nodes.as_ref(), state.texts.as_ref(), id, request).await?;
    Ok(Json(view))
}

/// Axum handler for `POST /api/v1/nodes/{id}/images`.
pub async fn attach_image_handler(
    State(state): State<AppState>,
    _auth: ServiceAuth,
    RecordId(id): RecordId,
    Json(request): Json<AttachImageRequest>,
) -> Result<Json<AttachmentView>, AppError> {
    let view =
        process_attach_image(state.nodes.as_ref(), state.images.as_ref(), id, request).await?;
    Ok(Json(view))
}

/// Axum handler for `DELETE /api/v1/nodes/{id}`.
pub async fn delete_node_handler(
    State(state): State<AppState>,
    _auth: ServiceAuth,
    RecordId(id): RecordId,
) -> Result<Json<DeleteNodeResponse>, AppError> {
    Ok(Json(process_delete_node(state.nodes.as_ref(), id).await?))
}
