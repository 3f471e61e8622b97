use crate::db::models::Node;
use crate::db::node_repository::NodeRepository;
use crate::error::AppError;

/// A node reached by walking a slash-separated path from the root.
#[derive(Debug, Clone)]
pub struct ResolvedPath {
    /// Ancestors from the root down to the node's parent.
    pub ancestors: Vec<Node>,
    pub node: Node,
}

impl ResolvedPath {
    /// Root-to-leaf chain, the node itself last.
    pub fn trail(&self) -> impl Iterator<Item = &Node> {
        self.ancestors.iter().chain(std::iter::once(&self.node))
    }

    /// Canonical path of the node, e.g. `docs/guides/install`.
    pub fn path(&self) -> String {
        node_path(self.trail())
    }
}

/// Split a tree path into slugs, ignoring empty segments.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Join the slugs of a root-to-leaf chain.
pub fn node_path<'a>(trail: impl IntoIterator<Item = &'a Node>) -> String {
    trail
        .into_iter()
        .map(|n| n.slug.as_str())
        .collect::<Vec<_>>()
        .join("/")
}

/// Resolve `path` to a published node.
///
/// Each segment is looked up under the node found for the previous one (the
/// first under the root). A segment with no published match, or an empty
/// path, is a `NotFound`.
pub async fn resolve_path(nodes: &dyn NodeRepository, path: &str) -> Result<ResolvedPath, AppError> {
    let mut ancestors = Vec::new();
    let mut current: Option<Node> = None;

    for slug in split_path(path) {
        let parent_id = current.as_ref().map(|n| n.id);
        let found = nodes
            .find_published_child(parent_id, slug)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No page at '/tree/{}'", path.trim_matches('/'))))?;
        if let Some(parent) = current.replace(found) {
            ancestors.push(parent);
        }
    }

    let node = current.ok_or_else(|| AppError::NotFound("Empty tree path".into()))?;
    Ok(ResolvedPath { ancestors, node })
}
