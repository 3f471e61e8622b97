use async_trait::async_trait;
use chrono::Utc;

use crate::db::models::{ContentRef, ContentType, Node, NodeImage, NodeText};
use crate::error::AppError;

/// Fields of a node before it has an id.
#[derive(Debug, Clone)]
pub struct NewNode {
    pub title: String,
    pub slug: String,
    pub parent_id: Option<i64>,
    pub position: i32,
    pub is_published: bool,
    pub created_by: i64,
}

/// Repository trait for the node tree and its text/image attachments.
///
/// Children and attachments are always returned ordered by
/// `(position, id)`.
#[async_trait]
pub trait NodeRepository: Send + Sync {
    /// Insert a node. Fails with `Conflict` if a sibling already uses the slug.
    async fn insert(&self, new_node: NewNode) -> Result<Node, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Node>, AppError>;

    /// The child of `parent_id` (or the root when `None`) with this slug,
    /// regardless of its published flag.
    async fn find_child(&self, parent_id: Option<i64>, slug: &str)
        -> Result<Option<Node>, AppError>;

    /// Like [`NodeRepository::find_child`] but only matches published nodes.
    async fn find_published_child(
        &self,
        parent_id: Option<i64>,
        slug: &str,
    ) -> Result<Option<Node>, AppError>;

    async fn list_children(
        &self,
        parent_id: Option<i64>,
        published_only: bool,
    ) -> Result<Vec<Node>, AppError>;

    /// Place a text in a node. Re-attaching only moves it to `position`.
    async fn attach_text(
        &self,
        node_id: i64,
        text_id: i64,
        position: i32,
    ) -> Result<NodeText, AppError>;

    /// Place an image in a node. Re-attaching only moves it to `position`.
    async fn attach_image(
        &self,
        node_id: i64,
        image_id: i64,
        position: i32,
    ) -> Result<NodeImage, AppError>;

    async fn list_texts(&self, node_id: i64) -> Result<Vec<NodeText>, AppError>;

    async fn list_images(&self, node_id: i64) -> Result<Vec<NodeImage>, AppError>;

    /// Drop every attachment of a text or image. Returns how many were removed.
    async fn detach_content(&self, target: ContentRef) -> Result<u64, AppError>;

    /// Delete a node, all of its descendants and their attachments.
    ///
    /// Returns the number of nodes removed, 0 if `node_id` didn't exist.
    async fn delete_subtree(&self, node_id: i64) -> Result<u64, AppError>;
}

/// MongoDB implementation of the NodeRepository.
pub struct MongoNodeRepository {
    nodes: mongodb::Collection<Node>,
    node_texts: mongodb::Collection<NodeText>,
    node_images: mongodb::Collection<NodeImage>,
    sequence: crate::db::sequence::Sequence,
}

impl MongoNodeRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            nodes: db.collection("nodes"),
            node_texts: db.collection("node_texts"),
            node_images: db.collection("node_images"),
            sequence: crate::db::sequence::Sequence::new(db),
        }
    }

    /// Ids of `root` and every node below it, breadth first.
    async fn collect_subtree(&self, root: i64) -> Result<Vec<i64>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;

        let mut all = vec![root];
        let mut frontier = vec![root];

        while !frontier.is_empty() {
            let children: Vec<Node> = self
                .nodes
                .find(doc! { "parent_id": { "$in": frontier.clone() } })
                .await?
                .try_collect()
                .await?;
            frontier = children.into_iter().map(|n| n.id).collect();
            all.extend(frontier.iter().copied());
        }

        Ok(all)
    }
}

#[async_trait]
impl NodeRepository for MongoNodeRepository {
    async fn insert(&self, new_node: NewNode) -> Result<Node, AppError> {
        if self
            .find_child(new_node.parent_id, &new_node.slug)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "A sibling node with slug '{}' already exists",
                new_node.slug
            )));
        }

        let node = Node {
            id: self.sequence.next("nodes").await?,
            title: new_node.title,
            slug: new_node.slug,
            parent_id: new_node.parent_id,
            position: new_node.position,
            is_published: new_node.is_published,
            created_by: new_node.created_by,
            created_at: Utc::now(),
        };

        self.nodes.insert_one(&node).await.map_err(|e| {
            if crate::db::is_duplicate_key(&e) {
                AppError::Conflict(format!(
                    "A sibling node with slug '{}' already exists",
                    node.slug
                ))
            } else {
                AppError::Database(e.to_string())
            }
        })?;

        Ok(node)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Node>, AppError> {
        use mongodb::bson::doc;

        Ok(self.nodes.find_one(doc! { "_id": id }).await?)
    }

    async fn find_child(
        &self,
        parent_id: Option<i64>,
        slug: &str,
    ) -> Result<Option<Node>, AppError> {
        use mongodb::bson::doc;

        Ok(self
            .nodes
            .find_one(doc! { "parent_id": parent_id, "slug": slug })
            .await?)
    }

    async fn find_published_child(
        &self,
        parent_id: Option<i64>,
        slug: &str,
    ) -> Result<Option<Node>, AppError> {
        use mongodb::bson::doc;

        Ok(self
            .nodes
            .find_one(doc! { "parent_id": parent_id, "slug": slug, "is_published": true })
            .await?)
    }

    async fn list_children(
        &self,
        parent_id: Option<i64>,
        published_only: bool,
    ) -> Result<Vec<Node>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;

        let mut filter = doc! { "parent_id": parent_id };
        if published_only {
            filter.insert("is_published", true);
        }

        let cursor = self
            .nodes
            .find(filter)
            .sort(doc! { "position": 1, "_id": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn attach_text(
        &self,
        node_id: i64,
        text_id: i64,
        position: i32,
    ) -> Result<NodeText, AppError> {
        use mongodb::bson::doc;
        use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        if let Some(existing) = self
            .node_texts
            .find_one_and_update(
                doc! { "node_id": node_id, "text_id": text_id },
                doc! { "$set": { "position": position } },
            )
            .with_options(options)
            .await?
        {
            return Ok(existing);
        }

        let attachment = NodeText {
            id: self.sequence.next("node_texts").await?,
            node_id,
            text_id,
            position,
        };
        self.node_texts.insert_one(&attachment).await?;
        Ok(attachment)
    }

    async fn attach_image(
        &self,
        node_id: i64,
        image_id: i64,
        position: i32,
    ) -> Result<NodeImage, AppError> {
        use mongodb::bson::doc;
        use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        if let Some(existing) = self
            .node_images
            .find_one_and_update(
                doc! { "node_id": node_id, "image_id": image_id },
                doc! { "$set": { "position": position } },
            )
            .with_options(options)
            .await?
        {
            return Ok(existing);
        }

        let attachment = NodeImage {
            id: self.sequence.next("node_images").await?,
            node_id,
            image_id,
            position,
        };
        self.node_images.insert_one(&attachment).await?;
        Ok(attachment)
    }

    async fn list_texts(&self, node_id: i64) -> Result<Vec<NodeText>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;

        let cursor = self
            .node_texts
            .find(doc! { "node_id": node_id })
            .sort(doc! { "position": 1, "_id": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn list_images(&self, node_id: i64) -> Result<Vec<NodeImage>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;

        let cursor = self
            .node_images
            .find(doc! { "node_id": node_id })
            .sort(doc! { "position": 1, "_id": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn detach_content(&self, target: ContentRef) -> Result<u64, AppError> {
        use mongodb::bson::doc;

        let result = match target.content_type {
            ContentType::Text => {
                self.node_texts
                    .delete_many(doc! { "text_id": target.object_id })
                    .await?
            }
            ContentType::Image => {
                self.node_images
                    .delete_many(doc! { "image_id": target.object_id })
                    .await?
            }
        };
        Ok(result.deleted_count)
    }

    async fn delete_subtree(&self, node_id: i64) -> Result<u64, AppError> {
        use mongodb::bson::doc;

        if self.find_by_id(node_id).await?.is_none() {
            return Ok(0);
        }

        let ids = self.collect_subtree(node_id).await?;

        self.node_texts
            .delete_many(doc! { "node_id": { "$in": ids.clone() } })
            .await?;
        self.node_images
            .delete_many(doc! { "node_id": { "$in": ids.clone() } })
            .await?;
        let result = self
            .nodes
            .delete_many(doc! { "_id": { "$in": ids } })
            .await?;

        tracing::debug!(node_id, deleted = result.deleted_count, "Deleted node subtree");
        Ok(result.deleted_count)
    }
}
