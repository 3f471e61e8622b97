//! In-memory repositories shared by unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::app::AppState;
use crate::db::comment_repository::{CommentRepository, NewComment};
use crate::db::image_repository::{ImageRepository, NewImage};
use crate::db::models::*;
use crate::db::node_repository::{NewNode, NodeRepository};
use crate::db::tag_repository::TagRepository;
use crate::db::text_repository::{NewText, TextChanges, TextRepository};
use crate::db::user_repository::{NewUser, UserRepository};
use crate::error::AppError;
use crate::storage::client::StorageClient;

/// Monotonic clock so that insertion order equals timestamp order.
fn tick(counter: &Mutex<i64>) -> (i64, chrono::DateTime<Utc>) {
    let mut n = counter.lock().unwrap();
    *n += 1;
    (*n, Utc::now() + Duration::milliseconds(*n))
}

#[derive(Default)]
pub struct MemoryUsers {
    users: Mutex<Vec<User>>,
    profiles: Mutex<Vec<UserProfile>>,
    seq: Mutex<i64>,
}

#[async_trait]
impl UserRepository for MemoryUsers {
    async fn create(&self, new_user: NewUser) -> Result<User, AppError> {
        if self.find_by_username(&new_user.username).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Username '{}' is already taken",
                new_user.username
            )));
        }
        let (id, now) = tick(&self.seq);
        let user = User {
            id,
            username: new_user.username,
            email: new_user.email,
            is_staff: new_user.is_staff,
            date_joined: now,
        };
        self.users.lock().unwrap().push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, AppError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn set_role(&self, user_id: i64, role: Role) -> Result<(), AppError> {
        let mut profiles = self.profiles.lock().unwrap();
        profiles.retain(|p| p.user_id != user_id);
        profiles.push(UserProfile { user_id, role });
        Ok(())
    }
}

impl MemoryUsers {
    /// Role stored in the profile of `user_id`, if any.
    pub fn role_of(&self, user_id: i64) -> Option<Role> {
        self.profiles
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.user_id == user_id)
            .map(|p| p.role)
    }
}

#[derive(Default)]
pub struct MemoryTags {
    tags: Mutex<Vec<Tag>>,
    seq: Mutex<i64>,
}

#[async_trait]
impl TagRepository for MemoryTags {
    async fn get_or_create(&self, name: &str) -> Result<Tag, AppError> {
        if let Some(tag) = self.find_by_name(name).await? {
            return Ok(tag);
        }
        let (id, _) = tick(&self.seq);
        let tag = Tag {
            id,
            name: name.to_string(),
        };
        self.tags.lock().unwrap().push(tag.clone());
        Ok(tag)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Tag>, AppError> {
        Ok(self.tags.lock().unwrap().iter().find(|t| t.name == name).cloned())
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Tag>, AppError> {
        let mut tags: Vec<Tag> = self
            .tags
            .lock()
            .unwrap()
            .iter()
            .filter(|t| ids.contains(&t.id))
            .cloned()
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn list_all(&self) -> Result<Vec<Tag>, AppError> {
        let mut tags = self.tags.lock().unwrap().clone();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }
}

#[derive(Default)]
pub struct MemoryTexts {
    texts: Mutex<Vec<Text>>,
    seq: Mutex<i64>,
}

impl MemoryTexts {
    fn filtered(&self, tag_id: Option<i64>) -> Vec<Text> {
        let mut texts: Vec<Text> = self
            .texts
            .lock()
            .unwrap()
            .iter()
            .filter(|t| tag_id.map_or(true, |id| t.tag_ids.contains(&id)))
            .cloned()
            .collect();
        texts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        texts
    }
}

#[async_trait]
impl TextRepository for MemoryTexts {
    async fn insert(&self, new_text: NewText) -> Result<Text, AppError> {
        let (id, now) = tick(&self.seq);
        let text = Text {
            id,
            title: new_text.title,
            body: new_text.body,
            created_by: new_text.created_by,
            created_at: now,
            tag_ids: new_text.tag_ids,
        };
        self.texts.lock().unwrap().push(text.clone());
        Ok(text)
    }

    async fn update(&self, id: i64, changes: TextChanges) -> Result<Option<Text>, AppError> {
        let mut texts = self.texts.lock().unwrap();
        Ok(texts.iter_mut().find(|t| t.id == id).map(|t| {
            t.title = changes.title;
            t.body = changes.body;
            t.tag_ids = changes.tag_ids;
            t.clone()
        }))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Text>, AppError> {
        Ok(self.texts.lock().unwrap().iter().find(|t| t.id == id).cloned())
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Text>, AppError> {
        Ok(self
            .texts
            .lock()
            .unwrap()
            .iter()
            .filter(|t| ids.contains(&t.id))
            .cloned()
            .collect())
    }

    async fn count(&self, tag_id: Option<i64>) -> Result<u64, AppError> {
        Ok(self.filtered(tag_id).len() as u64)
    }

    async fn list(
        &self,
        tag_id: Option<i64>,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Text>, AppError> {
        Ok(self
            .filtered(tag_id)
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect())
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let mut texts = self.texts.lock().unwrap();
        let before = texts.len();
        texts.retain(|t| t.id != id);
        Ok(texts.len() < before)
    }
}

#[derive(Default)]
pub struct MemoryImages {
    images: Mutex<Vec<Image>>,
    seq: Mutex<i64>,
}

impl MemoryImages {
    fn filtered(&self, tag_id: Option<i64>) -> Vec<Image> {
        let mut images: Vec<Image> = self
            .images
            .lock()
            .unwrap()
            .iter()
            .filter(|i| tag_id.map_or(true, |id| i.tag_ids.contains(&id)))
            .cloned()
            .collect();
        images.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then(b.id.cmp(&a.id)));
        images
    }
}

#[async_trait]
impl ImageRepository for MemoryImages {
    async fn insert(&self, new_image: NewImage) -> Result<Image, AppError> {
        let (id, now) = tick(&self.seq);
        let image = Image {
            id,
            file: new_image.file,
            description: new_image.description,
            uploaded_by: new_image.uploaded_by,
            uploaded_at: now,
            tag_ids: new_image.tag_ids,
        };
        self.images.lock().unwrap().push(image.clone());
        Ok(image)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Image>, AppError> {
        Ok(self.images.lock().unwrap().iter().find(|i| i.id == id).cloned())
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Image>, AppError> {
        Ok(self
            .images
            .lock()
            .unwrap()
            .iter()
            .filter(|i| ids.contains(&i.id))
            .cloned()
            .collect())
    }

    async fn count(&self, tag_id: Option<i64>) -> Result<u64, AppError> {
        Ok(self.filtered(tag_id).len() as u64)
    }

    async fn list(
        &self,
        tag_id: Option<i64>,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Image>, AppError> {
        Ok(self
            .filtered(tag_id)
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect())
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let mut images = self.images.lock().unwrap();
        let before = images.len();
        images.retain(|i| i.id != id);
        Ok(images.len() < before)
    }
}

#[derive(Default)]
pub struct MemoryComments {
    comments: Mutex<Vec<Comment>>,
    seq: Mutex<i64>,
}

#[async_trait]
impl CommentRepository for MemoryComments {
    async fn insert(&self, new_comment: NewComment) -> Result<Comment, AppError> {
        let (id, now) = tick(&self.seq);
        let comment = Comment {
            id,
            content_type: new_comment.target.content_type,
            object_id: new_comment.target.object_id,
            user_id: new_comment.user_id,
            comment: new_comment.comment,
            created_at: now,
        };
        self.comments.lock().unwrap().push(comment.clone());
        Ok(comment)
    }

    async fn list_for(&self, target: ContentRef) -> Result<Vec<Comment>, AppError> {
        Ok(self
            .comments
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.content_type == target.content_type && c.object_id == target.object_id)
            .cloned()
            .collect())
    }

    async fn delete_for(&self, target: ContentRef) -> Result<u64, AppError> {
        let mut comments = self.comments.lock().unwrap();
        let before = comments.len();
        comments
            .retain(|c| !(c.content_type == target.content_type && c.object_id == target.object_id));
        Ok((before - comments.len()) as u64)
    }
}

#[derive(Default)]
pub struct MemoryNodes {
    nodes: Mutex<Vec<Node>>,
    node_texts: Mutex<Vec<NodeText>>,
    node_images: Mutex<Vec<NodeImage>>,
    seq: Mutex<i64>,
}

impl MemoryNodes {
    pub fn len(&self) -> usize {
        self.nodes.lock().unwrap().len()
    }
}

#[async_trait]
impl NodeRepository for MemoryNodes {
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
        let (id, now) = tick(&self.seq);
        let node = Node {
            id,
            title: new_node.title,
            slug: new_node.slug,
            parent_id: new_node.parent_id,
            position: new_node.position,
            is_published: new_node.is_published,
            created_by: new_node.created_by,
            created_at: now,
        };
        self.nodes.lock().unwrap().push(node.clone());
        Ok(node)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Node>, AppError> {
        Ok(self.nodes.lock().unwrap().iter().find(|n| n.id == id).cloned())
    }

    async fn find_child(
        &self,
        parent_id: Option<i64>,
        slug: &str,
    ) -> Result<Option<Node>, AppError> {
        Ok(self
            .nodes
            .lock()
            .unwrap()
            .iter()
            .find(|n| n.parent_id == parent_id && n.slug == slug)
            .cloned())
    }

    async fn find_published_child(
        &self,
        parent_id: Option<i64>,
        slug: &str,
    ) -> Result<Option<Node>, AppError> {
        Ok(self
            .find_child(parent_id, slug)
            .await?
            .filter(|n| n.is_published))
    }

    async fn list_children(
        &self,
        parent_id: Option<i64>,
        published_only: bool,
    ) -> Result<Vec<Node>, AppError> {
        let mut children: Vec<Node> = self
            .nodes
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.parent_id == parent_id && (!published_only || n.is_published))
            .cloned()
            .collect();
        children.sort_by_key(|n| (n.position, n.id));
        Ok(children)
    }

    async fn attach_text(
        &self,
        node_id: i64,
        text_id: i64,
        position: i32,
    ) -> Result<NodeText, AppError> {
        let mut rows = self.node_texts.lock().unwrap();
        if let Some(row) = rows
            .iter_mut()
            .find(|r| r.node_id == node_id && r.text_id == text_id)
        {
            row.position = position;
            return Ok(row.clone());
        }
        let (id, _) = tick(&self.seq);
        let row = NodeText {
            id,
            node_id,
            text_id,
            position,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn attach_image(
        &self,
        node_id: i64,
        image_id: i64,
        position: i32,
    ) -> Result<NodeImage, AppError> {
        let mut rows = self.node_images.lock().unwrap();
        if let Some(row) = rows
            .iter_mut()
            .find(|r| r.node_id == node_id && r.image_id == image_id)
        {
            row.position = position;
            return Ok(row.clone());
        }
        let (id, _) = tick(&self.seq);
        let row = NodeImage {
            id,
            node_id,
            image_id,
            position,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn list_texts(&self, node_id: i64) -> Result<Vec<NodeText>, AppError> {
        let mut rows: Vec<NodeText> = self
            .node_texts
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.node_id == node_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.position, r.id));
        Ok(rows)
    }

    async fn list_images(&self, node_id: i64) -> Result<Vec<NodeImage>, AppError> {
        let mut rows: Vec<NodeImage> = self
            .node_images
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.node_id == node_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.position, r.id));
        Ok(rows)
    }

    async fn detach_content(&self, target: ContentRef) -> Result<u64, AppError> {
        match target.content_type {
            ContentType::Text => {
                let mut rows = self.node_texts.lock().unwrap();
                let before = rows.len();
                rows.retain(|r| r.text_id != target.object_id);
                Ok((before - rows.len()) as u64)
            }
            ContentType::Image => {
                let mut rows = self.node_images.lock().unwrap();
                let before = rows.len();
                rows.retain(|r| r.image_id != target.object_id);
                Ok((before - rows.len()) as u64)
            }
        }
    }

    async fn delete_subtree(&self, node_id: i64) -> Result<u64, AppError> {
        let mut nodes = self.nodes.lock().unwrap();
        if !nodes.iter().any(|n| n.id == node_id) {
            return Ok(0);
        }
        let mut doomed = vec![node_id];
        let mut i = 0;
        while i < doomed.len() {
            let parent = doomed[i];
            doomed.extend(
                nodes
                    .iter()
                    .filter(|n| n.parent_id == Some(parent))
                    .map(|n| n.id),
            );
            i += 1;
        }
        nodes.retain(|n| !doomed.contains(&n.id));
        self.node_texts
            .lock()
            .unwrap()
            .retain(|r| !doomed.contains(&r.node_id));
        self.node_images
            .lock()
            .unwrap()
            .retain(|r| !doomed.contains(&r.node_id));
        Ok(doomed.len() as u64)
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl StorageClient for MemoryStorage {
    async fn put_object(&self, key: &str, content: Vec<u8>) -> Result<(), AppError> {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), content);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        Ok(self.objects.lock().unwrap().get(key).cloned())
    }
}

/// Concrete handles to every in-memory repository plus an `AppState` view
/// over them.
pub struct TestRepos {
    pub users: Arc<MemoryUsers>,
    pub tags: Arc<MemoryTags>,
    pub texts: Arc<MemoryTexts>,
    pub images: Arc<MemoryImages>,
    pub comments: Arc<MemoryComments>,
    pub nodes: Arc<MemoryNodes>,
    pub storage: Arc<MemoryStorage>,
}

pub const TEST_TOKEN: &str = "test-token";

impl TestRepos {
    pub fn new() -> Self {
        Self {
            users: Arc::default(),
            tags: Arc::default(),
            texts: Arc::default(),
            images: Arc::default(),
            comments: Arc::default(),
            nodes: Arc::default(),
            storage: Arc::default(),
        }
    }

    pub fn state(&self) -> AppState {
        AppState {
            users: self.users.clone(),
            tags: self.tags.clone(),
            texts: self.texts.clone(),
            images: self.images.clone(),
            comments: self.comments.clone(),
            nodes: self.nodes.clone(),
            storage: self.storage.clone(),
            service_token: TEST_TOKEN.to_string(),
        }
    }

    pub async fn user(&self, username: &str) -> User {
        self.users
            .create(NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                is_staff: false,
            })
            .await
            .unwrap()
    }

    pub async fn node(&self, parent: Option<&Node>, slug: &str, published: bool) -> Node {
        self.nodes
            .insert(NewNode {
                title: slug.to_uppercase(),
                slug: slug.to_string(),
                parent_id: parent.map(|p| p.id),
                position: 0,
                is_published: published,
                created_by: 1,
            })
            .await
            .unwrap()
    }
}
