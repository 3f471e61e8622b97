use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::db::comment_repository::{CommentRepository, MongoCommentRepository};
use crate::db::image_repository::{ImageRepository, MongoImageRepository};
use crate::db::node_repository::{MongoNodeRepository, NodeRepository};
use crate::db::tag_repository::{MongoTagRepository, TagRepository};
use crate::db::text_repository::{MongoTextRepository, TextRepository};
use crate::db::user_repository::{MongoUserRepository, UserRepository};
use crate::storage::client::StorageClient;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub tags: Arc<dyn TagRepository>,
    pub texts: Arc<dyn TextRepository>,
    pub images: Arc<dyn ImageRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub nodes: Arc<dyn NodeRepository>,
    pub storage: Arc<dyn StorageClient>,
    /// Token expected in the `x-service-token` header of write requests.
    pub service_token: String,
}

impl AppState {
    /// Wire every repository to collections of `db`.
    pub fn from_mongo(
        db: &mongodb::Database,
        storage: Arc<dyn StorageClient>,
        service_token: String,
    ) -> Self {
        Self {
            users: Arc::new(MongoUserRepository::new(db)),
            tags: Arc::new(MongoTagRepository::new(db)),
            texts: Arc::new(MongoTextRepository::new(db)),
            images: Arc::new(MongoImageRepository::new(db)),
            comments: Arc::new(MongoCommentRepository::new(db)),
            nodes: Arc::new(MongoNodeRepository::new(db)),
            storage,
            service_token,
        }
    }
}

/// Public pages plus the token-guarded `/api/v1` write API.
pub fn router(state: AppState) -> Router {
    let pages = Router::new()
        .route("/", get(api::pages::index_handler))
        .route("/texts/", get(api::texts::text_list_handler))
        .route("/texts/{id}/", get(api::texts::text_detail_handler))
        .route("/images/", get(api::images::image_list_handler))
        .route("/images/{id}/", get(api::images::image_detail_handler))
        .route("/tree/", get(api::tree::root_nodes_handler))
        .route("/tree/{*path}", get(api::tree::node_page_handler))
        .route(
            "/media/images/{filename}",
            get(api::images::serve_media_handler),
        );

    let write_api = Router::new()
        .route("/api/v1/users", post(api::users::create_user_handler))
        .route("/api/v1/tags", get(api::tags::list_tags_handler))
        .route("/api/v1/texts", post(api::texts::create_text_handler))
        .route(
            "/api/v1/texts/{id}",
            delete(api::texts::delete_text_handler).put(api::texts::update_text_handler),
        )
        .route(
            "/api/v1/images",
            post(api::images::upload_image_handler)
                .layer(DefaultBodyLimit::max(api::images::MAX_UPLOAD_BYTES)),
        )
        .route(
            "/api/v1/images/{id}",
            delete(api::images::delete_image_handler),
        )
        .route(
            "/api/v1/comments",
            post(api::comments::create_comment_handler),
        )
        .route("/api/v1/nodes", post(api::tree::create_node_handler))
        .route(
            "/api/v1/nodes/{id}",
            delete(api::tree::delete_node_handler),
        )
        .route(
            "/api/v1/nodes/{id}/texts",
            post(api::tree::attach_text_handler),
        )
        .route(
            "/api/v1/nodes/{id}/images",
            post(api::tree::attach_image_handler),
        );

    pages
        .merge(write_api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
