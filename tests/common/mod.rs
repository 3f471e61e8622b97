#![allow(dead_code)]

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::minio::MinIO;
use testcontainers_modules::mongo::Mongo;

use folio::app::AppState;
use folio::storage::client::{S3StorageClient, StorageClient};

pub const TOKEN: &str = "test-token";

/// Holds running containers and provides the Axum router for integration tests.
///
/// Containers are kept alive for as long as this struct lives. When dropped,
/// containers are stopped and cleaned up automatically.
pub struct TestEnv {
    _mongo: ContainerAsync<Mongo>,
    _minio: ContainerAsync<MinIO>,
    pub router: Router,
    pub state: AppState,
    pub storage: Arc<dyn StorageClient>,
}

impl TestEnv {
    /// Spin up MongoDB and MinIO and build the real router on top of them.
    pub async fn start() -> Self {
        let (mongo_container, minio_container) =
            tokio::join!(Mongo::default().start(), MinIO::default().start());
        let mongo_container = mongo_container.expect("Failed to start MongoDB container");
        let minio_container = minio_container.expect("Failed to start MinIO container");

        // --- MongoDB ---
        let mongo_port = mongo_container
            .get_host_port_ipv4(27017)
            .await
            .expect("Failed to get MongoDB port");
        let mongo_uri = format!("mongodb://127.0.0.1:{}", mongo_port);
        let mongo_client = mongodb::Client::with_uri_str(&mongo_uri)
            .await
            .expect("Failed to connect to MongoDB");
        let mongo_db = mongo_client.database("folio_test");
        folio::db::ensure_indexes(&mongo_db)
            .await
            .expect("Failed to create indexes");

        // --- MinIO (S3) ---
        let minio_port = minio_container
            .get_host_port_ipv4(9000)
            .await
            .expect("Failed to get MinIO port");
        let minio_endpoint = format!("http://127.0.0.1:{}", minio_port);

        unsafe {
            std::env::set_var("AWS_ACCESS_KEY_ID", "minioadmin");
            std::env::set_var("AWS_SECRET_ACCESS_KEY", "minioadmin");
        }

        let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .endpoint_url(&minio_endpoint)
            .region(aws_config::Region::new("us-east-1"))
            .load()
            .await;
        let s3_client = aws_sdk_s3::Client::from_conf(
            aws_sdk_s3::config::Builder::from(&s3_config)
                .force_path_style(true)
                .build(),
        );

        let bucket_name = "folio-test";
        let _ = s3_client.create_bucket().bucket(bucket_name).send().await;

        let storage: Arc<dyn StorageClient> =
            Arc::new(S3StorageClient::new(s3_client, bucket_name.to_string()));

        let state = AppState::from_mongo(&mongo_db, storage.clone(), TOKEN.to_string());
        let router = folio::app::router(state.clone());

        Self {
            _mongo: mongo_container,
            _minio: minio_container,
            router,
            state,
            storage,
        }
    }

    /// Build an `axum_test::TestServer` from this environment's router.
    pub fn server(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .expect_success_by_default()
            .build(self.router.clone())
            .expect("Failed to build TestServer")
    }

    /// Build a `TestServer` that does NOT expect success by default (for error tests).
    pub fn server_permissive(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .build(self.router.clone())
            .expect("Failed to build TestServer")
    }
}

pub fn token_header() -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-service-token"),
        HeaderValue::from_static(TOKEN),
    )
}

/// Helper: create a user via the API and return its id.
pub async fn create_user(server: &axum_test::TestServer, username: &str) -> i64 {
    let (name, value) = token_header();
    let response = server
        .post("/api/v1/users")
        .add_header(name, value)
        .json(&serde_json::json!({
            "username": username,
            "email": format!("{username}@example.com"),
        }))
        .await;
    response.json::<serde_json::Value>()["id"]
        .as_i64()
        .expect("User response should contain id")
}

/// Helper: create a text via the API.
pub async fn create_text(
    server: &axum_test::TestServer,
    author: i64,
    title: &str,
    body: &str,
    tags: &[&str],
) -> axum_test::TestResponse {
    let (name, value) = token_header();
    server
        .post("/api/v1/texts")
        .add_header(name, value)
        .json(&serde_json::json!({
            "title": title,
            "body": body,
            "created_by": author,
            "tags": tags,
        }))
        .await
}

/// Helper: create a node via the API and return its id.
pub async fn create_node(
    server: &axum_test::TestServer,
    author: i64,
    slug: &str,
    parent_id: Option<i64>,
    is_published: bool,
) -> i64 {
    let (name, value) = token_header();
    let response = server
        .post("/api/v1/nodes")
        .add_header(name, value)
        .json(&serde_json::json!({
            "title": slug.to_uppercase(),
            "slug": slug,
            "parent_id": parent_id,
            "is_published": is_published,
            "created_by": author,
        }))
        .await;
    response.json::<serde_json::Value>()["node"]["id"]
        .as_i64()
        .expect("Node response should contain id")
}

/// A minimal 1x1 PNG.
pub fn png_bytes() -> Vec<u8> {
    vec![
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90,
        0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, 0x08, 0xD7, 0x63, 0xF8,
        0xCF, 0xC0, 0x00, 0x00, 0x00, 0x02, 0x00, 0x01, 0xE2, 0x21, 0xBC, 0x33, 0x00, 0x00, 0x00,
        0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ]
}
