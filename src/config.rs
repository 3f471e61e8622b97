use std::path::Path;

use serde::Deserialize;

use crate::error::AppError;

/// Prefix of environment variables overriding configuration keys.
pub const ENV_PREFIX: &str = "FOLIO";

/// Runtime configuration.
///
/// Resolved from, in increasing priority: built-in defaults, an optional TOML
/// file, then `FOLIO_*` environment variables (e.g. `FOLIO_MONGODB_URI`).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    pub mongodb_uri: String,
    pub mongodb_database: String,
    pub s3_bucket: String,
    /// Custom S3 endpoint for MinIO / LocalStack.
    #[serde(default)]
    pub s3_endpoint: Option<String>,
    pub s3_region: String,
    /// Shared secret required by the write API (`x-service-token` header).
    pub service_token: String,
}

impl AppConfig {
    /// Load the configuration, reading `file` if it exists.
    pub fn load(file: Option<&Path>) -> Result<Self, AppError> {
        let mut builder = config::Config::builder()
            .set_default("bind_addr", "127.0.0.1:3000")
            .and_then(|b| b.set_default("mongodb_uri", "mongodb://localhost:27017"))
            .and_then(|b| b.set_default("mongodb_database", "folio"))
            .and_then(|b| b.set_default("s3_bucket", "folio-media"))
            .and_then(|b| b.set_default("s3_region", "us-east-1"))
            .and_then(|b| b.set_default("service_token", "dev-token"))
            .map_err(|e| AppError::Internal(format!("Invalid configuration default: {e}")))?;

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .and_then(|c| c.try_deserialize::<AppConfig>())
            .map_err(|e| AppError::Internal(format!("Failed to load configuration: {e}")))
    }
}
