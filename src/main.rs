use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use folio::api::users::{process_create_user, CreateUserRequest};
use folio::app::AppState;
use folio::config::AppConfig;
use folio::storage::client::{S3StorageClient, StorageClient};

#[derive(Debug, Parser)]
#[command(name = "folio", version, about = "Tree-organized texts and images")]
struct Cli {
    /// TOML configuration file; missing files are ignored.
    #[arg(long, short, default_value = "folio.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Insert demo content; safe to run repeatedly.
    Seed,
    /// Create a user from the command line.
    CreateUser {
        username: String,
        #[arg(long, default_value = "")]
        email: String,
        /// reader, author, editor or admin
        #[arg(long)]
        role: Option<String>,
        #[arg(long)]
        staff: bool,
    },
}

async fn build_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let mongo_client = mongodb::Client::with_uri_str(&config.mongodb_uri)
        .await
        .context("Failed to connect to MongoDB")?;
    let mongo_db = mongo_client.database(&config.mongodb_database);
    folio::db::ensure_indexes(&mongo_db).await?;
    tracing::info!("Connected to MongoDB at {}", config.mongodb_uri);

    let storage: Arc<dyn StorageClient> = Arc::new(S3StorageClient::from_config(config).await);
    tracing::info!(bucket = %config.s3_bucket, "S3 storage client initialized");

    Ok(AppState::from_mongo(
        &mongo_db,
        storage,
        config.service_token.clone(),
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(Some(&cli.config))?;
    let state = build_state(&config).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let app = folio::app::router(state);
            tracing::info!("Listening on http://{}", config.bind_addr);
            let listener = tokio::net::TcpListener::bind(&config.bind_addr)
                .await
                .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
            axum::serve(listener, app.into_make_service()).await?;
        }
        Command::Seed => {
            folio::demo_seeder::seed_demo_data(&state).await?;
        }
        Command::CreateUser {
            username,
            email,
            role,
            staff,
        } => {
            let user = process_create_user(
                state.users.as_ref(),
                CreateUserRequest {
                    username,
                    email,
                    is_staff: staff,
                    role,
                },
            )
            .await?;
            println!("Created user {} ({}) with id {}", user.username, user.role, user.id);
        }
    }

    Ok(())
}
