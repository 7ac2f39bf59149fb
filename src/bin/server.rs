//! Dentro Sync Server
//!
//! Keeps one clinic snapshot per account so that every device of a clinic
//! can pull and push it.
//!
//! # Configuration
//!
//! Environment variables:
//! - `DENTRO_PORT`: Port to listen on (default: 8080)
//! - `DENTRO_SERVER_DB`: SQLite database path (default: ~/.local/share/dentro-server/server.db)
//! - `DENTRO_SERVER_CONFIG`: Path to config file (default: ~/.config/dentro-server/config.yaml)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use dentro::server::{self, ApiKeyStore, AppState, RowStore};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Server configuration
#[derive(Debug, Clone)]
struct Config {
    port: u16,
    db_path: PathBuf,
    config_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        let port = std::env::var("DENTRO_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let db_path = std::env::var("DENTRO_SERVER_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("dentro-server")
                    .join("server.db")
            });

        let config_path = std::env::var("DENTRO_SERVER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("dentro-server")
                    .join("config.yaml")
            });

        Self {
            port,
            db_path,
            config_path,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dentro_server=info,dentro=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(Config::from_env()).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Database: {}", config.db_path.display());
    tracing::info!("Config file: {}", config.config_path.display());

    let rows = RowStore::open(&config.db_path).await?;
    let api_keys = Arc::new(ApiKeyStore::load(&config.config_path));

    let app = server::router(AppState { api_keys, rows }).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
