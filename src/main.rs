use std::fs;
use std::sync::Arc;

use anyhow::bail;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use docvault::config::ServerConfig;
use docvault::files::FileStorage;
use docvault::server::{AppState, create_router};
use docvault::store::{SqliteStore, Store};

#[derive(Parser)]
#[command(name = "docvault")]
#[command(about = "A multi-tenant document storage server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, default_value = "8080")]
        port: u16,

        /// Data directory for database and uploaded files
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Secret used to sign session tokens
        #[arg(long, env = "JWT_SECRET")]
        jwt_secret: String,

        /// Session token lifetime in hours
        #[arg(long, default_value = "24")]
        jwt_ttl_hours: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("docvault=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            data_dir,
            jwt_secret,
            jwt_ttl_hours,
        } => {
            if jwt_secret.len() < 32 {
                bail!("JWT secret must be at least 32 bytes");
            }

            let config = ServerConfig {
                host,
                port,
                data_dir: data_dir.into(),
                jwt_secret,
                jwt_ttl_hours,
            };

            fs::create_dir_all(&config.data_dir)?;

            let store = SqliteStore::new(config.db_path())?;
            store.initialize()?;

            let purged = store.delete_expired_links(Utc::now())?;
            if purged > 0 {
                info!("Purged {} expired download links", purged);
            }

            let state = Arc::new(AppState {
                store: Arc::new(store),
                files: FileStorage::new(&config.data_dir),
                jwt_secret: config.jwt_secret.clone(),
                jwt_ttl_hours: config.jwt_ttl_hours,
            });

            let app = create_router(state);
            let addr = config.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
