use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use portfolio_api::auth::{generate_jwt, Claims};
use portfolio_api::config::{self, AppConfig};
use portfolio_api::database::{PostgrestClient, QueryClient};
use portfolio_api::storage::{ObjectStorage, StorageClient};
use portfolio_api::testing::{MemoryQueryClient, MemoryStorage};
use portfolio_api::{router, AppState};

#[derive(Parser)]
#[command(name = "portfolio-api")]
#[command(about = "REST backend for portfolio, geography and achievement records")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Override the configured port")]
        port: Option<u16>,

        #[arg(long, help = "Use in-process data and file stores instead of the configured backend")]
        in_memory: bool,
    },

    #[command(about = "Issue a bearer token signed with JWT_SECRET")]
    Token {
        #[arg(long, default_value = "admin")]
        subject: String,

        #[arg(long, default_value = "editor")]
        role: String,

        #[arg(long, help = "Lifetime in hours (defaults to the configured expiry)")]
        hours: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up BACKEND_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = config::config().clone();

    match cli.command.unwrap_or(Command::Serve { port: None, in_memory: false }) {
        Command::Serve { port, in_memory } => serve(config, port, in_memory).await,
        Command::Token { subject, role, hours } => {
            let hours = hours.unwrap_or(config.security.jwt_expiry_hours);
            let token = generate_jwt(&Claims::new(subject, role, hours), &config.security.jwt_secret)?;
            println!("{}", token);
            Ok(())
        }
    }
}

async fn serve(mut config: AppConfig, port: Option<u16>, in_memory: bool) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    tracing::info!("Starting portfolio API in {:?} mode", config.environment);

    let (db, storage): (Arc<dyn QueryClient>, Arc<dyn StorageClient>) = if in_memory {
        tracing::warn!("Using in-memory stores; nothing will be persisted");
        (Arc::new(MemoryQueryClient::new()), Arc::new(MemoryStorage::new()))
    } else {
        let db = PostgrestClient::new(&config.backend).context("invalid backend configuration")?;
        let storage = ObjectStorage::new(&config.storage, config.backend.timeout_secs)
            .context("invalid storage configuration")?;
        (Arc::new(db), Arc::new(storage))
    };

    if !config.auth_enabled() {
        tracing::warn!("JWT_SECRET is not set; write routes are unauthenticated");
    }

    let bind_addr = config.bind_addr();
    let app = router(AppState::new(db, storage, config));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
