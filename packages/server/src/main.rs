use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use review_server::config::AppConfig;
use review_server::state::AppState;
use review_server::{build_router, database, fixtures, mailer, seed};

#[derive(Parser, Debug)]
#[command(author, version, about = "Reviews and ratings API server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Create an admin account, or promote an existing one.
    CreateAdmin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
    },
    /// Import CSV fixtures (users.csv, category.csv, genre.csv, titles.csv,
    /// genre_title.csv, review.csv, comments.csv).
    LoadData {
        #[arg(long, default_value = "static/data")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = database::init_db(&config.database.url)
        .await
        .context("Failed to connect to database")?;
    info!("Database connected and schema synced");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            seed::ensure_indexes(&db).await?;
            serve(AppState {
                db,
                mailer: mailer::from_config(&config.mail),
                config,
            })
            .await?;
        }
        Command::CreateAdmin { username, email } => {
            let admin = seed::ensure_admin(&db, &username, &email)
                .await
                .context("Failed to create admin")?;
            info!(
                username = %admin.username,
                "Admin ready; obtain a token through /api/v1/auth/signup and /api/v1/auth/token"
            );
        }
        Command::LoadData { dir } => {
            let report = fixtures::load_dir(&db, &dir)
                .await
                .with_context(|| format!("Failed to load fixtures from {}", dir.display()))?;
            info!(?report, "Import finished");
        }
    }

    Ok(())
}

async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", state.config.server.host, state.config.server.port)
        .parse()
        .context("Invalid server host/port")?;

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server running at http://{}", addr);
    info!("API docs at http://{}/swagger-ui and http://{}/scalar", addr, addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
