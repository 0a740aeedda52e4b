use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use guardpost::config::Config;
use guardpost::AppState;

#[derive(Parser, Debug)]
#[command(name = "guardpost")]
#[command(author, version, about = "Workforce management backend for security-guard operations", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "guardpost.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the API server (default)
    Serve,
    /// Apply pending database migrations, then exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Ensure data directory exists
    std::fs::create_dir_all(&config.server.data_dir)?;

    let db = guardpost::db::init(&config.server.data_dir, &config.database).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => {
            guardpost::db::migrate(&db).await?;
            return Ok(());
        }
        Command::Serve => {}
    }

    tracing::info!("Starting Guardpost v{}", env!("CARGO_PKG_VERSION"));

    // Schema migration is an operator step, not a startup side effect
    guardpost::db::ensure_migrated(&db).await?;

    // Ensure the bootstrap admin account exists
    guardpost::api::auth::ensure_admin_user(
        &db,
        &config.auth.admin_email,
        config.auth.admin_password.as_deref(),
    )
    .await?;

    let state = Arc::new(AppState::new(config.clone(), db));
    let app = guardpost::api::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("API server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping server");
}
