use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use feedback_service::{
    RetryableOperation, build_router,
    config::{AppConfig, DatabaseBackend},
    repository::{FeedbackRepository, InMemoryFeedbackRepository, PgFeedbackRepository},
    state::AppState,
};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "feedback_service")]
#[command(about = "Collects UI and service-quality feedback over HTTP")]
struct Cli {
    /// Overrides APP_HOST
    #[arg(long)]
    host: Option<String>,
    /// Overrides APP_PORT
    #[arg(long)]
    port: Option<u16>,
    /// Overrides DATABASE_BACKEND (memory or postgres)
    #[arg(long)]
    backend: Option<DatabaseBackend>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("failed to load application configuration")?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(backend) = cli.backend {
        config.database_backend = backend;
    }

    let repository: Arc<dyn FeedbackRepository> = match config.database_backend {
        DatabaseBackend::Postgres => {
            info!("database backend: postgres");
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect_lazy(&config.database_url)
                .context("invalid DATABASE_URL")?;
            Arc::new(PgFeedbackRepository::new(pool))
        }
        DatabaseBackend::Memory => {
            info!("database backend: in-memory");
            Arc::new(InMemoryFeedbackRepository::new())
        }
    };

    let retry = RetryableOperation::new(config.retry.clone());
    info!(
        max_attempts = retry.policy().max_attempts,
        base_delay_ms = retry.policy().base_delay_ms,
        "store retry policy"
    );

    retry
        .run(|| repository.init())
        .await
        .context("failed to initialize feedback schema")?;

    let app = build_router(AppState::new(repository, retry));

    let addr = config.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(address = %addr, "feedback service started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("feedback_service=debug,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install Ctrl+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install SIGTERM handler");
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

    info!("shutdown signal received");
}
