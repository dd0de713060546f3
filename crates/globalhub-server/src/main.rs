//! Global Hub Server: Application entry point.
//!
//! Connects to SurrealDB, applies pending migrations and serves the
//! resource API until SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use globalhub_api::{ApiConfig, ResourceService, WatchConfig};
use globalhub_db::{DbConfig, DbManager, RetryPolicy};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "globalhub-server", version, about = "Global Hub resource API")]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "GLOBALHUB_LISTEN", default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// Prefix of every resource route
    #[arg(long, env = "GLOBALHUB_BASE_PATH", default_value = "/global-hub-api/v1")]
    base_path: String,

    /// SurrealDB WebSocket endpoint
    #[arg(long, env = "GLOBALHUB_DB_URL", default_value = "127.0.0.1:8000")]
    db_url: String,

    #[arg(long, env = "GLOBALHUB_DB_NAMESPACE", default_value = "globalhub")]
    db_namespace: String,

    #[arg(long, env = "GLOBALHUB_DB_DATABASE", default_value = "hub")]
    db_database: String,

    #[arg(long, env = "GLOBALHUB_DB_USER", default_value = "root")]
    db_user: String,

    #[arg(long, env = "GLOBALHUB_DB_PASSWORD", default_value = "root", hide_env_values = true)]
    db_password: String,

    /// Attempts per store read, first try included
    #[arg(long, env = "GLOBALHUB_DB_READ_ATTEMPTS", default_value_t = 3)]
    db_read_attempts: u32,

    /// Delay before the first read retry, in milliseconds
    #[arg(long, env = "GLOBALHUB_DB_READ_BACKOFF_MS", default_value_t = 100)]
    db_read_backoff_ms: u64,

    /// Seconds between two snapshots of a watch stream
    #[arg(long, env = "GLOBALHUB_WATCH_POLL_SECS", default_value_t = 2)]
    watch_poll_secs: u64,

    /// Seconds after which a watch stream is closed
    #[arg(long, env = "GLOBALHUB_WATCH_IDLE_SECS", default_value_t = 600)]
    watch_idle_secs: u64,
}

impl Cli {
    fn db_config(&self) -> DbConfig {
        let retry = RetryPolicy::default()
            .with_attempts(self.db_read_attempts)
            .with_backoff(Duration::from_millis(self.db_read_backoff_ms));
        DbConfig {
            namespace: self.db_namespace.clone(),
            database: self.db_database.clone(),
            ..DbConfig::default()
        }
        .with_url(&self.db_url)
        .with_credentials(&self.db_user, &self.db_password)
        .with_retry(retry)
    }

    fn api_config(&self) -> ApiConfig {
        let watch = WatchConfig::default()
            .with_poll_interval(Duration::from_secs(self.watch_poll_secs.max(1)))
            .with_idle_timeout(Duration::from_secs(self.watch_idle_secs));
        ApiConfig::default()
            .with_base_path(&self.base_path)
            .with_watch(watch)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("globalhub=info".parse()?))
        .json()
        .init();

    let cli = Cli::parse();
    info!(version = env!("CARGO_PKG_VERSION"), "Starting Global Hub server...");

    let db = DbManager::connect(&cli.db_config())
        .await
        .context("connecting to SurrealDB")?;
    globalhub_db::run_migrations(db.client())
        .await
        .context("applying schema migrations")?;

    let shutdown = CancellationToken::new();
    let service = Arc::new(ResourceService::new(db.repositories()));
    let config = cli.api_config();
    let app = globalhub_api::router(service, &config, shutdown.clone());

    let listener = TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("binding {}", cli.listen))?;
    info!(addr = %cli.listen, base_path = %config.base_path, "Resource API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("serving resource API")?;

    info!("Global Hub server stopped.");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM and cancels `token`, which ends every
/// open watch stream so that graceful shutdown can complete.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown signal received");
    token.cancel();
}
