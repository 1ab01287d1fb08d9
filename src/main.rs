use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use nexus::api::{AppState, app_router};
use nexus::catalog::Catalog;
use nexus::config::NexusConfig;
use nexus::identity::LocalIdentityProvider;
use nexus::session::{ControllerSettings, FileRoleStaging};
use nexus::store::{LibSqlProfileStore, ProfileStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = NexusConfig::from_env().context("invalid NEXUS_* configuration")?;

    // Initialize tracing; the guard flushes the file writer on exit
    let _log_guard = init_tracing(&config);

    eprintln!("Nexus v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   HTTP: http://0.0.0.0:{}", config.http_port);
    eprintln!("   Session WS: ws://0.0.0.0:{}/ws", config.http_port);
    eprintln!("   OAuth: {} -> {}", config.oauth_provider, config.public_origin);

    // ── Database ─────────────────────────────────────────────────────────
    let store: Arc<dyn ProfileStore> = Arc::new(
        LibSqlProfileStore::new_local(&config.db_path)
            .await
            .with_context(|| format!("failed to open database at {}", config.db_path.display()))?,
    );
    eprintln!("   Database: {}", config.db_path.display());

    // ── Session ──────────────────────────────────────────────────────────
    let staging = Arc::new(FileRoleStaging::new(&config.staging_path));
    eprintln!("   Role staging: {}", config.staging_path.display());

    let identity = Arc::new(LocalIdentityProvider::new());
    let state = AppState::build(
        identity,
        store,
        staging,
        ControllerSettings::from(&config),
        Catalog::demo(),
    );
    let controller = Arc::clone(&state.controller);

    // ── HTTP / WS ────────────────────────────────────────────────────────
    let app = app_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port))
        .await
        .with_context(|| format!("failed to bind port {}", config.http_port))?;
    tracing::info!(port = config.http_port, "HTTP server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
        })
        .await
        .context("HTTP server failed")?;

    controller.shutdown();
    Ok(())
}

fn init_tracing(config: &NexusConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "nexus.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(file)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            None
        }
    }
}
