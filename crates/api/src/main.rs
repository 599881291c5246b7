//! Huntroom API server

use anyhow::Context;
use huntroom_api::{
    config::LogFormat,
    routes::create_router,
    storage::{ChatStore, MemoryChatStore, PgChatStore},
    websocket::spawn_alarm_sweeper,
    AppState, Config,
};
use huntroom_shared::{Clock, SystemClock};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(config.log_format);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Huntroom API");

    let store: Arc<dyn ChatStore> = match &config.database_url {
        Some(url) => {
            let pool = huntroom_shared::create_pool(url, config.database_max_connections)
                .await
                .context("Failed to connect to database")?;
            huntroom_shared::run_migrations(&pool)
                .await
                .context("Failed to run migrations")?;
            tracing::info!("Chat log stored in Postgres");
            Arc::new(PgChatStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, chat logs are kept in memory and lost on restart");
            Arc::new(MemoryChatStore::new())
        }
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let bind_address = config.bind_address.clone();
    let poll_interval = config.alarm_poll_interval;
    let state = AppState::new(config, store, clock);

    let sweeper = spawn_alarm_sweeper(state.rooms.clone(), poll_interval);
    let app = create_router(state);

    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;
    tracing::info!(address = %bind_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweeper.abort();
    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("huntroom_api=info,tower_http=info"));

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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

    tracing::info!("Shutdown signal received");
}
