use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quickpoll::{
    api,
    auth::AdminAuthConfig,
    config::ServerConfig,
    persist, ratelimit,
    state::AppState,
    store::MemoryStore,
};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quickpoll=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting quickpoll...");

    let server_config = ServerConfig::from_env();

    // Admin credentials gate state export/import
    let admin_config = Arc::new(AdminAuthConfig::from_env());

    // Cookie, owner header and vote rate limit config all come from env
    let state = Arc::new(AppState::from_env(Arc::new(MemoryStore::new())));

    // Restore the last snapshot before accepting requests, then keep it fresh
    let snapshot_writer = match server_config.snapshot_path {
        Some(ref path) => {
            if let Err(e) = persist::restore_from_file(&state, path).await {
                tracing::error!("Failed to restore snapshot from {}: {}", path.display(), e);
                std::process::exit(1);
            }
            Some(persist::spawn_snapshot_writer(
                state.clone(),
                path.clone(),
                server_config.snapshot_interval,
            ))
        }
        None => {
            tracing::warn!("SNAPSHOT_PATH not set - polls are lost on restart");
            None
        }
    };

    // Spawn background task for dropping stale rate limiter entries
    if let Some(ref limiter) = state.vote_limiter {
        ratelimit::spawn_limiter_cleanup(limiter.clone());
    }

    let app = api::router(state.clone(), admin_config);

    let listener = match tokio::net::TcpListener::bind(server_config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", server_config.bind_addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!("Listening on http://{}", server_config.bind_addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
    }

    // The writer task owns the snapshot file and does the final write itself
    if let Some(writer) = snapshot_writer {
        writer.shutdown().await;
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
