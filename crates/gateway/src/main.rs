//! keygate gateway binary.

use std::sync::Arc;

use anyhow::Context;
use keygate_gateway::{AppState, Config, router};
use keygate_storage::FileBackend;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keygate=info,keygate_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("failed to load configuration")?;
    tracing::info!(?config, "Starting keygate");

    let backend = FileBackend::open(&config.store_root)
        .await
        .with_context(|| format!("failed to open store at {}", config.store_root.display()))?;
    let state = AppState::bootstrap(&config, Arc::new(backend))
        .await
        .context("failed to initialise gateway state")?;

    let shutdown = CancellationToken::new();
    let sweeper = config.sweep_interval.map(|interval| {
        tracing::info!(interval = ?interval, "Starting expired-challenge sweeper");
        Arc::clone(&state.challenges).spawn_sweeper(interval, shutdown.child_token())
    });

    let listener = TcpListener::bind(config.listen_address)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_address))?;
    tracing::info!(address = %config.listen_address, "Listening");

    axum::serve(listener, router(state)).with_graceful_shutdown(shutdown_signal()).await?;

    shutdown.cancel();
    if let Some(sweeper) = sweeper {
        if let Err(e) = sweeper.await {
            tracing::warn!(error = %e, "Sweeper task failed");
        }
    }
    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
