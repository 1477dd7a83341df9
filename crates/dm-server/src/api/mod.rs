pub mod response;

use crate::config::Config;
use crate::features;
use crate::middleware;
use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use dm_common::types::TransferStatus;
use dm_engine::{RestConnector, TransferService};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tracing::{info, warn};

/// Shared state of every handler
#[derive(Clone)]
pub struct AppState {
    pub service: TransferService,
    /// Scroll page size for requests that leave `options.batchSize` out
    pub default_batch_size: usize,
}

impl AppState {
    pub fn new(service: TransferService, default_batch_size: usize) -> Self {
        Self {
            service,
            default_batch_size,
        }
    }

    /// State talking to real clusters over REST
    pub fn from_config(config: &Config) -> Self {
        let service = TransferService::new(
            Arc::new(RestConnector),
            config.transfer.engine_settings(),
        );
        Self::new(service, config.transfer.default_batch_size)
    }
}

/// Bind, serve and shut down gracefully on Ctrl-C or SIGTERM
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let state = AppState::from_config(&config);
    let service = state.service.clone();
    let app = create_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    drain_transfers(&service, Duration::from_secs(config.server.shutdown_timeout_secs)).await;

    info!("Server shut down gracefully");
    Ok(())
}

/// Cancel running transfers and give them `timeout` to release their cursors
async fn drain_transfers(service: &TransferService, timeout: Duration) {
    let running: Vec<String> = service
        .list()
        .into_iter()
        .filter(|op| op.status == TransferStatus::Running)
        .map(|op| op.operation_id)
        .collect();

    if running.is_empty() {
        return;
    }

    info!(count = running.len(), "Cancelling running transfers");
    for id in &running {
        service.cancel(id);
    }

    let finished = tokio::time::timeout(timeout, async {
        for id in &running {
            service.wait(id).await;
        }
    })
    .await;

    if finished.is_err() {
        warn!(
            timeout_secs = timeout.as_secs(),
            "Transfers still running at shutdown timeout"
        );
    }
}

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState, config: &Config) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/v1", features::router(state))
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Data Manager Server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now(),
        })),
    )
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
