pub mod response;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::time::Duration;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tracing::info;

use crate::config::{Config, CorsConfig};
use crate::error::AppError;
use crate::features::{self, FeatureState};
use crate::ingest::IngestionPipeline;
use crate::middleware;

/// Build the application router with all routes and middleware
pub fn create_router(state: FeatureState, cors: &CorsConfig) -> Router {
    let health_routes = Router::new()
        .route("/health", get(health_check))
        .with_state(state.pipeline.clone());

    Router::new()
        .merge(health_routes)
        .nest("/api/v1", features::router(state))
        // Apply layers from innermost to outermost
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(cors))
}

/// Serve until Ctrl+C or SIGTERM, then cancel in-flight runs and drain
pub async fn serve(config: &Config, pipeline: IngestionPipeline) -> anyhow::Result<()> {
    let state = FeatureState {
        pipeline: pipeline.clone(),
    };
    let app = create_router(state, &config.cors);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    let timeout_secs = config.server.shutdown_timeout_secs;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            pipeline.shutdown();
            info!("Waiting up to {} seconds for connections to close", timeout_secs);
            tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
        })
        .await?;

    info!("Server shut down gracefully");
    Ok(())
}

/// Health check handler
async fn health_check(State(pipeline): State<IngestionPipeline>) -> Result<Response, AppError> {
    if let Err(e) = pipeline.ping().await {
        tracing::error!("Database health check failed: {:?}", e);
        return Err(AppError::Unavailable("database unreachable".to_string()));
    }

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "database": "connected",
            "last_run_id": pipeline.run_counter().current(),
        })),
    )
        .into_response())
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
