//! Arbor HTTP Server
//!
//! REST API over the ordering engine. Every endpoint maps to exactly one
//! `NodeService` operation; all structural rules live in `arbor-core`.
//!
//! # Usage
//!
//! ```bash
//! ARBOR_TREE_SHAPE=binary cargo run -p arbor-server
//! ```
//!
//! # Security
//!
//! - CORS restricted to local web clients (`CORS_ALLOW_ORIGIN` overrides)
//! - No authentication

use anyhow::Context;
use arbor_core::NodeService;
use axum::{
    http::{header::HeaderValue, Method},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
mod http_error;
mod node_endpoints;

pub use config::ServerConfig;
pub use http_error::HttpError;

/// Application state shared across all endpoints
#[derive(Clone)]
pub struct AppState {
    pub node_service: Arc<NodeService>,
}

impl AppState {
    pub fn new(node_service: NodeService) -> Self {
        Self {
            node_service: Arc::new(node_service),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(node_endpoints::routes(state))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

/// Allow the common local dev-server origins, or `CORS_ALLOW_ORIGIN` if set
fn cors_layer() -> CorsLayer {
    let default_origins = [
        "http://localhost:3000", // Next.js default
        "http://localhost:5173", // Vite default
    ];

    let origins: Vec<HeaderValue> = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(custom_origin) => match custom_origin.parse::<HeaderValue>() {
            Ok(origin) => vec![origin],
            Err(_) => {
                tracing::warn!(
                    "Ignoring invalid CORS_ALLOW_ORIGIN '{}', using defaults",
                    custom_origin
                );
                default_origins.into_iter().map(HeaderValue::from_static).collect()
            }
        },
        Err(_) => default_origins.into_iter().map(HeaderValue::from_static).collect(),
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers(Any)
        .allow_credentials(false)
}

/// Open the database, then serve until Ctrl-C
///
/// # Errors
///
/// Returns error if the database cannot be opened or the server fails to bind.
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    let node_service = NodeService::open(config.database_path.clone(), config.tree.clone())
        .await
        .with_context(|| {
            format!(
                "Failed to open database at {}",
                config.database_path.display()
            )
        })?;
    let app = create_router(AppState::new(node_service));

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
