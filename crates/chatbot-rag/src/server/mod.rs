//! HTTP server for the RAG service

pub mod routes;
pub mod state;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::config::{RagConfig, ServerConfig};
use crate::error::{Error, Result};
use crate::service::{ProviderHealth, RagService, ServiceStatus};
use state::AppState;

/// RAG HTTP Server
pub struct RagServer {
    config: RagConfig,
    state: AppState,
}

impl RagServer {
    /// Create a server with the providers named in the configuration
    pub fn new(config: RagConfig) -> Result<Self> {
        let service = Arc::new(RagService::from_config(config.clone())?);
        Ok(Self::with_service(config, service))
    }

    /// Create a server around an existing service
    pub fn with_service(config: RagConfig, service: Arc<RagService>) -> Self {
        Self {
            config,
            state: AppState::new(service),
        }
    }

    /// Load or build the document database before serving
    pub async fn bootstrap(&self) -> ServiceStatus {
        self.state.service().bootstrap().await
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        build_router(self.state.clone(), &self.config.server)
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = self.router();

        tracing::info!("Starting RAG server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Router for `state`: chat and info routes, health and readiness, and the
/// optional static frontend under `/ui`
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness))
        .merge(routes::api_routes());

    if let Some(dir) = &config.static_dir {
        tracing::info!("Serving frontend from {} at /ui", dir.display());
        router = router.nest_service("/ui", ServeDir::new(dir));
    }

    let router = router
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new());

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router.layer(cors)
    } else {
        router
    }
}

/// Health check endpoint
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Serialize)]
struct Readiness {
    #[serde(flatten)]
    status: ServiceStatus,
    providers: ProviderHealth,
}

/// Readiness check endpoint: 200 once the answer chain is built, with
/// provider reachability reported alongside
async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let (status, providers) = tokio::join!(state.status(), state.provider_health());
    let code = if status.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(Readiness { status, providers }))
}
