//! Application state for the RAG server

use std::sync::Arc;

use crate::config::RagConfig;
use crate::service::{ProviderHealth, RagService, ServiceStatus};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Question answering service
    service: Arc<RagService>,
}

impl AppState {
    /// Wrap a service for the HTTP handlers
    pub fn new(service: Arc<RagService>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { service }),
        }
    }

    /// Get the RAG service
    pub fn service(&self) -> &Arc<RagService> {
        &self.inner.service
    }

    /// Get configuration
    pub fn config(&self) -> &RagConfig {
        self.inner.service.config()
    }

    pub async fn status(&self) -> ServiceStatus {
        self.inner.service.status().await
    }

    pub async fn provider_health(&self) -> ProviderHealth {
        self.inner.service.provider_health().await
    }
}
