//! Admin server implementation

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::api::create_router;
use crate::config::AdminConfig;
use crate::crawler::LivenessTracker;
use crate::models::RateWindow;
use crate::ratelimit::SharedAccountant;

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Rate accountant shared with the fetch client
    pub accountant: SharedAccountant,

    /// Budget keys the API knows about
    pub windows: Arc<Vec<RateWindow>>,

    /// Heartbeats of in-flight harvests
    pub liveness: Arc<LivenessTracker>,

    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        accountant: SharedAccountant,
        windows: Vec<RateWindow>,
        liveness: Arc<LivenessTracker>,
    ) -> Self {
        Self {
            accountant,
            windows: Arc::new(windows),
            liveness,
            start_time: Instant::now(),
        }
    }

    /// Window registered under `key`
    pub fn window(&self, key: &str) -> Option<&RateWindow> {
        self.windows.iter().find(|window| window.key == key)
    }
}

// ============================================================================
// Admin Server
// ============================================================================

pub struct AdminServer {
    bind_address: SocketAddr,
    enable_cors: bool,
    enable_request_logging: bool,
    state: AppState,
}

impl AdminServer {
    pub fn new(config: &AdminConfig, state: AppState) -> Result<Self, ServerError> {
        let bind_address = config
            .socket_addr()
            .map_err(|e| ServerError::ConfigError(e.to_string()))?;

        Ok(Self {
            bind_address,
            enable_cors: config.enable_cors,
            enable_request_logging: config.enable_request_logging,
            state,
        })
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Build the router with all routes and layers
    pub fn build_router(&self) -> Router {
        let mut router = create_router(self.state.clone());

        if self.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        if self.enable_request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Serve until `shutdown_signal` resolves
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let router = self.build_router();
        let addr = self.bind_address;

        tracing::info!(
            %addr,
            rate_backend = self.state.accountant.backend(),
            keys = self.state.windows.len(),
            "Starting admin server"
        );

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(e.to_string()))?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::ServeError(e.to_string()))?;

        tracing::info!("Admin server shutdown complete");
        Ok(())
    }
}

// ============================================================================
// Server Errors
// ============================================================================

#[derive(Debug, Clone)]
pub enum ServerError {
    /// Configuration error
    ConfigError(String),

    /// Failed to bind to address
    BindError(String),

    /// Server error
    ServeError(String),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            Self::BindError(msg) => write!(f, "Failed to bind: {}", msg),
            Self::ServeError(msg) => write!(f, "Server error: {}", msg),
        }
    }
}

impl std::error::Error for ServerError {}
