//! HTTP API server for the vision relay

pub mod health;
pub mod vision;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::relay::RelayService;

/// Route served by the long-running server
pub const SERVER_ROUTE: &str = "/gemini-vision";

/// Route of the single-invocation function, mounted here with identical semantics
pub const FUNCTION_ROUTE: &str = "/api/gemini-vision";

/// Maximum accepted request body (captured frames are large)
pub const BODY_LIMIT: usize = 50 * 1024 * 1024;

/// Shared state for API handlers
pub struct ApiState {
    pub relay: RelayService,
}

/// Build the full router: relay routes, health probes, body limit, CORS and tracing
pub fn router(state: Arc<ApiState>) -> Router {
    // The capture page is served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(vision::router(state.clone()))
        .merge(health::router())
        .merge(health::ready_router(state))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    relay: RelayService,
    host: String,
    port: u16,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(relay: RelayService) -> Self {
        Self {
            relay,
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }

    /// Set the bind host
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the bind port
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        ApiServer {
            state: Arc::new(ApiState { relay: self.relay }),
            host: self.host,
            port: self.port,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    host: String,
    port: u16,
}

impl ApiServer {
    /// Run the API server until Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            crate::Error::Config(format!("failed to bind API server on {addr}: {e}"))
        })?;

        tracing::info!(
            %addr,
            route = SERVER_ROUTE,
            style = %self.state.relay.style(),
            "relay server listening"
        );

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        tracing::info!("relay server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
