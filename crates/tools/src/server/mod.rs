mod routes;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::tools::ToolRegistry;

/// HTTP surface exposing the tool registry to agent runtimes
pub struct Server {
    registry: Arc<ToolRegistry>,
}

impl Server {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn build_router(self) -> Router {
        Router::new()
            .route("/health", get(routes::health))
            .route("/tools", get(routes::list_tools))
            .route("/tools/{name}", post(routes::call_tool))
            .route("/metrics", get(routes::metrics))
            .layer(TraceLayer::new_for_http())
            .with_state(self.registry)
    }

    pub async fn start(self, addr: &str) -> crate::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", listener.local_addr()?);
        axum::serve(listener, self.build_router()).await?;
        Ok(())
    }
}
