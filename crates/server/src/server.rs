//! HTTP transport: the MCP streamable-HTTP service mounted next to a health
//! probe.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::StreamableHttpService;
use tower_http::trace::TraceLayer;

use crate::kubernetes::ClusterClient;
use crate::tools::DebugToolServer;

async fn health() -> &'static str {
    "OK"
}

/// Routes that serve regardless of cluster connectivity.
pub fn health_routes() -> Router {
    Router::new().route("/health", get(health))
}

pub fn build_router(cluster: Arc<ClusterClient>) -> Router {
    let mcp_service = StreamableHttpService::new(
        move || Ok(DebugToolServer::new(cluster.clone())),
        LocalSessionManager::default().into(),
        Default::default(),
    );

    health_routes()
        .nest_service("/mcp", mcp_service)
        .layer(TraceLayer::new_for_http())
}
