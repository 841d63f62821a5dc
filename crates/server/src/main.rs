use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rmcp::transport::stdio;
use rmcp::ServiceExt;
use tracing::info;

use netdbg_mcp_server::{
    config::{Config, Transport},
    kubernetes::ClusterClient,
    server,
    tools::DebugToolServer,
};

#[derive(Debug, Parser)]
#[command(
    name = "netdbg-mcp-server",
    about = "MCP server for Kubernetes and Open vSwitch network debugging"
)]
struct Cli {
    /// Transport to serve on: stdio or http.
    #[arg(long)]
    transport: Option<String>,
    /// Listen address for the http transport.
    #[arg(long)]
    addr: Option<String>,
    /// Path to a kubeconfig file; defaults to in-cluster or local inference.
    #[arg(long)]
    kubeconfig: Option<String>,
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout belongs to the stdio transport; logs go to stderr.
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::load()?;
    if let Some(transport) = cli.transport {
        config.transport = transport.parse()?;
    }
    if let Some(addr) = cli.addr {
        config.addr = addr;
    }
    if let Some(kubeconfig) = cli.kubeconfig {
        config.kubeconfig = Some(kubeconfig);
    }

    let cluster = Arc::new(ClusterClient::new(&config).await?);

    match config.transport {
        Transport::Stdio => {
            info!("serving MCP tools over stdio");
            let service = DebugToolServer::new(cluster).serve(stdio()).await?;
            service.waiting().await?;
        }
        Transport::Http => {
            let router = server::build_router(cluster);
            let listener = tokio::net::TcpListener::bind(&config.addr)
                .await
                .with_context(|| format!("failed to bind {}", config.addr))?;
            info!("serving MCP tools over http on {}", config.addr);
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install shutdown signal handler: {e}");
    }
}
