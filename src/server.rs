//! Server initialization and startup
//!
//! Handles both the stdio MCP transport and HTTP mode, where the MCP
//! endpoint is served beside the JSON search endpoint.

use anyhow::Result;
use rmcp::{
    transport::stdio,
    transport::streamable_http_server::{
        session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
    },
    ServiceExt,
};
use tracing::info;

use artifactfinder::mcp::ArtifactFinderHandler;
use artifactfinder::{web, ArtifactFinderModel, FinderConfig};

async fn open_model(config: &FinderConfig) -> Result<ArtifactFinderModel> {
    let model = config.open_model().await?;

    let stats = model.stats().await?;
    if stats.artifacts == 0 {
        info!("Index is empty, searches will return nothing until a crawl has run");
    } else {
        info!(
            "Index loaded: {} artifacts, {} classes, {} functions",
            stats.artifacts, stats.classes, stats.methods
        );
    }

    Ok(model)
}

/// Start MCP server with stdio transport
#[tokio::main]
pub async fn start_stdio(config: FinderConfig) -> Result<()> {
    info!("Starting artifactfinder MCP server (stdio)");

    let model = open_model(&config).await?;
    let service = ArtifactFinderHandler::new(model).serve(stdio()).await?;

    info!("MCP server running on stdio");
    service.waiting().await?;

    Ok(())
}

/// Start the HTTP server with `/search` and the MCP endpoint under `/mcp`
#[tokio::main]
pub async fn start_http(port: u16, config: FinderConfig) -> Result<()> {
    info!("Starting artifactfinder server (HTTP on port {})", port);

    let model = open_model(&config).await?;
    let cancellation_token = tokio_util::sync::CancellationToken::new();

    // Each MCP session gets a handler over the shared model
    let mcp_model = model.clone();
    let service = StreamableHttpService::new(
        move || Ok(ArtifactFinderHandler::new(mcp_model.clone())),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig {
            cancellation_token: cancellation_token.child_token(),
            ..Default::default()
        },
    );

    let router = web::router(model).nest_service("/mcp", service);

    let bind_addr = format!("127.0.0.1:{}", port);
    info!("Listening on http://{}/search and http://{}/mcp", bind_addr, bind_addr);

    let tcp_listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(tcp_listener, router)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down...");
            cancellation_token.cancel();
        })
        .await?;

    Ok(())
}
