#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use dotenv::dotenv;
use poem::{EndpointExt, Route, Server, listener::TcpListener, middleware::Tracing};
use poem_mcpserver::{McpServer, streamable_http};
use ssh_gateway::mcp::config::resolve_mcp_port;
use ssh_gateway::mcp::{CredentialResolver, Dispatcher, GatewaySettings, McpSSHCommands};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Grace period for in-flight HTTP requests after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Initialize logging with proper tracing default
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().expect("valid directive")),
        )
        .init();

    let descriptor = CredentialResolver::from_env().resolve().map_err(|e| {
        error!("Startup failed: {}", e);
        e
    })?;
    let settings = GatewaySettings::from_env();
    info!(
        "Gateway target {} (connect timeout {:?}, command timeout {:?}, compression {})",
        descriptor.key(),
        settings.connect_timeout,
        settings.command_timeout,
        settings.compress
    );

    let dispatcher = Arc::new(Dispatcher::over_ssh(descriptor, settings));

    let mcp_addr = format!("0.0.0.0:{}", resolve_mcp_port());
    info!("Starting MCP server on {}", mcp_addr);

    let tools_dispatcher = dispatcher.clone();
    let app = Route::new()
        .at(
            "/",
            streamable_http::endpoint(move |_| {
                McpServer::new().tools(McpSSHCommands::new(tools_dispatcher.clone()))
            }),
        )
        .with(Tracing);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                signal.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    Server::new(TcpListener::bind(mcp_addr))
        .name("SSH Gateway")
        .run_with_graceful_shutdown(app, shutdown.cancelled_owned(), Some(SHUTDOWN_GRACE))
        .await?;

    dispatcher.shutdown().await;
    info!("SSH gateway stopped");

    Ok(())
}
