#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use std::sync::Arc;

use dotenv::dotenv;
use poem_mcpserver::McpServer;
use ssh_gateway::mcp::{CredentialResolver, Dispatcher, GatewaySettings, McpSSHCommands};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // stdout carries protocol frames, so logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().expect("valid directive")),
        )
        .init();

    let descriptor = CredentialResolver::from_env().resolve().map_err(|e| {
        error!("Startup failed: {}", e);
        e
    })?;
    info!("Gateway target {} over stdio", descriptor.key());

    let dispatcher = Arc::new(Dispatcher::over_ssh(descriptor, GatewaySettings::from_env()));
    let server = poem_mcpserver::stdio::stdio(
        McpServer::new().tools(McpSSHCommands::new(dispatcher.clone())),
    );

    tokio::select! {
        result = server => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
    }

    dispatcher.shutdown().await;
    info!("SSH gateway stopped");

    Ok(())
}
