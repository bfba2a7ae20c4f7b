//! MCP tool surface.
//!
//! Each tool packs its parameters into an argument map and hands it to the
//! [`Dispatcher`]; validation and error mapping happen there. Error-flagged
//! responses become tool errors carrying the message text.
//!
//! - `execute_command`: Run a shell command (structured stdout/stderr/exit code)
//! - `read_file` / `write_file`: Read or overwrite a remote text file
//! - `upload_file` / `download_file`: Stream files between local and remote
//! - `list_directory`: List a remote directory
//! - `system_monitor`: Aggregated CPU/memory/disk/network diagnostics
//! - `read_resource`: Read one of the `system/*` resources as JSON

use std::sync::Arc;

use poem_mcpserver::{Tools, content::Text, tool::StructuredContent};
use serde_json::{Map, Value, json};

use super::dispatch::Dispatcher;
use super::types::{CommandOutput, OperationResponse};

/// MCP SSH gateway tools bound to one configured host.
pub struct McpSSHCommands {
    dispatcher: Arc<Dispatcher>,
}

impl McpSSHCommands {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[Tools]
impl McpSSHCommands {
    /// Execute a shell command on the remote host.
    ///
    /// Returns stdout, stderr and the exit code. A non-zero exit code is a
    /// normal result, not a tool error.
    async fn execute_command(
        &self,
        /// Shell command to run (interpreted by the remote login shell)
        command: String,
    ) -> Result<StructuredContent<CommandOutput>, String> {
        let response = self
            .dispatcher
            .dispatch("execute_command", &arguments(json!({ "command": command })))
            .await;
        into_command_output(response)
    }

    /// Read a remote file as UTF-8 text.
    async fn read_file(
        &self,
        /// Absolute or home-relative path of the remote file
        path: String,
    ) -> Result<Text<String>, String> {
        let response = self
            .dispatcher
            .dispatch("read_file", &arguments(json!({ "path": path })))
            .await;
        into_text(response)
    }

    /// Write text content to a remote file, replacing it.
    ///
    /// Content is written verbatim; no trailing newline is added.
    async fn write_file(
        &self,
        /// Remote file path
        path: String,
        /// Text to write
        content: String,
    ) -> Result<Text<String>, String> {
        let response = self
            .dispatcher
            .dispatch(
                "write_file",
                &arguments(json!({ "path": path, "content": content })),
            )
            .await;
        into_text(response)
    }

    /// Upload a local file to the remote host.
    async fn upload_file(
        &self,
        /// Path of the file on this machine
        local_path: String,
        /// Destination path on the remote host (created or truncated)
        remote_path: String,
    ) -> Result<Text<String>, String> {
        let response = self
            .dispatcher
            .dispatch(
                "upload_file",
                &arguments(json!({ "local_path": local_path, "remote_path": remote_path })),
            )
            .await;
        into_text(response)
    }

    /// Download a remote file to this machine.
    async fn download_file(
        &self,
        /// Path of the file on the remote host
        remote_path: String,
        /// Destination path on this machine (created or truncated)
        local_path: String,
    ) -> Result<Text<String>, String> {
        let response = self
            .dispatcher
            .dispatch(
                "download_file",
                &arguments(json!({ "remote_path": remote_path, "local_path": local_path })),
            )
            .await;
        into_text(response)
    }

    /// List the contents of a remote directory.
    async fn list_directory(
        &self,
        /// Directory to list (default: the remote working directory)
        path: Option<String>,
        /// Long format with permissions, owners and sizes (default: true)
        detailed: Option<bool>,
    ) -> Result<Text<String>, String> {
        let response = self
            .dispatcher
            .dispatch(
                "list_directory",
                &arguments(json!({ "path": path, "detailed": detailed })),
            )
            .await;
        into_text(response)
    }

    /// Collect system diagnostics from the remote host.
    ///
    /// Runs a fixed set of commands concurrently and returns their output in a
    /// stable order, one `=== command ===` section each.
    async fn system_monitor(
        &self,
        /// One of "cpu", "memory", "disk", "network" or "all" (default: "all")
        kind: Option<String>,
    ) -> Result<Text<String>, String> {
        let response = self
            .dispatcher
            .dispatch("system_monitor", &arguments(json!({ "type": kind })))
            .await;
        into_text(response)
    }

    /// Read a system resource as JSON: "system/info", "system/processes",
    /// "system/disk" or "system/memory".
    async fn read_resource(
        &self,
        /// Resource URI, e.g. "system/info"
        uri: String,
    ) -> Result<Text<String>, String> {
        into_text(self.dispatcher.read_resource(&uri).await)
    }
}

fn arguments(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn into_text(response: OperationResponse) -> Result<Text<String>, String> {
    if response.is_error {
        Err(response.text)
    } else {
        Ok(Text(response.text))
    }
}

fn into_command_output(
    response: OperationResponse,
) -> Result<StructuredContent<CommandOutput>, String> {
    if response.is_error {
        return Err(response.text);
    }
    response
        .command_output
        .map(StructuredContent)
        .ok_or_else(|| format!("{} returned no command output", response.operation))
}
