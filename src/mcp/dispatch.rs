//! Operation dispatch.
//!
//! The [`Dispatcher`] is the boundary between callers and the remote host. It
//! maps an operation name and a JSON argument map onto one [`Executor`] call:
//!
//! 1. Resolve the name to an [`OperationKind`] (unknown names fail here).
//! 2. Parse and validate the arguments into an [`Operation`]. Missing, empty or
//!    mistyped required arguments fail before any session is acquired.
//! 3. Acquire the session through the [`SessionManager`] and run the operation.
//!
//! Every outcome, success or failure, comes back as an [`OperationResponse`];
//! nothing escapes as a panic or an unhandled error.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::client::RusshSessionFactory;
use super::config::GatewaySettings;
use super::credentials::ConnectionDescriptor;
use super::error::GatewayError;
use super::executor::Executor;
use super::manager::SessionManager;
use super::monitor::{MonitorKind, ResourceKind};
use super::session::RemoteSession;
use super::storage::DashMapSessionCache;
use super::types::{OperationOutput, OperationResponse, ResourcePayload};

/// The closed set of operations callers can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    ExecuteCommand,
    ReadFile,
    WriteFile,
    UploadFile,
    DownloadFile,
    ListDirectory,
    SystemMonitor,
}

impl OperationKind {
    pub const ALL: [OperationKind; 7] = [
        OperationKind::ExecuteCommand,
        OperationKind::ReadFile,
        OperationKind::WriteFile,
        OperationKind::UploadFile,
        OperationKind::DownloadFile,
        OperationKind::ListDirectory,
        OperationKind::SystemMonitor,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OperationKind::ExecuteCommand => "execute_command",
            OperationKind::ReadFile => "read_file",
            OperationKind::WriteFile => "write_file",
            OperationKind::UploadFile => "upload_file",
            OperationKind::DownloadFile => "download_file",
            OperationKind::ListDirectory => "list_directory",
            OperationKind::SystemMonitor => "system_monitor",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

/// A validated operation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    ExecuteCommand {
        command: String,
    },
    ReadFile {
        path: String,
    },
    WriteFile {
        path: String,
        content: String,
    },
    UploadFile {
        local_path: String,
        remote_path: String,
    },
    DownloadFile {
        remote_path: String,
        local_path: String,
    },
    ListDirectory {
        path: Option<String>,
        detailed: bool,
    },
    SystemMonitor {
        kind: MonitorKind,
    },
}

impl Operation {
    /// Validate `args` for `kind`.
    pub fn parse(kind: OperationKind, args: &Map<String, Value>) -> Result<Self, GatewayError> {
        let operation = match kind {
            OperationKind::ExecuteCommand => Operation::ExecuteCommand {
                command: required(args, "command")?,
            },
            OperationKind::ReadFile => Operation::ReadFile {
                path: required(args, "path")?,
            },
            OperationKind::WriteFile => Operation::WriteFile {
                path: required(args, "path")?,
                content: required(args, "content")?,
            },
            OperationKind::UploadFile => Operation::UploadFile {
                local_path: required(args, "local_path")?,
                remote_path: required(args, "remote_path")?,
            },
            OperationKind::DownloadFile => Operation::DownloadFile {
                remote_path: required(args, "remote_path")?,
                local_path: required(args, "local_path")?,
            },
            OperationKind::ListDirectory => Operation::ListDirectory {
                path: optional(args, "path")?,
                detailed: optional_bool(args, "detailed")?.unwrap_or(true),
            },
            OperationKind::SystemMonitor => Operation::SystemMonitor {
                kind: optional(args, "type")?
                    .map(|value| value.parse::<MonitorKind>())
                    .transpose()?
                    .unwrap_or_default(),
            },
        };
        Ok(operation)
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::ExecuteCommand { .. } => OperationKind::ExecuteCommand,
            Operation::ReadFile { .. } => OperationKind::ReadFile,
            Operation::WriteFile { .. } => OperationKind::WriteFile,
            Operation::UploadFile { .. } => OperationKind::UploadFile,
            Operation::DownloadFile { .. } => OperationKind::DownloadFile,
            Operation::ListDirectory { .. } => OperationKind::ListDirectory,
            Operation::SystemMonitor { .. } => OperationKind::SystemMonitor,
        }
    }
}

fn required(args: &Map<String, Value>, name: &str) -> Result<String, GatewayError> {
    optional(args, name)?
        .ok_or_else(|| GatewayError::Validation(format!("'{}' is required", name)))
}

/// Absent, null and empty strings all count as missing.
fn optional(args: &Map<String, Value>, name: &str) -> Result<Option<String>, GatewayError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) if value.is_empty() => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(other) => Err(GatewayError::Validation(format!(
            "'{}' must be a string, got {}",
            name, other
        ))),
    }
}

fn optional_bool(args: &Map<String, Value>, name: &str) -> Result<Option<bool>, GatewayError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(value)) => Ok(Some(*value)),
        Some(other) => Err(GatewayError::Validation(format!(
            "'{}' must be a boolean, got {}",
            name, other
        ))),
    }
}

/// Routes operations for one configured target.
pub struct Dispatcher {
    descriptor: ConnectionDescriptor,
    sessions: Arc<SessionManager>,
    executor: Executor,
}

impl Dispatcher {
    pub fn new(
        descriptor: ConnectionDescriptor,
        sessions: Arc<SessionManager>,
        executor: Executor,
    ) -> Self {
        Self {
            descriptor,
            sessions,
            executor,
        }
    }

    /// Dispatcher backed by real SSH sessions and an in-memory cache.
    pub fn over_ssh(descriptor: ConnectionDescriptor, settings: GatewaySettings) -> Self {
        let sessions = SessionManager::new(
            Arc::new(DashMapSessionCache::new()),
            Arc::new(RusshSessionFactory::new(settings)),
        );
        Self::new(
            descriptor,
            Arc::new(sessions),
            Executor::new(settings.command_timeout),
        )
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Run the named operation. Never fails; errors are carried in the response.
    pub async fn dispatch(&self, name: &str, args: &Map<String, Value>) -> OperationResponse {
        let request_id = Uuid::new_v4();
        info!("[{}] Dispatching {}", request_id, name);

        let result = self.run_operation(name, args).await;
        log_outcome(&request_id, name, &result);
        OperationResponse::from_result(name, result)
    }

    /// Serve a read-only resource endpoint such as `system/info`.
    pub async fn read_resource(&self, uri: &str) -> OperationResponse {
        let request_id = Uuid::new_v4();
        info!("[{}] Reading resource {}", request_id, uri);

        let result = self.run_resource(uri).await;
        log_outcome(&request_id, uri, &result);
        OperationResponse::from_result(uri, result)
    }

    /// Close every cached session.
    pub async fn shutdown(&self) {
        self.sessions.shutdown().await;
    }

    async fn run_operation(
        &self,
        name: &str,
        args: &Map<String, Value>,
    ) -> Result<OperationOutput, GatewayError> {
        let kind = OperationKind::from_name(name)
            .ok_or_else(|| GatewayError::UnknownOperation(name.to_string()))?;
        let operation = Operation::parse(kind, args)?;

        let session = self.sessions.acquire(&self.descriptor).await?;
        let result = self.execute(session.as_ref(), operation).await;
        self.invalidate_if_dead(session.as_ref(), &result).await;
        result
    }

    async fn run_resource(&self, uri: &str) -> Result<OperationOutput, GatewayError> {
        let resource = ResourceKind::from_uri(uri)
            .ok_or_else(|| GatewayError::UnknownOperation(format!("resource {}", uri)))?;

        let session = self.sessions.acquire(&self.descriptor).await?;
        let result = self
            .executor
            .execute_command(session.as_ref(), resource.command())
            .await;
        self.invalidate_if_dead(session.as_ref(), &result).await;

        let payload = ResourcePayload {
            resource: uri.to_string(),
            command: resource.command().to_string(),
            output: result?.stdout,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        serde_json::to_string_pretty(&payload)
            .map(OperationOutput::Text)
            .map_err(|e| GatewayError::Execution(format!("Failed to encode resource: {}", e)))
    }

    async fn execute(
        &self,
        session: &dyn RemoteSession,
        operation: Operation,
    ) -> Result<OperationOutput, GatewayError> {
        let executor = &self.executor;
        match operation {
            Operation::ExecuteCommand { command } => executor
                .execute_command(session, &command)
                .await
                .map(OperationOutput::Command),
            Operation::ReadFile { path } => executor
                .read_file(session, &path)
                .await
                .map(OperationOutput::Text),
            Operation::WriteFile { path, content } => {
                executor.write_file(session, &path, &content).await?;
                Ok(OperationOutput::Done(format!(
                    "Wrote {} bytes to {}",
                    content.len(),
                    path
                )))
            }
            Operation::UploadFile {
                local_path,
                remote_path,
            } => {
                let bytes = executor
                    .upload_file(session, &local_path, &remote_path)
                    .await?;
                Ok(OperationOutput::Done(format!(
                    "Uploaded {} to {} ({} bytes)",
                    local_path, remote_path, bytes
                )))
            }
            Operation::DownloadFile {
                remote_path,
                local_path,
            } => {
                let bytes = executor
                    .download_file(session, &remote_path, &local_path)
                    .await?;
                Ok(OperationOutput::Done(format!(
                    "Downloaded {} to {} ({} bytes)",
                    remote_path, local_path, bytes
                )))
            }
            Operation::ListDirectory { path, detailed } => executor
                .list_directory(session, path.as_deref(), detailed)
                .await
                .map(OperationOutput::Text),
            Operation::SystemMonitor { kind } => executor
                .monitor(session, kind)
                .await
                .map(OperationOutput::Text),
        }
    }

    /// A remote failure on a session whose transport is gone evicts it so the
    /// next call reconnects.
    async fn invalidate_if_dead<T>(
        &self,
        session: &dyn RemoteSession,
        result: &Result<T, GatewayError>,
    ) {
        if let Err(e) = result
            && e.is_remote()
            && session.is_closed()
        {
            self.sessions.evict_if_closed(&self.descriptor.key()).await;
        }
    }
}

fn log_outcome(request_id: &Uuid, name: &str, result: &Result<OperationOutput, GatewayError>) {
    match result {
        Ok(_) => info!("[{}] {} completed", request_id, name),
        Err(e @ (GatewayError::Validation(_) | GatewayError::UnknownOperation(_))) => {
            warn!("[{}] {} rejected ({:?}): {}", request_id, name, e.kind(), e)
        }
        Err(e) => error!("[{}] {} failed ({:?}): {}", request_id, name, e.kind(), e),
    }
}
