//! Remote operation executor.
//!
//! Every operation runs on a live [`RemoteSession`] and opens its own channel:
//! an exec channel for shell-style operations, or a file-transfer sub-session
//! for reads and transfers. Concurrent operations on one session therefore
//! never share a byte stream.
//!
//! # Output collection
//!
//! [`collect_output`] splits the channel's event stream into two producer
//! queues (stdout and stderr) drained by independent accumulators, and joins
//! them with the pump. The pump only stops on the channel's close event, so
//! stream data arriving after EOF is still captured.
//!
//! # Timeouts
//!
//! When a command timeout is configured, each operation is bounded by it and
//! expiry yields [`GatewayError::Timeout`]. Channels and transfer sub-sessions
//! are closed after the bound, whether or not it expired. The session itself is
//! left alone. A download that fails or expires removes its partial local file.

use std::future::Future;
use std::time::Duration;

use futures::future::try_join_all;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::error::GatewayError;
use super::monitor::MonitorKind;
use super::session::{ChannelEvent, ExecChannel, FileTransfer, RemoteSession};
use super::shell;
use super::types::CommandOutput;

/// Exit code reported when the channel closed without an exit status.
pub const MISSING_EXIT_CODE: i32 = -1;

/// Runs operations against a session.
#[derive(Debug, Clone, Copy, Default)]
pub struct Executor {
    command_timeout: Option<Duration>,
}

impl Executor {
    /// `None` leaves remote operations unbounded.
    pub fn new(command_timeout: Option<Duration>) -> Self {
        Self { command_timeout }
    }

    async fn bounded<T>(
        &self,
        what: &str,
        fut: impl Future<Output = Result<T, GatewayError>>,
    ) -> Result<T, GatewayError> {
        match self.command_timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                GatewayError::Timeout(format!("{} did not finish within {:?}", what, limit))
            })?,
            None => fut.await,
        }
    }

    /// Run `command` and collect both streams and the exit code.
    pub async fn execute_command(
        &self,
        session: &dyn RemoteSession,
        command: &str,
    ) -> Result<CommandOutput, GatewayError> {
        let mut channel: Option<Box<dyn ExecChannel>> = None;

        let result = self
            .bounded(&format!("Command '{}'", command), async {
                let opened = channel.insert(
                    session
                        .open_exec(command)
                        .await
                        .map_err(GatewayError::Execution)?,
                );
                debug!("Opened exec channel for: {}", command);
                Ok(collect_output(opened.as_mut()).await)
            })
            .await;

        if let Some(mut channel) = channel {
            channel.close().await;
        }

        if let Ok(output) = &result {
            debug!("Command '{}' exited with {}", command, output.exit_code);
        }
        result
    }

    /// Read a remote file as UTF-8 text.
    pub async fn read_file(
        &self,
        session: &dyn RemoteSession,
        path: &str,
    ) -> Result<String, GatewayError> {
        let mut transfer: Option<Box<dyn FileTransfer>> = None;

        let result = self
            .bounded(&format!("Read of {}", path), async {
                let opened = transfer.insert(
                    session
                        .open_transfer()
                        .await
                        .map_err(GatewayError::FileAccess)?,
                );
                read_to_string(opened.as_ref(), path).await
            })
            .await;

        close_transfer(transfer).await;
        result
    }

    /// Write `content` verbatim into `path` through the remote shell.
    pub async fn write_file(
        &self,
        session: &dyn RemoteSession,
        path: &str,
        content: &str,
    ) -> Result<(), GatewayError> {
        let command = shell::write_file_command(path, content);
        let output = self
            .execute_command(session, &command)
            .await
            .map_err(|e| match e {
                GatewayError::Execution(message) => GatewayError::Write(message),
                other => other,
            })?;

        if !output.success() {
            return Err(GatewayError::Write(format!(
                "Writing {} exited with code {}: {}",
                path,
                output.exit_code,
                output.stderr.trim()
            )));
        }
        Ok(())
    }

    /// Stream a local file to the remote host. Returns the bytes copied.
    pub async fn upload_file(
        &self,
        session: &dyn RemoteSession,
        local_path: &str,
        remote_path: &str,
    ) -> Result<u64, GatewayError> {
        let mut transfer: Option<Box<dyn FileTransfer>> = None;

        let result = self
            .bounded(&format!("Upload of {}", local_path), async {
                let mut source = tokio::fs::File::open(local_path).await.map_err(|e| {
                    GatewayError::Transfer(format!(
                        "Failed to open local file {}: {}",
                        local_path, e
                    ))
                })?;

                let opened = transfer.insert(
                    session
                        .open_transfer()
                        .await
                        .map_err(GatewayError::Transfer)?,
                );
                copy_to_remote(opened.as_ref(), &mut source, remote_path).await
            })
            .await;

        close_transfer(transfer).await;
        result
    }

    /// Stream a remote file to the local filesystem. Returns the bytes copied.
    pub async fn download_file(
        &self,
        session: &dyn RemoteSession,
        remote_path: &str,
        local_path: &str,
    ) -> Result<u64, GatewayError> {
        let mut transfer: Option<Box<dyn FileTransfer>> = None;
        let mut created = false;

        let result = self
            .bounded(&format!("Download of {}", remote_path), async {
                let opened = transfer.insert(
                    session
                        .open_transfer()
                        .await
                        .map_err(GatewayError::Transfer)?,
                );
                copy_from_remote(opened.as_ref(), remote_path, local_path, &mut created).await
            })
            .await;

        close_transfer(transfer).await;
        if result.is_err() && created {
            remove_partial_download(local_path).await;
        }
        result
    }

    /// List a remote directory; `None` lists the remote working directory.
    pub async fn list_directory(
        &self,
        session: &dyn RemoteSession,
        path: Option<&str>,
        detailed: bool,
    ) -> Result<String, GatewayError> {
        let command = shell::list_directory_command(path, detailed);
        let output = self.execute_command(session, &command).await?;

        if !output.success() {
            return Err(GatewayError::Execution(format!(
                "'{}' exited with code {}: {}",
                command,
                output.exit_code,
                output.stderr.trim()
            )));
        }
        Ok(output.stdout)
    }

    /// Run every diagnostic command for `kind` concurrently and assemble the
    /// report in table order.
    pub async fn monitor(
        &self,
        session: &dyn RemoteSession,
        kind: MonitorKind,
    ) -> Result<String, GatewayError> {
        let commands = kind.commands();
        let outputs = try_join_all(
            commands
                .iter()
                .map(|command| self.execute_command(session, command)),
        )
        .await?;

        let sections: Vec<String> = commands
            .iter()
            .zip(outputs.iter())
            .map(|(command, output)| monitor_section(command, output))
            .collect();
        Ok(sections.join("\n\n"))
    }
}

fn monitor_section(command: &str, output: &CommandOutput) -> String {
    let mut section = format!("=== {} ===\n{}", command, output.stdout.trim_end());
    let stderr = output.stderr.trim_end();
    if !stderr.is_empty() {
        section.push_str("\n--- stderr ---\n");
        section.push_str(stderr);
    }
    section
}

/// Drain an exec channel until it closes.
///
/// Resolves once the close event arrives (or the channel goes away) and both
/// accumulators have consumed every chunk sent before it. EOF alone does not
/// end collection.
pub(crate) async fn collect_output(channel: &mut dyn ExecChannel) -> CommandOutput {
    let (stdout_tx, stdout_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let (stderr_tx, stderr_rx) = mpsc::unbounded_channel::<Vec<u8>>();

    let pump = async move {
        let mut exit_status = None;
        while let Some(event) = channel.next_event().await {
            match event {
                ChannelEvent::Stdout(data) => {
                    let _ = stdout_tx.send(data);
                }
                ChannelEvent::Stderr(data) => {
                    let _ = stderr_tx.send(data);
                }
                ChannelEvent::ExitStatus(code) => exit_status = Some(code),
                ChannelEvent::Eof => debug!("Exec channel reached EOF"),
                ChannelEvent::Close => break,
            }
        }
        // Dropping the senders lets both accumulators finish.
        drop(stdout_tx);
        drop(stderr_tx);
        exit_status
    };

    let (exit_status, stdout, stderr) =
        tokio::join!(pump, accumulate(stdout_rx), accumulate(stderr_rx));

    CommandOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_code: exit_status
            .and_then(|code| i32::try_from(code).ok())
            .unwrap_or(MISSING_EXIT_CODE),
    }
}

async fn accumulate(mut rx: mpsc::UnboundedReceiver<Vec<u8>>) -> Vec<u8> {
    let mut buffer = Vec::new();
    while let Some(chunk) = rx.recv().await {
        buffer.extend_from_slice(&chunk);
    }
    buffer
}

async fn read_to_string(transfer: &dyn FileTransfer, path: &str) -> Result<String, GatewayError> {
    let mut reader = transfer
        .open_read(path)
        .await
        .map_err(GatewayError::FileAccess)?;

    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .await
        .map_err(|e| GatewayError::FileAccess(format!("Failed to read {}: {}", path, e)))?;

    String::from_utf8(bytes)
        .map_err(|_| GatewayError::FileAccess(format!("{} is not valid UTF-8 text", path)))
}

async fn copy_to_remote(
    transfer: &dyn FileTransfer,
    source: &mut tokio::fs::File,
    remote_path: &str,
) -> Result<u64, GatewayError> {
    let mut sink = transfer
        .open_write(remote_path)
        .await
        .map_err(GatewayError::Transfer)?;

    let copied = tokio::io::copy(source, &mut sink)
        .await
        .map_err(|e| GatewayError::Transfer(format!("Failed to upload to {}: {}", remote_path, e)))?;
    sink.shutdown().await.map_err(|e| {
        GatewayError::Transfer(format!("Failed to finish upload to {}: {}", remote_path, e))
    })?;

    Ok(copied)
}

/// Sets `created` once `local_path` exists, so the caller knows to remove it
/// if the copy does not complete.
async fn copy_from_remote(
    transfer: &dyn FileTransfer,
    remote_path: &str,
    local_path: &str,
    created: &mut bool,
) -> Result<u64, GatewayError> {
    // Open the remote side first so a missing file leaves nothing behind locally
    let mut source = transfer
        .open_read(remote_path)
        .await
        .map_err(GatewayError::Transfer)?;

    let mut sink = tokio::fs::File::create(local_path).await.map_err(|e| {
        GatewayError::Transfer(format!("Failed to create local file {}: {}", local_path, e))
    })?;
    *created = true;

    let copied = tokio::io::copy(&mut source, &mut sink).await.map_err(|e| {
        GatewayError::Transfer(format!("Failed to download {}: {}", remote_path, e))
    })?;
    sink.flush().await.map_err(|e| {
        GatewayError::Transfer(format!("Failed to flush {}: {}", local_path, e))
    })?;

    Ok(copied)
}

async fn close_transfer(transfer: Option<Box<dyn FileTransfer>>) {
    if let Some(transfer) = transfer
        && let Err(e) = transfer.close().await
    {
        warn!("{}", e);
    }
}

async fn remove_partial_download(local_path: &str) {
    if let Err(e) = tokio::fs::remove_file(local_path).await {
        warn!("Failed to remove partial download {}: {}", local_path, e);
    }
}
