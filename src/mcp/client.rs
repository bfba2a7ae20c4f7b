//! russh-backed implementation of the session traits.
//!
//! ## Connection Lifecycle
//!
//! 1. **Client Configuration**: Build the russh client configuration with
//!    keepalive and compression settings. Sessions are long-lived, so there is
//!    no inactivity timeout.
//!
//! 2. **Connection Establishment**: Establish the TCP connection and SSH
//!    handshake against `(host, port)`.
//!
//! 3. **Authentication**: Authenticate with the single strategy matching the
//!    descriptor's [`AuthMethod`](crate::mcp::credentials::AuthMethod).
//!
//! Steps 2 and 3 together are bounded by the connect timeout. Any failure is a
//! `ConnectionError`; the factory never retries.
//!
//! ## Channels
//!
//! Each logical operation opens its own channel on the shared handle: a
//! session channel running `exec` for commands, or a session channel running
//! the `sftp` subsystem for file transfer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::{ChannelMsg, Disconnect, client};
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::OpenFlags;
use tracing::{debug, info, warn};

use super::auth::strategy_for;
use super::config::GatewaySettings;
use super::credentials::ConnectionDescriptor;
use super::error::GatewayError;
use super::session::{
    ChannelEvent, ExecChannel, FileTransfer, RemoteSession, SessionFactory, SshClientHandler,
    TransferReader, TransferWriter,
};

/// Keepalive interval for cached sessions.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Missed keepalives before russh drops the connection.
const KEEPALIVE_MAX: usize = 3;

/// Build russh client configuration.
///
/// - No inactivity timeout: sessions live for the whole process
/// - Keepalive every 30 seconds with max 3 missed keepalives
/// - Compression preference based on `compress` (ZLIB if enabled, NONE if disabled)
pub(crate) fn build_client_config(compress: bool) -> Arc<client::Config> {
    let compression = if compress {
        (&[russh::compression::ZLIB, russh::compression::NONE][..]).into()
    } else {
        (&[russh::compression::NONE][..]).into()
    };

    let preferred = russh::Preferred {
        compression,
        ..Default::default()
    };

    Arc::new(client::Config {
        inactivity_timeout: None,
        keepalive_interval: Some(KEEPALIVE_INTERVAL),
        keepalive_max: KEEPALIVE_MAX,
        preferred,
        ..Default::default()
    })
}

/// Opens russh sessions.
pub struct RusshSessionFactory {
    settings: GatewaySettings,
}

impl RusshSessionFactory {
    pub fn new(settings: GatewaySettings) -> Self {
        Self { settings }
    }

    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<client::Handle<SshClientHandler>, String> {
        let config = build_client_config(self.settings.compress);

        let mut handle = client::connect(
            config,
            (descriptor.host(), descriptor.port()),
            SshClientHandler,
        )
        .await
        .map_err(|e| format!("Failed to connect: {}", e))?;

        let strategy = strategy_for(descriptor.auth());
        debug!("Authenticating with strategy: {}", strategy.name());

        if !strategy
            .authenticate(&mut handle, descriptor.username())
            .await?
        {
            return Err(format!(
                "Authentication failed: {} credentials rejected",
                strategy.name()
            ));
        }

        Ok(handle)
    }
}

#[async_trait]
impl SessionFactory for RusshSessionFactory {
    async fn open(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Arc<dyn RemoteSession>, GatewayError> {
        let timeout = self.settings.connect_timeout;

        let handle = tokio::time::timeout(timeout, self.connect(descriptor))
            .await
            .map_err(|_| {
                GatewayError::connection(format!("Connection timed out after {:?}", timeout))
            })?
            .map_err(GatewayError::connection)?;

        info!(
            "SSH session established to {}@{}:{}",
            descriptor.username(),
            descriptor.host(),
            descriptor.port()
        );

        Ok(Arc::new(RusshSession { handle }))
    }
}

/// A live russh session.
pub struct RusshSession {
    handle: client::Handle<SshClientHandler>,
}

#[async_trait]
impl RemoteSession for RusshSession {
    async fn open_exec(&self, command: &str) -> Result<Box<dyn ExecChannel>, String> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| format!("Failed to open channel: {}", e))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| format!("Failed to execute command: {}", e))?;

        Ok(Box::new(RusshExecChannel { channel }))
    }

    async fn open_transfer(&self) -> Result<Box<dyn FileTransfer>, String> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| format!("Failed to open channel: {}", e))?;

        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| format!("Failed to request sftp subsystem: {}", e))?;

        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| format!("Failed to start sftp session: {}", e))?;

        Ok(Box::new(SftpTransfer { sftp }))
    }

    fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    async fn close(&self) -> Result<(), String> {
        self.handle
            .disconnect(Disconnect::ByApplication, "Gateway shutting down", "en")
            .await
            .map_err(|e| format!("Error during disconnect: {}", e))
    }
}

/// Exec channel over a russh session channel.
struct RusshExecChannel {
    channel: russh::Channel<client::Msg>,
}

#[async_trait]
impl ExecChannel for RusshExecChannel {
    async fn next_event(&mut self) -> Option<ChannelEvent> {
        loop {
            match self.channel.wait().await? {
                ChannelMsg::Data { data } => return Some(ChannelEvent::Stdout(data.to_vec())),
                // ext == 1 is stderr in SSH protocol
                ChannelMsg::ExtendedData { data, ext: 1 } => {
                    return Some(ChannelEvent::Stderr(data.to_vec()));
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    return Some(ChannelEvent::ExitStatus(exit_status));
                }
                ChannelMsg::Eof => return Some(ChannelEvent::Eof),
                ChannelMsg::Close => return Some(ChannelEvent::Close),
                // Ignore other message types
                _ => {}
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.channel.close().await {
            debug!("Channel close failed: {}", e);
        }
    }
}

/// File transfer over an sftp subsystem channel.
struct SftpTransfer {
    sftp: SftpSession,
}

#[async_trait]
impl FileTransfer for SftpTransfer {
    async fn open_read(&self, path: &str) -> Result<TransferReader, String> {
        let file = self
            .sftp
            .open_with_flags(path, OpenFlags::READ)
            .await
            .map_err(|e| format!("Failed to open {}: {}", path, e))?;
        Ok(Box::pin(file))
    }

    async fn open_write(&self, path: &str) -> Result<TransferWriter, String> {
        let file = self
            .sftp
            .open_with_flags(
                path,
                OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
            )
            .await
            .map_err(|e| format!("Failed to open {} for writing: {}", path, e))?;
        Ok(Box::pin(file))
    }

    async fn close(&self) -> Result<(), String> {
        self.sftp.close().await.map_err(|e| {
            warn!("Failed to close sftp session: {}", e);
            format!("Failed to close sftp session: {}", e)
        })
    }
}
