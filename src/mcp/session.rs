//! Remote session abstractions.
//!
//! The gateway talks to a remote host through three narrow traits so that the
//! cache, the executor and the dispatcher can be exercised without a network:
//!
//! - [`RemoteSession`]: one authenticated, long-lived connection. Every logical
//!   operation opens its own channel on it.
//! - [`ExecChannel`]: a single command-execution channel, consumed as a stream
//!   of [`ChannelEvent`]s.
//! - [`FileTransfer`]: a file-transfer sub-session that hands out streaming
//!   readers and writers.
//!
//! [`SessionFactory`] opens sessions. The russh-backed implementations live in
//! the `client` module.
//!
//! # Host keys
//!
//! `SshClientHandler` accepts all host keys (similar to
//! `StrictHostKeyChecking=no` in OpenSSH).

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use russh::{client, keys};
use tokio::io::{AsyncRead, AsyncWrite};

use super::credentials::ConnectionDescriptor;
use super::error::GatewayError;

/// Client handler for russh that accepts all host keys.
pub struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Accept all host keys (similar to StrictHostKeyChecking=no)
        Ok(true)
    }
}

/// One message observed on an execution channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
    ExitStatus(u32),
    /// The remote side will send no more data. Not a completion signal.
    Eof,
    /// The channel is closed; the authoritative completion event.
    Close,
}

/// A command-execution channel.
#[async_trait]
pub trait ExecChannel: Send {
    /// Next event, or `None` once the channel is gone.
    async fn next_event(&mut self) -> Option<ChannelEvent>;

    /// Close the channel, ignoring errors.
    async fn close(&mut self);
}

pub type TransferReader = Pin<Box<dyn AsyncRead + Send>>;
pub type TransferWriter = Pin<Box<dyn AsyncWrite + Send>>;

/// A file-transfer sub-session.
#[async_trait]
pub trait FileTransfer: Send + Sync {
    async fn open_read(&self, path: &str) -> Result<TransferReader, String>;

    /// Open `path` for writing, creating or truncating it.
    async fn open_write(&self, path: &str) -> Result<TransferWriter, String>;

    async fn close(&self) -> Result<(), String>;
}

/// An authenticated remote session shared by concurrent operations.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    async fn open_exec(&self, command: &str) -> Result<Box<dyn ExecChannel>, String>;

    async fn open_transfer(&self) -> Result<Box<dyn FileTransfer>, String>;

    /// Whether the underlying transport has gone away.
    fn is_closed(&self) -> bool;

    async fn close(&self) -> Result<(), String>;
}

/// Opens authenticated sessions. Never retries.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Arc<dyn RemoteSession>, GatewayError>;
}
