//! MCP SSH gateway module exposing one remote host over MCP tools.
//!
//! This module is organized into the following submodules:
//!
//! - `config`: Gateway settings with environment variable support
//! - `credentials`: Connection descriptor resolution and session identity
//! - `error`: Error taxonomy and connection failure classification
//! - `auth`: Password and private-key authentication strategies
//! - `session`: Remote session, channel and file-transfer traits
//! - `client`: russh-backed session factory and channels
//! - `storage`: Session cache
//! - `manager`: Session acquisition with per-key open serialization
//! - `shell`: Shell quoting and remote command construction
//! - `monitor`: Diagnostic and resource command tables
//! - `executor`: Remote operations over a live session
//! - `dispatch`: Operation validation and routing
//! - `types`: Serializable response types
//! - `commands`: MCP tool implementations

pub(crate) mod auth;
pub mod client;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod manager;
pub mod monitor;
pub mod session;
pub mod shell;
pub mod storage;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use commands::McpSSHCommands;
pub use config::GatewaySettings;
pub use credentials::CredentialResolver;
pub use dispatch::Dispatcher;
