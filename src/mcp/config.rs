//! Configuration resolution for the SSH gateway.
//!
//! Values resolve with a three-tier priority:
//!
//! 1. **Parameter** - Explicitly provided value (highest priority)
//! 2. **Environment Variable** - Value from the process environment (or `.env`)
//! 3. **Default** - Built-in default value (lowest priority)
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SSH_HOST` | - | Target host (required) |
//! | `SSH_PORT` | 22 | Target port |
//! | `SSH_USERNAME` | - | Login user (required) |
//! | `SSH_PASSWORD` | - | Password authentication |
//! | `SSH_PRIVATE_KEY_PATH` | - | Private key authentication |
//! | `SSH_PASSPHRASE` | - | Passphrase for the private key |
//! | `SSH_CONNECT_TIMEOUT` | 30s | Connect + handshake + auth bound |
//! | `SSH_COMMAND_TIMEOUT` | 180s | Per-operation bound, `0` disables it |
//! | `SSH_COMPRESSION` | true | Offer zlib compression |
//! | `MCP_PORT` | 8000 | HTTP listener port |

use std::env;
use std::time::Duration;

/// Default SSH port
pub(crate) const DEFAULT_SSH_PORT: u16 = 22;

/// Default SSH connection timeout in seconds
pub(crate) const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default remote operation timeout in seconds
pub(crate) const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 180;

/// Default MCP HTTP port
pub(crate) const DEFAULT_MCP_PORT: u16 = 8000;

pub(crate) const HOST_ENV_VAR: &str = "SSH_HOST";
pub(crate) const PORT_ENV_VAR: &str = "SSH_PORT";
pub(crate) const USERNAME_ENV_VAR: &str = "SSH_USERNAME";
pub(crate) const PASSWORD_ENV_VAR: &str = "SSH_PASSWORD";
pub(crate) const PRIVATE_KEY_PATH_ENV_VAR: &str = "SSH_PRIVATE_KEY_PATH";
pub(crate) const PASSPHRASE_ENV_VAR: &str = "SSH_PASSPHRASE";

/// Environment variable name for SSH connection timeout
pub(crate) const CONNECT_TIMEOUT_ENV_VAR: &str = "SSH_CONNECT_TIMEOUT";

/// Environment variable name for remote operation timeout
pub(crate) const COMMAND_TIMEOUT_ENV_VAR: &str = "SSH_COMMAND_TIMEOUT";

/// Environment variable name for SSH compression
pub(crate) const COMPRESSION_ENV_VAR: &str = "SSH_COMPRESSION";

/// Environment variable name for the MCP HTTP port
pub(crate) const MCP_PORT_ENV_VAR: &str = "MCP_PORT";

/// Parse a port value, falling back to 22 when it is missing, non-numeric,
/// out of range or zero.
pub(crate) fn parse_port(raw: Option<&str>) -> u16 {
    raw.and_then(|value| value.trim().parse::<u16>().ok())
        .filter(|port| *port != 0)
        .unwrap_or(DEFAULT_SSH_PORT)
}

/// Resolve the connection timeout with priority: parameter -> env var -> default
pub(crate) fn resolve_connect_timeout(timeout_param: Option<u64>) -> Duration {
    // Priority 1: Use parameter if provided
    if let Some(timeout) = timeout_param {
        return Duration::from_secs(timeout);
    }

    // Priority 2: Use environment variable if set
    if let Ok(env_timeout) = env::var(CONNECT_TIMEOUT_ENV_VAR)
        && let Ok(timeout) = env_timeout.parse::<u64>()
    {
        return Duration::from_secs(timeout);
    }

    // Priority 3: Default value
    Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS)
}

/// Resolve the remote operation timeout with priority: parameter -> env var -> default.
///
/// A value of `0` means operations are not bounded.
pub(crate) fn resolve_command_timeout(timeout_param: Option<u64>) -> Option<Duration> {
    let secs = timeout_param
        .or_else(|| {
            env::var(COMMAND_TIMEOUT_ENV_VAR)
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
        })
        .unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS);

    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Resolve the compression setting with priority: parameter -> env var -> default (true)
pub(crate) fn resolve_compression(compress_param: Option<bool>) -> bool {
    // Priority 1: Use parameter if provided
    if let Some(compress) = compress_param {
        return compress;
    }

    // Priority 2: Use environment variable if set
    if let Ok(env_compress) = env::var(COMPRESSION_ENV_VAR) {
        return env_compress.eq_ignore_ascii_case("true") || env_compress == "1";
    }

    // Priority 3: Default value (enabled)
    true
}

/// Resolve the MCP HTTP listener port from the environment.
pub fn resolve_mcp_port() -> u16 {
    env::var(MCP_PORT_ENV_VAR)
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_MCP_PORT)
}

/// Transport and operation settings shared by the session factory and the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewaySettings {
    /// Bound on connect, handshake and authentication.
    pub connect_timeout: Duration,
    /// Bound on each remote operation; `None` waits indefinitely.
    pub command_timeout: Option<Duration>,
    /// Offer zlib compression to the server.
    pub compress: bool,
}

impl GatewaySettings {
    /// Resolve every setting from the environment, using defaults for the rest.
    pub fn from_env() -> Self {
        Self {
            connect_timeout: resolve_connect_timeout(None),
            command_timeout: resolve_command_timeout(None),
            compress: resolve_compression(None),
        }
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            command_timeout: Some(Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS)),
            compress: true,
        }
    }
}
