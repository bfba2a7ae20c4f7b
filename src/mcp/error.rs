//! Error taxonomy for the SSH gateway.
//!
//! Every failure that can reach a caller is a [`GatewayError`]. Backend traits
//! (authentication, sessions, channels, file transfer) report plain `String`
//! causes; the factory and the executor lift those into the variant that
//! matches the operation that failed.
//!
//! # Connection failures
//!
//! Connection errors carry a [`ConnectFailureKind`] derived from the cause text:
//!
//! 1. **Authentication**: credential or permission problems. Re-invoking the
//!    operation will fail the same way.
//! 2. **Network**: transient transport problems (refused, reset, timeout,
//!    unreachable). A later operation may succeed because failed attempts never
//!    leave a cache entry behind.
//! 3. **Protocol**: anything else that looks like an SSH protocol failure.
//!
//! Authentication patterns take precedence over network patterns. The
//! classification is informational; nothing in the gateway retries on its own.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Authentication error patterns that indicate permanent failures.
const AUTH_ERRORS: &[&str] = &[
    "authentication failed",
    "password authentication failed",
    "key authentication failed",
    "credentials rejected",
    "permission denied",
    "publickey",
    "auth fail",
    "no authentication",
    "failed to decode private key",
];

/// Connection error patterns that indicate transient failures.
const TRANSIENT_ERRORS: &[&str] = &[
    "connection refused",
    "connection reset",
    "connection timed out",
    "timeout",
    "timed out",
    "network is unreachable",
    "no route to host",
    "host is down",
    "temporary failure",
    "resource temporarily unavailable",
    "handshake failed",
    "failed to connect",
    "broken pipe",
];

/// Coarse classification of a failed session establishment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConnectFailureKind {
    Authentication,
    Network,
    Protocol,
}

impl ConnectFailureKind {
    /// Classify a connection failure from its cause text.
    ///
    /// Unknown causes that do not mention SSH are treated as network problems;
    /// SSH-level causes count as protocol failures unless they also mention a
    /// timeout or a connect step.
    pub fn classify(cause: &str) -> Self {
        let lower = cause.to_lowercase();

        if AUTH_ERRORS.iter().any(|pattern| lower.contains(pattern)) {
            return Self::Authentication;
        }

        if TRANSIENT_ERRORS.iter().any(|pattern| lower.contains(pattern)) {
            return Self::Network;
        }

        if !lower.contains("ssh") || lower.contains("timeout") || lower.contains("connect") {
            Self::Network
        } else {
            Self::Protocol
        }
    }

    /// Whether re-invoking the operation later has a chance of succeeding.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Network)
    }
}

impl fmt::Display for ConnectFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectFailureKind::Authentication => write!(f, "authentication"),
            ConnectFailureKind::Network => write!(f, "network"),
            ConnectFailureKind::Protocol => write!(f, "protocol"),
        }
    }
}

/// Serializable tag identifying which taxonomy entry an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Connection,
    Execution,
    FileAccess,
    Write,
    Transfer,
    Timeout,
    Validation,
    UnknownOperation,
}

/// Every failure the gateway reports.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Missing or unreadable credentials. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Session establishment failed (handshake, authentication, network).
    #[error("Connection error ({kind}): {message}")]
    Connection {
        kind: ConnectFailureKind,
        message: String,
    },

    /// An execution channel could not be opened or driven.
    #[error("Execution error: {0}")]
    Execution(String),

    /// A remote file could not be read.
    #[error("File access error: {0}")]
    FileAccess(String),

    /// The remote write command exited non-zero.
    #[error("Write error: {0}")]
    Write(String),

    /// Upload or download stream failure on either end.
    #[error("Transfer error: {0}")]
    Transfer(String),

    /// A remote operation exceeded the configured bound.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Missing, empty or mistyped arguments.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation or resource name outside the catalogue.
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),
}

impl GatewayError {
    /// Build a connection error, classifying the cause.
    pub fn connection(cause: impl Into<String>) -> Self {
        let message = cause.into();
        GatewayError::Connection {
            kind: ConnectFailureKind::classify(&message),
            message,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Configuration(_) => ErrorKind::Configuration,
            GatewayError::Connection { .. } => ErrorKind::Connection,
            GatewayError::Execution(_) => ErrorKind::Execution,
            GatewayError::FileAccess(_) => ErrorKind::FileAccess,
            GatewayError::Write(_) => ErrorKind::Write,
            GatewayError::Transfer(_) => ErrorKind::Transfer,
            GatewayError::Timeout(_) => ErrorKind::Timeout,
            GatewayError::Validation(_) => ErrorKind::Validation,
            GatewayError::UnknownOperation(_) => ErrorKind::UnknownOperation,
        }
    }

    /// Whether calling again later, with the same arguments, may succeed.
    /// Only network-level connection failures qualify.
    pub fn may_succeed_later(&self) -> bool {
        matches!(self, GatewayError::Connection { kind, .. } if kind.is_transient())
    }

    /// True for failures that happen on a live session and may indicate the
    /// transport underneath has gone away.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            GatewayError::Execution(_)
                | GatewayError::FileAccess(_)
                | GatewayError::Write(_)
                | GatewayError::Transfer(_)
                | GatewayError::Timeout(_)
        )
    }
}
