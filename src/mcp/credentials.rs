//! Credential resolution and connection identity.
//!
//! [`CredentialResolver`] turns configuration key/values into an immutable
//! [`ConnectionDescriptor`]. The descriptor's [`SessionKey`] is derived from
//! `(host, port, username)` only: two descriptors that differ solely in their
//! credentials map to the same cached session.

use std::fmt;
use std::path::Path;

use tracing::debug;

use super::config::{
    HOST_ENV_VAR, PASSPHRASE_ENV_VAR, PASSWORD_ENV_VAR, PORT_ENV_VAR, PRIVATE_KEY_PATH_ENV_VAR,
    USERNAME_ENV_VAR, parse_port,
};
use super::error::GatewayError;

/// Authentication material for a connection. Exactly one variant is ever
/// populated, which the enum enforces by construction.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMethod {
    Password(String),
    PrivateKey {
        key_material: Vec<u8>,
        passphrase: Option<String>,
    },
}

impl AuthMethod {
    pub fn name(&self) -> &'static str {
        match self {
            AuthMethod::Password(_) => "password",
            AuthMethod::PrivateKey { .. } => "private_key",
        }
    }
}

// Secrets never reach logs.
impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::Password(_) => f.write_str("Password(<redacted>)"),
            AuthMethod::PrivateKey { passphrase, .. } => f
                .debug_struct("PrivateKey")
                .field("key_material", &"<redacted>")
                .field("passphrase", &passphrase.as_ref().map(|_| "<redacted>"))
                .finish(),
        }
    }
}

/// Identity of a remote session: `(host, port, username)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub host: String,
    pub port: u16,
    pub username: String,
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.username, self.host, self.port)
    }
}

/// Everything needed to open an authenticated session. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    host: String,
    port: u16,
    username: String,
    auth: AuthMethod,
}

impl ConnectionDescriptor {
    /// Build a descriptor, rejecting empty host/username and port 0.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        auth: AuthMethod,
    ) -> Result<Self, GatewayError> {
        let host = host.into();
        let username = username.into();

        if host.trim().is_empty() {
            return Err(GatewayError::Configuration("host must not be empty".into()));
        }
        if username.trim().is_empty() {
            return Err(GatewayError::Configuration(
                "username must not be empty".into(),
            ));
        }
        if port == 0 {
            return Err(GatewayError::Configuration(
                "port must be between 1 and 65535".into(),
            ));
        }

        Ok(Self {
            host,
            port,
            username,
            auth,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn auth(&self) -> &AuthMethod {
        &self.auth
    }

    /// Cache identity for this descriptor. Credentials are not part of it.
    pub fn key(&self) -> SessionKey {
        SessionKey {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
        }
    }
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Resolves a [`ConnectionDescriptor`] from a key/value configuration source.
///
/// The source is any `Fn(&str) -> Option<String>`; [`CredentialResolver::from_env`]
/// reads the process environment.
pub struct CredentialResolver<F> {
    lookup: F,
}

impl CredentialResolver<fn(&str) -> Option<String>> {
    pub fn from_env() -> Self {
        Self { lookup: env_lookup }
    }
}

impl<F> CredentialResolver<F>
where
    F: Fn(&str) -> Option<String>,
{
    pub fn new(lookup: F) -> Self {
        Self { lookup }
    }

    /// Empty values count as absent.
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|value| !value.trim().is_empty())
    }

    fn require(&self, name: &str) -> Result<String, GatewayError> {
        self.get(name)
            .ok_or_else(|| GatewayError::Configuration(format!("{} is required", name)))
    }

    /// Build the descriptor. Reads one local file when key authentication is
    /// configured.
    pub fn resolve(&self) -> Result<ConnectionDescriptor, GatewayError> {
        let host = self.require(HOST_ENV_VAR)?;
        let username = self.require(USERNAME_ENV_VAR)?;
        let port = parse_port(self.get(PORT_ENV_VAR).as_deref());

        let auth = match (self.get(PASSWORD_ENV_VAR), self.get(PRIVATE_KEY_PATH_ENV_VAR)) {
            (Some(_), Some(_)) => {
                return Err(GatewayError::Configuration(format!(
                    "{} and {} are mutually exclusive",
                    PASSWORD_ENV_VAR, PRIVATE_KEY_PATH_ENV_VAR
                )));
            }
            (Some(password), None) => AuthMethod::Password(password),
            (None, Some(key_path)) => AuthMethod::PrivateKey {
                key_material: read_key_file(Path::new(&key_path))?,
                passphrase: self.get(PASSPHRASE_ENV_VAR),
            },
            (None, None) => {
                return Err(GatewayError::Configuration(format!(
                    "either {} or {} must be set",
                    PASSWORD_ENV_VAR, PRIVATE_KEY_PATH_ENV_VAR
                )));
            }
        };

        debug!(
            "Resolved SSH target {}@{}:{} using {} authentication",
            username,
            host,
            port,
            auth.name()
        );

        ConnectionDescriptor::new(host, port, username, auth)
    }
}

fn read_key_file(path: &Path) -> Result<Vec<u8>, GatewayError> {
    std::fs::read(path).map_err(|e| {
        GatewayError::Configuration(format!(
            "Failed to read private key {}: {}",
            path.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn resolver(
        pairs: &[(&str, &str)],
    ) -> CredentialResolver<impl Fn(&str) -> Option<String>> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CredentialResolver::new(move |name: &str| values.get(name).cloned())
    }

    mod resolve {
        use super::*;

        #[test]
        fn test_password_descriptor_with_default_port() {
            let descriptor = resolver(&[
                ("SSH_HOST", "example.com"),
                ("SSH_USERNAME", "deploy"),
                ("SSH_PASSWORD", "secret"),
            ])
            .resolve()
            .unwrap();

            assert_eq!(descriptor.host(), "example.com");
            assert_eq!(descriptor.port(), 22);
            assert_eq!(descriptor.username(), "deploy");
            assert_eq!(descriptor.auth(), &AuthMethod::Password("secret".into()));
        }

        #[test]
        fn test_explicit_and_invalid_ports() {
            let base = [
                ("SSH_HOST", "h"),
                ("SSH_USERNAME", "u"),
                ("SSH_PASSWORD", "p"),
            ];

            let mut pairs = base.to_vec();
            pairs.push(("SSH_PORT", "2222"));
            assert_eq!(resolver(&pairs).resolve().unwrap().port(), 2222);

            let mut pairs = base.to_vec();
            pairs.push(("SSH_PORT", "not-a-port"));
            assert_eq!(resolver(&pairs).resolve().unwrap().port(), 22);
        }

        #[test]
        fn test_missing_host_is_configuration_error() {
            let err = resolver(&[("SSH_USERNAME", "u"), ("SSH_PASSWORD", "p")])
                .resolve()
                .unwrap_err();
            assert!(matches!(err, GatewayError::Configuration(ref m) if m.contains("SSH_HOST")));
        }

        #[test]
        fn test_empty_username_is_configuration_error() {
            let err = resolver(&[
                ("SSH_HOST", "h"),
                ("SSH_USERNAME", "  "),
                ("SSH_PASSWORD", "p"),
            ])
            .resolve()
            .unwrap_err();
            assert!(matches!(err, GatewayError::Configuration(ref m) if m.contains("SSH_USERNAME")));
        }

        #[test]
        fn test_no_credentials_is_configuration_error() {
            let err = resolver(&[("SSH_HOST", "h"), ("SSH_USERNAME", "u")])
                .resolve()
                .unwrap_err();
            assert!(matches!(err, GatewayError::Configuration(_)));
        }

        #[test]
        fn test_password_and_key_are_mutually_exclusive() {
            let err = resolver(&[
                ("SSH_HOST", "h"),
                ("SSH_USERNAME", "u"),
                ("SSH_PASSWORD", "p"),
                ("SSH_PRIVATE_KEY_PATH", "/some/key"),
            ])
            .resolve()
            .unwrap_err();
            assert!(matches!(err, GatewayError::Configuration(ref m) if m.contains("mutually exclusive")));
        }

        #[test]
        fn test_private_key_is_read_from_file() {
            let mut key_file = tempfile::NamedTempFile::new().unwrap();
            key_file.write_all(b"-----BEGIN KEY-----").unwrap();
            let path = key_file.path().to_string_lossy().into_owned();

            let descriptor = resolver(&[
                ("SSH_HOST", "h"),
                ("SSH_USERNAME", "u"),
                ("SSH_PRIVATE_KEY_PATH", path.as_str()),
                ("SSH_PASSPHRASE", "hunter2"),
            ])
            .resolve()
            .unwrap();

            assert_eq!(
                descriptor.auth(),
                &AuthMethod::PrivateKey {
                    key_material: b"-----BEGIN KEY-----".to_vec(),
                    passphrase: Some("hunter2".into()),
                }
            );
        }

        #[test]
        fn test_unreadable_key_is_configuration_error() {
            let err = resolver(&[
                ("SSH_HOST", "h"),
                ("SSH_USERNAME", "u"),
                ("SSH_PRIVATE_KEY_PATH", "/definitely/not/here/id_ed25519"),
            ])
            .resolve()
            .unwrap_err();
            assert!(matches!(err, GatewayError::Configuration(ref m) if m.contains("Failed to read private key")));
        }

        #[test]
        fn test_from_env_reads_process_environment() {
            use crate::mcp::config::tests::{ENV_TEST_MUTEX, remove_env, set_env};

            let _guard = ENV_TEST_MUTEX.lock().unwrap();
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                set_env("SSH_HOST", "env-host");
                set_env("SSH_USERNAME", "env-user");
                set_env("SSH_PASSWORD", "env-pass");
                remove_env("SSH_PORT");
                remove_env("SSH_PRIVATE_KEY_PATH");
            }
            let result = CredentialResolver::from_env().resolve();
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                remove_env("SSH_HOST");
                remove_env("SSH_USERNAME");
                remove_env("SSH_PASSWORD");
            }

            let descriptor = result.unwrap();
            assert_eq!(descriptor.host(), "env-host");
            assert_eq!(descriptor.port(), 22);
        }
    }

    mod identity {
        use super::*;

        #[test]
        fn test_key_ignores_credentials() {
            let a = ConnectionDescriptor::new("h", 22, "u", AuthMethod::Password("one".into()))
                .unwrap();
            let b = ConnectionDescriptor::new(
                "h",
                22,
                "u",
                AuthMethod::PrivateKey {
                    key_material: vec![1, 2, 3],
                    passphrase: None,
                },
            )
            .unwrap();

            assert_ne!(a, b);
            assert_eq!(a.key(), b.key());
        }

        #[test]
        fn test_key_display() {
            let d = ConnectionDescriptor::new("db.internal", 2200, "ops", AuthMethod::Password("x".into()))
                .unwrap();
            assert_eq!(d.key().to_string(), "ops@db.internal:2200");
        }

        #[test]
        fn test_zero_port_rejected() {
            let err = ConnectionDescriptor::new("h", 0, "u", AuthMethod::Password("x".into()))
                .unwrap_err();
            assert!(matches!(err, GatewayError::Configuration(_)));
        }

        #[test]
        fn test_debug_redacts_secrets() {
            let d = ConnectionDescriptor::new(
                "h",
                22,
                "u",
                AuthMethod::PrivateKey {
                    key_material: b"PRIVATE".to_vec(),
                    passphrase: Some("topsecret".into()),
                },
            )
            .unwrap();
            let debug = format!("{:?}", d);
            assert!(!debug.contains("topsecret"));
            assert!(debug.contains("<redacted>"));

            let p = AuthMethod::Password("hunter2".into());
            assert!(!format!("{:?}", p).contains("hunter2"));
        }
    }
}
