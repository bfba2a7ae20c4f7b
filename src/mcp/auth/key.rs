//! Private key SSH authentication.

use std::sync::Arc;

use async_trait::async_trait;
use russh::{client, keys};
use tracing::debug;

use crate::mcp::session::SshClientHandler;

use super::traits::AuthStrategy;

/// Private key authentication strategy.
///
/// Holds the key material read by the credential resolver, so no file access
/// happens during the handshake. Encrypted keys are decrypted with the
/// optional passphrase.
pub struct KeyAuth {
    key_material: Vec<u8>,
    passphrase: Option<String>,
}

impl KeyAuth {
    pub fn new(key_material: Vec<u8>, passphrase: Option<String>) -> Self {
        Self {
            key_material,
            passphrase,
        }
    }

    /// Decode the private key, decrypting it when a passphrase is configured.
    pub(crate) fn decode(&self) -> Result<keys::PrivateKey, String> {
        let text = std::str::from_utf8(&self.key_material)
            .map_err(|_| "Failed to decode private key: key file is not text".to_string())?;

        keys::decode_secret_key(text, self.passphrase.as_deref())
            .map_err(|e| format!("Failed to decode private key: {}", e))
    }
}

#[async_trait]
impl AuthStrategy for KeyAuth {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, String> {
        let key_pair = self.decode()?;

        // For RSA keys, use the best supported hash algorithm
        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();
        debug!("Using RSA hash algorithm for key auth: {:?}", hash_alg);

        let key_with_hash = keys::PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg);

        let result = handle
            .authenticate_publickey(username, key_with_hash)
            .await
            .map_err(|e| format!("Key authentication failed: {}", e))?;

        Ok(result.success())
    }

    fn name(&self) -> &'static str {
        "key"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_auth_name() {
        let auth = KeyAuth::new(Vec::new(), None);
        assert_eq!(auth.name(), "key");
    }

    #[test]
    fn test_non_utf8_key_is_rejected() {
        let auth = KeyAuth::new(vec![0xff, 0xfe, 0x00], None);
        let err = auth.decode().err().expect("decode should fail");
        assert!(err.contains("Failed to decode private key"));
    }

    #[test]
    fn test_garbage_key_is_rejected() {
        let auth = KeyAuth::new(b"not a private key".to_vec(), Some("pass".into()));
        let err = auth.decode().err().expect("decode should fail");
        assert!(err.starts_with("Failed to decode private key"));
    }
}
