//! The authentication step of session establishment.

use async_trait::async_trait;
use russh::client;

use crate::mcp::session::SshClientHandler;

/// One way of proving identity on a freshly handshaken connection.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// `Ok(false)` when the server rejects the credentials; `Err` when the
    /// attempt itself could not be made (undecodable key, transport failure).
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, String>;

    /// Short name used in logs and in the rejection message.
    fn name(&self) -> &'static str;
}
