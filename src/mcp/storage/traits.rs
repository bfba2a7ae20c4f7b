//! Storage trait definitions for the session cache.

use std::sync::Arc;

use crate::mcp::credentials::SessionKey;
use crate::mcp::session::RemoteSession;

/// Mapping from session identity to a live session.
///
/// Implementations must be thread-safe (`Send + Sync`). Reads and inserts
/// against distinct keys may run concurrently; callers serialize first-time
/// inserts for the same key themselves.
pub trait SessionCache: Send + Sync {
    fn get(&self, key: &SessionKey) -> Option<Arc<dyn RemoteSession>>;

    /// Insert a session, replacing any previous entry for the key.
    fn put(&self, key: SessionKey, session: Arc<dyn RemoteSession>);

    fn remove(&self, key: &SessionKey) -> Option<Arc<dyn RemoteSession>>;

    /// Snapshot of the cached keys.
    fn keys(&self) -> Vec<SessionKey>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
