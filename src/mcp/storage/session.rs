//! DashMap-based session cache implementation.

use std::sync::Arc;

use dashmap::DashMap;

use crate::mcp::credentials::SessionKey;
use crate::mcp::session::RemoteSession;

use super::traits::SessionCache;

/// Lock-free session cache with process-lifetime entries and no expiry.
#[derive(Default)]
pub struct DashMapSessionCache {
    sessions: DashMap<SessionKey, Arc<dyn RemoteSession>>,
}

impl DashMapSessionCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionCache for DashMapSessionCache {
    fn get(&self, key: &SessionKey) -> Option<Arc<dyn RemoteSession>> {
        self.sessions.get(key).map(|entry| entry.value().clone())
    }

    fn put(&self, key: SessionKey, session: Arc<dyn RemoteSession>) {
        self.sessions.insert(key, session);
    }

    fn remove(&self, key: &SessionKey) -> Option<Arc<dyn RemoteSession>> {
        self.sessions.remove(key).map(|(_, session)| session)
    }

    fn keys(&self) -> Vec<SessionKey> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }
}
