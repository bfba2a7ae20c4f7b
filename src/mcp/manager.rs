//! Session acquisition.
//!
//! [`SessionManager::acquire`] is the only way operations obtain a session. It
//! combines the [`SessionCache`] with the [`SessionFactory`] and guarantees at
//! most one `open` per [`SessionKey`] at a time:
//!
//! 1. **Fast path**: a cached session whose transport is still up is returned
//!    without locking.
//! 2. **Guarded open**: otherwise the caller takes the per-key in-flight guard,
//!    re-checks the cache (another caller may have finished opening), discards
//!    a dead entry, and opens a new session.
//!
//! Failed opens leave no cache entry, so the next call tries again.
//!
//! The key ignores credentials. A second descriptor with the same
//! `(host, port, username)` but different credentials reuses the session
//! opened for the first one.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::credentials::{ConnectionDescriptor, SessionKey};
use super::error::GatewayError;
use super::session::{RemoteSession, SessionFactory};
use super::storage::SessionCache;

/// Owns the session cache and serializes session establishment per key.
pub struct SessionManager {
    cache: Arc<dyn SessionCache>,
    factory: Arc<dyn SessionFactory>,
    in_flight: DashMap<SessionKey, Arc<Mutex<()>>>,
}

impl SessionManager {
    pub fn new(cache: Arc<dyn SessionCache>, factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            cache,
            factory,
            in_flight: DashMap::new(),
        }
    }

    pub fn cache(&self) -> &Arc<dyn SessionCache> {
        &self.cache
    }

    /// Return the live session for `descriptor`, opening one if needed.
    pub async fn acquire(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Arc<dyn RemoteSession>, GatewayError> {
        let key = descriptor.key();

        if let Some(session) = self.cache.get(&key)
            && !session.is_closed()
        {
            return Ok(session);
        }

        let guard = self.guard_for(&key);
        let _lock = guard.lock().await;

        if let Some(session) = self.cache.get(&key) {
            if !session.is_closed() {
                return Ok(session);
            }
            warn!("Cached session {} is closed, reconnecting", key);
            self.discard(&key).await;
        }

        info!("Opening SSH session {}", key);
        let session = self.factory.open(descriptor).await.map_err(|e| {
            let outlook = if e.may_succeed_later() {
                "a later attempt may succeed"
            } else {
                "retrying will not help"
            };
            error!("Failed to open SSH session {} ({}): {}", key, outlook, e);
            e
        })?;

        self.cache.put(key, session.clone());
        Ok(session)
    }

    /// Drop the cached session for `key` if its transport has gone away.
    ///
    /// Returns whether an entry was evicted.
    pub async fn evict_if_closed(&self, key: &SessionKey) -> bool {
        let guard = self.guard_for(key);
        let _lock = guard.lock().await;

        match self.cache.get(key) {
            Some(session) if session.is_closed() => {
                warn!("Evicting closed session {}", key);
                self.discard(key).await;
                true
            }
            _ => false,
        }
    }

    /// Close every cached session, ignoring close failures.
    pub async fn shutdown(&self) {
        let sessions: Vec<(SessionKey, Arc<dyn RemoteSession>)> = self
            .cache
            .keys()
            .into_iter()
            .filter_map(|key| self.cache.remove(&key).map(|session| (key, session)))
            .collect();

        info!("Closing {} SSH session(s)", sessions.len());
        join_all(sessions.into_iter().map(|(key, session)| async move {
            if let Err(e) = session.close().await {
                warn!("Failed to close session {}: {}", key, e);
            }
        }))
        .await;
    }

    fn guard_for(&self, key: &SessionKey) -> Arc<Mutex<()>> {
        self.in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Caller must hold the guard for `key`.
    async fn discard(&self, key: &SessionKey) {
        if let Some(stale) = self.cache.remove(key)
            && let Err(e) = stale.close().await
        {
            warn!("Failed to close stale session {}: {}", key, e);
        }
    }
}
