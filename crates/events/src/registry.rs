use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::session::BuildSession;

/// Live build sessions, keyed by storyboard id.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application. A completed session stays resolvable for
/// the retention period so reconnecting clients still get the live path,
/// after which the snapshot path takes over.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<BuildSession>>>,
    retention: Duration,
}

impl SessionRegistry {
    pub fn new(retention: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            retention,
        }
    }

    /// Register a session, replacing any previous one with the same id.
    pub async fn register(&self, session: BuildSession) -> Arc<BuildSession> {
        let session = Arc::new(session);
        let previous = self
            .sessions
            .write()
            .await
            .insert(session.id().to_string(), Arc::clone(&session));
        if let Some(previous) = previous {
            previous.complete();
        }
        tracing::debug!(storyboard_id = %session.id(), "Registered build session");
        session
    }

    pub async fn get(&self, storyboard_id: &str) -> Option<Arc<BuildSession>> {
        self.sessions.read().await.get(storyboard_id).cloned()
    }

    /// Remove `session` if it is still the registered one for its id.
    pub async fn remove(&self, session: &Arc<BuildSession>) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get(session.id()) {
            Some(current) if Arc::ptr_eq(current, session) => {
                sessions.remove(session.id());
                true
            }
            _ => false,
        }
    }

    /// Complete `session` and evict it once the retention period elapses.
    pub fn finish(self: &Arc<Self>, session: Arc<BuildSession>) {
        session.complete();
        let registry = Arc::clone(self);
        let retention = self.retention;
        tokio::spawn(async move {
            tokio::time::sleep(retention).await;
            if registry.remove(&session).await {
                tracing::debug!(storyboard_id = %session.id(), "Evicted build session");
            }
        });
    }

    /// Return the current number of registered sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
