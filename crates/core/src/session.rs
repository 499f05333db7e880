//! Scoped sessions: isolated sub-conversations that always get torn down.
//!
//! Some tool calls need to run a short exchange with another agent without
//! touching the caller's conversation. [`with_scoped_session`] creates a
//! session, hands it to the closure, and deletes it afterwards whether the
//! closure succeeded, failed, or was cancelled mid-flight.

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use crate::error::SessionError;
use crate::message::{Message, SessionId};

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self) -> std::result::Result<SessionId, SessionError>;

    async fn append(&self, id: &SessionId, message: Message) -> std::result::Result<(), SessionError>;

    async fn messages(&self, id: &SessionId) -> std::result::Result<Vec<Message>, SessionError>;

    async fn delete(&self, id: &SessionId) -> std::result::Result<(), SessionError>;
}

/// Process-local session store.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Vec<Message>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self) -> std::result::Result<SessionId, SessionError> {
        let id = SessionId::new();
        self.sessions.write().await.insert(id.clone(), Vec::new());
        Ok(id)
    }

    async fn append(&self, id: &SessionId, message: Message) -> std::result::Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let messages = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        messages.push(message);
        Ok(())
    }

    async fn messages(&self, id: &SessionId) -> std::result::Result<Vec<Message>, SessionError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &SessionId) -> std::result::Result<(), SessionError> {
        self.sessions
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }
}

/// Deletes the session on drop unless disarmed. Covers cancellation, where
/// the closure's future is dropped before the explicit delete runs.
struct TeardownGuard {
    store: Option<Arc<dyn SessionStore>>,
    id: SessionId,
}

impl TeardownGuard {
    fn disarm(&mut self) -> Option<Arc<dyn SessionStore>> {
        self.store.take()
    }
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        let Some(store) = self.store.take() else {
            return;
        };
        let id = self.id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = store.delete(&id).await {
                        warn!(session_id = %id, error = %e, "Deferred session teardown failed");
                    }
                });
            }
            Err(_) => warn!(session_id = %self.id, "No runtime available, scoped session leaked"),
        }
    }
}

/// Run `f` inside a fresh session that is deleted afterwards.
///
/// Teardown failures are logged and never mask the closure's own result.
pub async fn with_scoped_session<F, Fut, T, E>(store: Arc<dyn SessionStore>, f: F) -> std::result::Result<T, E>
where
    F: FnOnce(SessionId) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: From<SessionError>,
{
    let id = store.create().await?;
    debug!(session_id = %id, "Opened scoped session");

    let mut guard = TeardownGuard {
        store: Some(Arc::clone(&store)),
        id: id.clone(),
    };
    let result = f(id.clone()).await;

    if let Some(store) = guard.disarm() {
        match store.delete(&id).await {
            Ok(()) => debug!(session_id = %id, "Closed scoped session"),
            Err(e) => warn!(session_id = %id, error = %e, "Scoped session teardown failed"),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("session: {0}")]
        Session(#[from] SessionError),
        #[error("closure failed")]
        Closure,
    }

    #[tokio::test]
    async fn session_is_deleted_after_success() {
        let store = Arc::new(InMemorySessionStore::new());
        let dyn_store: Arc<dyn SessionStore> = store.clone();

        let inner = Arc::clone(&dyn_store);
        let out: Result<usize, TestError> = with_scoped_session(dyn_store, |id| async move {
            inner.append(&id, Message::user("sub-question")).await?;
            Ok(inner.messages(&id).await?.len())
        })
        .await;

        assert_eq!(out.unwrap(), 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn session_is_deleted_after_failure() {
        let store = Arc::new(InMemorySessionStore::new());
        let out: Result<(), TestError> =
            with_scoped_session(store.clone(), |_id| async { Err(TestError::Closure) }).await;

        assert!(matches!(out, Err(TestError::Closure)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn session_is_deleted_after_cancellation() {
        let store = Arc::new(InMemorySessionStore::new());
        let scoped = with_scoped_session(store.clone(), |_id| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, TestError>(())
        });

        let timed_out = tokio::time::timeout(Duration::from_millis(10), scoped).await;
        assert!(timed_out.is_err());

        // Let the spawned teardown run.
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn append_to_unknown_session_fails() {
        let store = InMemorySessionStore::new();
        let err = store.append(&SessionId::new(), Message::user("x")).await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }
}
