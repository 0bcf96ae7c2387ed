// ── Dialogue: Session Store ──────────────────────────────────────────────────
//
// Per-user sessions behind a lock-per-key interface. The controller holds a
// user's lock for the whole turn, so overlapping turns from one user run one
// after the other while different users never block each other.

use super::state::UserSession;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Exclusive access to one user's session. Dropping it releases the user.
pub type SessionGuard = tokio::sync::OwnedMutexGuard<UserSession>;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Lock the user's session, creating an empty one on first contact.
    async fn lock(&self, user_id: &str) -> SessionGuard;

    /// Snapshot of the user's session (empty if never seen).
    async fn get(&self, user_id: &str) -> UserSession {
        self.lock(user_id).await.clone()
    }

    /// Replace the user's session.
    async fn put(&self, user_id: &str, session: UserSession) {
        *self.lock(user_id).await = session;
    }
}

/// Process-local sessions. The outer map lock is held only long enough to
/// find or insert a user's slot.
#[derive(Default)]
pub struct InMemorySessions {
    slots: Mutex<HashMap<String, Arc<tokio::sync::Mutex<UserSession>>>>,
}

impl InMemorySessions {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, user_id: &str) -> Arc<tokio::sync::Mutex<UserSession>> {
        self.slots
            .lock()
            .entry(user_id.to_string())
            .or_default()
            .clone()
    }

    /// Number of users seen so far.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessions {
    async fn lock(&self, user_id: &str) -> SessionGuard {
        self.slot(user_id).lock_owned().await
    }
}
