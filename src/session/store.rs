use crate::session::SessionId;
use crate::session::SessionState;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::PoisonError;

/// Keeps the conversation state of every session.
pub trait SessionStore: Send + Sync {
    /// Removes and returns the state of `session`.
    fn take(&self, session: SessionId) -> Option<SessionState>;

    fn put(&self, session: SessionId, state: SessionState);

    fn remove(&self, session: SessionId);
}

/// Process-local store; state is lost on restart.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<SessionId, SessionState>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        MemorySessionStore::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemorySessionStore {
    fn take(&self, session: SessionId) -> Option<SessionState> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session)
    }

    fn put(&self, session: SessionId, state: SessionState) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session, state);
    }

    fn remove(&self, session: SessionId) {
        self.take(session);
    }
}
