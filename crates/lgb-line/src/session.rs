//! In-memory session management for LINE users
//!
//! Thread-safe session storage using DashMap. Every mutation runs under the
//! shard lock of its key, so concurrent messages from one user never lose
//! updates.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, info};

use lgb_core::{ConversationBackend, SessionHandle};

/// One user's conversation
#[derive(Debug, Clone)]
pub struct Session {
    /// Session key (user, group or room id)
    pub user_id: String,
    /// Backend conversation handle
    pub handle: SessionHandle,
    /// Text prepended to every forwarded message
    pub prompt_prefix: Option<String>,
    /// Number of successful backend exchanges
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    fn new(user_id: &str, handle: SessionHandle) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.to_string(),
            handle,
            prompt_prefix: None,
            message_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply the prompt prefix, if any, to outgoing text
    pub fn compose(&self, text: &str) -> String {
        match &self.prompt_prefix {
            Some(prefix) => format!("{} {}", prefix, text),
            None => text.to_string(),
        }
    }
}

/// In-memory session store for LINE chats
pub struct InMemorySessionStore {
    sessions: DashMap<String, Session>,
    backend: Arc<dyn ConversationBackend>,
}

impl InMemorySessionStore {
    /// Create a new session store backed by `backend`
    pub fn new(backend: Arc<dyn ConversationBackend>) -> Self {
        Self {
            sessions: DashMap::new(),
            backend,
        }
    }

    /// Get or create the session for a user
    pub fn get_or_create(&self, user_id: &str) -> Session {
        self.sessions
            .entry(user_id.to_string())
            .or_insert_with(|| {
                info!("Creating session for user: {}", user_id);
                Session::new(user_id, self.backend.new_session())
            })
            .clone()
    }

    /// Get a session if it exists
    pub fn get(&self, user_id: &str) -> Option<Session> {
        self.sessions.get(user_id).map(|s| s.clone())
    }

    /// Replace the user's session with a fresh one.
    ///
    /// The previous backend conversation, if any, is released.
    pub fn reset(&self, user_id: &str) -> Session {
        let fresh = Session::new(user_id, self.backend.new_session());

        if let Some(old) = self.sessions.insert(user_id.to_string(), fresh.clone()) {
            self.backend.end_session(&old.handle);
            info!("Reset session for user: {}", user_id);
        } else {
            info!("Creating session for user: {}", user_id);
        }

        fresh
    }

    /// Set or clear the prompt prefix, creating the session if needed
    pub fn set_prompt(&self, user_id: &str, prompt: Option<String>) -> Session {
        let mut entry = self
            .sessions
            .entry(user_id.to_string())
            .or_insert_with(|| Session::new(user_id, self.backend.new_session()));

        entry.prompt_prefix = prompt;
        entry.updated_at = Utc::now();
        entry.clone()
    }

    /// Count a completed exchange on `handle`.
    ///
    /// Ignored when the session was replaced while the backend call was in
    /// flight.
    pub fn record_exchange(&self, user_id: &str, handle: &SessionHandle) {
        if let Some(mut session) = self.sessions.get_mut(user_id) {
            if &session.handle == handle {
                session.message_count += 1;
                session.updated_at = Utc::now();
            } else {
                debug!("Session for {} was replaced mid-exchange", user_id);
            }
        }
    }

    /// Get session count
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
