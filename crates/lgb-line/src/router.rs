//! Session router
//!
//! Resolves the user's session, interprets the in-band commands, applies the
//! topic filter and forwards everything else to the AI backend.

use std::sync::Arc;

use tracing::{debug, error, info};

use lgb_core::{ConversationBackend, RouterConfig};

use crate::session::{InMemorySessionStore, Session};

/// Routes user text to per-user backend conversations
pub struct SessionRouter {
    store: InMemorySessionStore,
    backend: Arc<dyn ConversationBackend>,
    config: RouterConfig,
}

impl SessionRouter {
    /// Create a new router owning its session store
    pub fn new(backend: Arc<dyn ConversationBackend>, config: RouterConfig) -> Self {
        Self {
            store: InMemorySessionStore::new(Arc::clone(&backend)),
            backend,
            config,
        }
    }

    /// Current session of a user, if one exists
    pub fn session(&self, user_id: &str) -> Option<Session> {
        self.store.get(user_id)
    }

    /// Number of live sessions
    pub fn session_count(&self) -> usize {
        self.store.len()
    }

    /// Handle one text message and produce the reply text.
    ///
    /// Never fails: backend errors are logged and replaced by the apology.
    pub async fn handle_message(&self, user_id: &str, text: &str) -> String {
        let messages = &self.config.messages;

        if text == self.config.reset_command {
            self.store.reset(user_id);
            return messages.greeting.clone();
        }

        if let Some(rest) = text.strip_prefix(self.config.prompt_command.as_str()) {
            let prompt = rest.trim();
            let prompt = (!prompt.is_empty()).then(|| prompt.to_string());
            info!(
                "Prompt override for {}: {}",
                user_id,
                prompt.as_deref().unwrap_or("<cleared>")
            );
            self.store.set_prompt(user_id, prompt);
            return messages.prompt_saved.clone();
        }

        if !self.config.topic.matches(text) {
            debug!("Off-topic message from {}", user_id);
            return messages.off_topic.clone();
        }

        let session = self.store.get_or_create(user_id);
        let outgoing = session.compose(text);

        match self.backend.send(&session.handle, &outgoing).await {
            Ok(reply) => {
                self.store.record_exchange(user_id, &session.handle);
                reply
            }
            Err(e) => {
                error!("Backend error for {}: {}", user_id, e);
                messages.apology.clone()
            }
        }
    }
}
