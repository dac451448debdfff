//! Conversation backend abstraction
//!
//! The session router only ever talks to the AI through this trait, so the
//! real Gemini client can be swapped for a mock in tests.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Opaque handle to conversational state owned by a backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionHandle(String);

impl SessionHandle {
    /// Create a fresh, globally unique handle
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A chat backend that keeps per-handle conversation state
#[async_trait]
pub trait ConversationBackend: Send + Sync {
    /// Allocate a new, empty conversation.
    ///
    /// Must not block: it is called while the session store holds the
    /// shard lock for the user.
    fn new_session(&self) -> SessionHandle;

    /// Release any state held for `handle`. Unknown handles are ignored.
    fn end_session(&self, handle: &SessionHandle);

    /// Send one user turn and return the model's display text
    async fn send(&self, handle: &SessionHandle, text: &str) -> Result<String>;

    /// Describe an image in text. Stateless, not tied to any session.
    async fn describe_image(&self, data: &[u8], mime_type: &str) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_handles_are_distinct() {
        let a = SessionHandle::generate();
        let b = SessionHandle::generate();
        assert_ne!(a, b);
        assert_eq!(a.to_string(), a.as_str());
    }
}
