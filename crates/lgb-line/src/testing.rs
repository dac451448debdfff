//! Test doubles for the AI backend and the Messaging API

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use lgb_core::{ConversationBackend, SessionHandle};

use crate::api::{MessageBlob, MessagingApi};
use crate::error::{LineError, Result};

/// Backend that echoes what it receives
#[derive(Default)]
pub struct MockBackend {
    created: AtomicUsize,
    ended: Mutex<Vec<SessionHandle>>,
    sent: Mutex<Vec<(SessionHandle, String)>>,
    images: Mutex<Vec<(usize, String)>>,
    fail: AtomicBool,
}

impl MockBackend {
    pub fn failing() -> Self {
        let backend = Self::default();
        backend.fail.store(true, Ordering::SeqCst);
        backend
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn ended(&self) -> Vec<SessionHandle> {
        self.ended.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<(SessionHandle, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, text)| text).collect()
    }

    /// (byte count, mime type) of every image description request
    pub fn images(&self) -> Vec<(usize, String)> {
        self.images.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConversationBackend for MockBackend {
    fn new_session(&self) -> SessionHandle {
        self.created.fetch_add(1, Ordering::SeqCst);
        SessionHandle::generate()
    }

    fn end_session(&self, handle: &SessionHandle) {
        self.ended.lock().unwrap().push(handle.clone());
    }

    async fn send(&self, handle: &SessionHandle, text: &str) -> lgb_core::Result<String> {
        self.sent
            .lock()
            .unwrap()
            .push((handle.clone(), text.to_string()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(lgb_core::Error::GeminiApi("503: overloaded".to_string()));
        }
        Ok(format!("echo: {}", text))
    }

    async fn describe_image(&self, data: &[u8], mime_type: &str) -> lgb_core::Result<String> {
        self.images
            .lock()
            .unwrap()
            .push((data.len(), mime_type.to_string()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(lgb_core::Error::GeminiApi("400: bad image".to_string()));
        }
        Ok(format!("an image of {} bytes", data.len()))
    }
}

/// Messaging API that records replies
#[derive(Default)]
pub struct MockMessagingApi {
    replies: Mutex<Vec<(String, Vec<String>)>>,
    content: Option<Vec<u8>>,
    fail_reply: bool,
}

impl MockMessagingApi {
    pub fn with_content(data: &[u8]) -> Self {
        Self {
            content: Some(data.to_vec()),
            ..Self::default()
        }
    }

    pub fn failing_replies() -> Self {
        Self {
            fail_reply: true,
            ..Self::default()
        }
    }

    pub fn replies(&self) -> Vec<(String, Vec<String>)> {
        self.replies.lock().unwrap().clone()
    }

    /// Every reply flattened to a single text per call
    pub fn reply_texts(&self) -> Vec<String> {
        self.replies().into_iter().map(|(_, t)| t.concat()).collect()
    }
}

#[async_trait]
impl MessagingApi for MockMessagingApi {
    async fn reply(&self, reply_token: &str, texts: &[String]) -> Result<()> {
        self.replies
            .lock()
            .unwrap()
            .push((reply_token.to_string(), texts.to_vec()));
        if self.fail_reply {
            return Err(LineError::ApiError("400: Invalid reply token".to_string()));
        }
        Ok(())
    }

    async fn get_message_content(&self, message_id: &str) -> Result<MessageBlob> {
        match &self.content {
            Some(data) => Ok(MessageBlob {
                data: data.clone(),
                content_type: "image/png".to_string(),
            }),
            None => Err(LineError::ApiError(format!("404: no content for {}", message_id))),
        }
    }
}
