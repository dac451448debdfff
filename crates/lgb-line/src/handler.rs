//! LINE event handler implementation

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use lgb_core::{ConversationBackend, IdentityPolicy, RouterConfig};

use crate::api::{MAX_MESSAGES_PER_REPLY, MessagingApi};
use crate::error::Result;
use crate::router::SessionRouter;
use crate::types::{Event, MessageContent, Source};

/// Configuration for the event handler
#[derive(Clone, Debug)]
pub struct HandlerConfig {
    /// How the session key is taken from an event source
    pub identity: IdentityPolicy,
    /// Reply prefix when an image cannot be described
    pub image_failure: String,
    /// Maximum message length before splitting
    pub max_message_length: usize,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self::from_router_config(&RouterConfig::default())
    }
}

impl HandlerConfig {
    pub fn from_router_config(config: &RouterConfig) -> Self {
        Self {
            identity: config.identity,
            image_failure: config.messages.image_failure.clone(),
            max_message_length: 5000, // LINE has a 5000 char limit per message
        }
    }
}

/// Event handler for LINE
pub struct EventHandler {
    api: Arc<dyn MessagingApi>,
    backend: Arc<dyn ConversationBackend>,
    router: SessionRouter,
    config: HandlerConfig,
}

impl EventHandler {
    /// Create a new event handler
    pub fn new(
        api: Arc<dyn MessagingApi>,
        backend: Arc<dyn ConversationBackend>,
        router: SessionRouter,
        config: HandlerConfig,
    ) -> Self {
        Self {
            api,
            backend,
            router,
            config,
        }
    }

    /// The session router
    pub fn router(&self) -> &SessionRouter {
        &self.router
    }

    /// Process an incoming event
    pub async fn process_event(&self, event: &Event) -> Result<()> {
        match event {
            Event::Message {
                reply_token,
                source,
                message,
                ..
            } => self.process_message(reply_token, source.as_ref(), message).await,
            Event::Follow { source, .. } => {
                info!("Got followed event from {:?}", source);
                Ok(())
            }
            Event::Postback { postback, .. } => {
                info!("Got postback: {}", postback.data);
                Ok(())
            }
            Event::Beacon { beacon, .. } => {
                info!("Got beacon: {} ({})", beacon.hwid, beacon.beacon_type);
                Ok(())
            }
            Event::Unknown => {
                debug!("Ignoring unsupported event type");
                Ok(())
            }
        }
    }

    async fn process_message(
        &self,
        reply_token: &str,
        source: Option<&Source>,
        message: &MessageContent,
    ) -> Result<()> {
        match message {
            MessageContent::Text { text, .. } => {
                let Some(user_id) = source.and_then(|s| s.identity(self.config.identity)) else {
                    warn!("Dropping text message without identifiable source: {:?}", source);
                    return Ok(());
                };

                info!("Processing message from {}: {}", user_id, text);
                let reply = self.router.handle_message(user_id, text).await;
                self.send_reply(reply_token, &reply).await
            }
            MessageContent::Sticker {
                package_id,
                sticker_id,
                keywords,
                text,
                ..
            } => {
                let reply = sticker_reply(
                    sticker_id,
                    package_id,
                    keywords,
                    text.as_deref().unwrap_or(""),
                );
                self.send_reply(reply_token, &reply).await
            }
            MessageContent::Image { id } => {
                info!("Got image message: {}", id);
                let reply = self.describe_image(id).await;
                self.send_reply(reply_token, &reply).await
            }
            MessageContent::Video { id } => {
                info!("Got video message: {}", id);
                Ok(())
            }
            MessageContent::Unknown => {
                info!("Unknown message type, ignoring");
                Ok(())
            }
        }
    }

    /// Fetch image content and describe it, or explain why that failed
    async fn describe_image(&self, message_id: &str) -> String {
        let blob = match self.api.get_message_content(message_id).await {
            Ok(blob) => blob,
            Err(e) => {
                error!("Failed to fetch content for {}: {}", message_id, e);
                return format!("{}{}", self.config.image_failure, e);
            }
        };

        match self.backend.describe_image(&blob.data, &blob.content_type).await {
            Ok(text) => text,
            Err(e) => {
                error!("Image description failed for {}: {}", message_id, e);
                format!("{}{}", self.config.image_failure, e)
            }
        }
    }

    /// Send a reply, split into as many messages as one reply call allows
    async fn send_reply(&self, reply_token: &str, text: &str) -> Result<()> {
        let mut chunks = split_message(text, self.config.max_message_length);
        if chunks.len() > MAX_MESSAGES_PER_REPLY {
            warn!(
                "Reply needs {} messages, truncating to {}",
                chunks.len(),
                MAX_MESSAGES_PER_REPLY
            );
            chunks.truncate(MAX_MESSAGES_PER_REPLY);
        }

        self.api.reply(reply_token, &chunks).await
    }
}

/// Acknowledgement for a sticker message
pub fn sticker_reply(sticker_id: &str, package_id: &str, keywords: &[String], text: &str) -> String {
    let kw: String = keywords.iter().map(|k| format!(",{}", k)).collect();
    format!(
        "Received sticker: {}, pkg: {} kw: {}  text: {}",
        sticker_id, package_id, kw, text
    )
}

/// Split message at sentence boundaries, at most `max_chars` characters each
fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    const BREAKS: [&str; 5] = ["。", "\n\n", "\n", ". ", " "];

    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut remaining = text;

    loop {
        let Some((limit, _)) = remaining.char_indices().nth(max_chars) else {
            chunks.push(remaining.to_string());
            break;
        };

        let window = &remaining[..limit];
        let break_point = BREAKS
            .iter()
            .find_map(|sep| window.rfind(sep).map(|i| i + sep.len()))
            .unwrap_or(limit);

        chunks.push(remaining[..break_point].to_string());
        remaining = &remaining[break_point..];
    }

    chunks
}
