//! LINE Messaging API client
//!
//! Communicates with LINE Messaging API

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error};

use crate::error::{LineError, Result};
use crate::types::*;

/// LINE accepts at most this many messages per reply call
pub const MAX_MESSAGES_PER_REPLY: usize = 5;

/// Binary message content downloaded from LINE
#[derive(Debug, Clone)]
pub struct MessageBlob {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// The parts of the Messaging API the event handler needs
#[async_trait]
pub trait MessagingApi: Send + Sync {
    /// Reply to one inbound event. The reply token is single use.
    async fn reply(&self, reply_token: &str, texts: &[String]) -> Result<()>;

    /// Download the binary content of a message (image, video, ...)
    async fn get_message_content(&self, message_id: &str) -> Result<MessageBlob>;
}

/// LINE Messaging API client
#[derive(Clone)]
pub struct LineApiClient {
    client: Client,
    channel_access_token: String,
    base_url: String,
    data_base_url: String,
}

impl LineApiClient {
    /// Create a new LINE API client
    pub fn new(channel_access_token: &str) -> Result<Self> {
        Self::with_base_urls(
            channel_access_token,
            "https://api.line.me/v2",
            "https://api-data.line.me/v2",
        )
    }

    /// Create with custom endpoints (for testing)
    pub fn with_base_urls(
        channel_access_token: &str,
        base_url: &str,
        data_base_url: &str,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(LineError::HttpError)?;

        Ok(Self {
            client,
            channel_access_token: channel_access_token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            data_base_url: data_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Add authorization header
    fn add_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.bearer_auth(&self.channel_access_token)
    }

    /// Turn a non-success response into an API error
    async fn check_status(response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<LineApiError>(&error_text)
            .ok()
            .and_then(|e| e.message)
            .unwrap_or(error_text);
        error!("{} failed: {} - {}", action, status, detail);
        Err(LineError::ApiError(format!("{}: {}", status, detail)))
    }
}

#[async_trait]
impl MessagingApi for LineApiClient {
    async fn reply(&self, reply_token: &str, texts: &[String]) -> Result<()> {
        let url = format!("{}/bot/message/reply", self.base_url);

        let body = ReplyMessage {
            reply_token: reply_token.to_string(),
            messages: texts
                .iter()
                .take(MAX_MESSAGES_PER_REPLY)
                .map(|text| OutgoingMessage::Text { text: text.clone() })
                .collect(),
        };

        debug!("Replying with {} message(s)", body.messages.len());

        let response = self
            .add_auth(self.client.post(&url).json(&body))
            .send()
            .await
            .map_err(LineError::HttpError)?;

        Self::check_status(response, "Reply message").await?;
        Ok(())
    }

    async fn get_message_content(&self, message_id: &str) -> Result<MessageBlob> {
        let url = format!("{}/bot/message/{}/content", self.data_base_url, message_id);

        debug!("Fetching content for message: {}", message_id);

        let response = self
            .add_auth(self.client.get(&url))
            .send()
            .await
            .map_err(LineError::HttpError)?;

        let response = Self::check_status(response, "Get message content").await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<mime::Mime>().ok())
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| mime::IMAGE_JPEG.to_string());

        let data = response.bytes().await.map_err(LineError::HttpError)?;
        debug!("Fetched {} bytes ({})", data.len(), content_type);

        Ok(MessageBlob {
            data: data.to_vec(),
            content_type,
        })
    }
}
