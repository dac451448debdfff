//! Gemini API HTTP Client
//!
//! Supports both the generative-language API and Vertex AI

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::backend::{ConversationBackend, SessionHandle};
use crate::config::{Config, LlmProvider};
use crate::error::{Error, Result};

use super::auth::{GOOGLE_TOKEN_URL, TokenSource};
use super::types::*;

/// How requests are authenticated
enum Auth {
    /// `x-goog-api-key` header
    ApiKey(String),
    /// OAuth bearer token
    Bearer(TokenSource),
}

type History = Arc<Mutex<Vec<Content>>>;

/// Gemini chat client keeping per-session history
pub struct GeminiClient {
    client: Client,
    endpoint: String,
    auth: Auth,
    model: String,
    provider: LlmProvider,
    system_instruction: Option<String>,
    vision_prompt: String,
    histories: DashMap<SessionHandle, History>,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(Error::Http)?;

        let gemini = &config.gemini;

        let (endpoint, auth) = match gemini.provider {
            LlmProvider::Gemini => {
                let base = gemini
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string());
                let endpoint = format!(
                    "{}/models/{}:generateContent",
                    base.trim_end_matches('/'),
                    gemini.model
                );
                (endpoint, Auth::ApiKey(gemini.api_key.clone()))
            }
            LlmProvider::Vertex => {
                let vertex = &config.vertex;
                let credentials = vertex.credentials_path.as_deref().ok_or_else(|| {
                    Error::Config("Vertex credentials path not set".to_string())
                })?;
                let base = gemini.base_url.clone().unwrap_or_else(|| {
                    format!("https://{}-aiplatform.googleapis.com/v1", vertex.location)
                });
                let endpoint = format!(
                    "{}/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
                    base.trim_end_matches('/'),
                    vertex.project_id,
                    vertex.location,
                    gemini.model
                );
                let token_url = vertex.token_url.as_deref().unwrap_or(GOOGLE_TOKEN_URL);
                let source = TokenSource::from_file(client.clone(), credentials, token_url)?;
                (endpoint, Auth::Bearer(source))
            }
        };

        Ok(Self {
            client,
            endpoint,
            auth,
            model: gemini.model.clone(),
            provider: gemini.provider.clone(),
            system_instruction: gemini.system_instruction.clone(),
            vision_prompt: gemini.vision_prompt.clone(),
            histories: DashMap::new(),
        })
    }

    /// Get the model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the provider type
    pub fn provider(&self) -> &LlmProvider {
        &self.provider
    }

    /// Number of live chat sessions
    pub fn session_count(&self) -> usize {
        self.histories.len()
    }

    /// Send a `generateContent` request
    pub async fn generate(&self, request: &GenerateContentRequest) -> Result<GenerateContentResponse> {
        debug!("Sending request to Gemini API: {}", self.endpoint);

        let builder = self.client.post(&self.endpoint).json(request);
        let builder = match &self.auth {
            Auth::ApiKey(key) => builder.header("x-goog-api-key", key),
            Auth::Bearer(source) => builder.bearer_auth(source.access_token().await?),
        };

        let response = builder.send().await.map_err(Error::Http)?;

        let status = response.status();
        let body = response.text().await.map_err(Error::Http)?;

        if !status.is_success() {
            warn!("Gemini API error: {} - {}", status, body);
            return Err(Error::GeminiApi(format!("{}: {}", status, body)));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            Error::GeminiApi(format!("Failed to parse response: {} - {}", e, body))
        })?;

        info!(
            "Gemini API response: candidates={}, tokens={}",
            parsed.candidates.len(),
            parsed
                .usage_metadata
                .as_ref()
                .map(|u| u.total_token_count)
                .unwrap_or(0)
        );

        Ok(parsed)
    }

    fn request(&self, contents: Vec<Content>) -> GenerateContentRequest {
        GenerateContentRequest {
            contents,
            system_instruction: self.system_instruction.as_deref().map(Content::system),
        }
    }
}

/// Extract display text, turning an empty or blocked answer into an error
fn response_text(response: &GenerateContentResponse) -> Result<String> {
    match response.text() {
        Some(text) => Ok(text),
        None => match response.block_reason() {
            Some(reason) => Err(Error::GeminiApi(format!("Prompt blocked: {}", reason))),
            None => Err(Error::GeminiApi("Empty response".to_string())),
        },
    }
}

#[async_trait]
impl ConversationBackend for GeminiClient {
    fn new_session(&self) -> SessionHandle {
        let handle = SessionHandle::generate();
        self.histories
            .insert(handle.clone(), Arc::new(Mutex::new(Vec::new())));
        debug!("Started chat session {}", handle);
        handle
    }

    fn end_session(&self, handle: &SessionHandle) {
        if self.histories.remove(handle).is_some() {
            debug!("Ended chat session {}", handle);
        }
    }

    async fn send(&self, handle: &SessionHandle, text: &str) -> Result<String> {
        let history = self
            .histories
            .get(handle)
            .map(|h| Arc::clone(h.value()))
            .ok_or_else(|| Error::SessionNotFound(handle.to_string()))?;

        // Turns on one session are strictly sequential
        let mut history = history.lock().await;

        let user_turn = Content::user(text);
        let mut contents = history.clone();
        contents.push(user_turn.clone());

        let response = self.generate(&self.request(contents)).await?;
        let reply = response_text(&response)?;

        let model_turn = response.first_content().cloned().unwrap_or(Content {
            role: Some(ROLE_MODEL.to_string()),
            parts: vec![Part::text(reply.clone())],
        });
        history.push(user_turn);
        history.push(model_turn);

        Ok(reply)
    }

    async fn describe_image(&self, data: &[u8], mime_type: &str) -> Result<String> {
        let contents = vec![Content::user_with_image(&self.vision_prompt, data, mime_type)];
        let response = self.generate(&self.request(contents)).await?;
        response_text(&response)
    }
}
