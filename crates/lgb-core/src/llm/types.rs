//! Gemini `generateContent` wire types
//!
//! The generative-language API and Vertex AI share this schema.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

/// Role of the user turn
pub const ROLE_USER: &str = "user";
/// Role of the model turn
pub const ROLE_MODEL: &str = "model";

/// One turn of a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// Create a user turn with text
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Some(ROLE_USER.to_string()),
            parts: vec![Part::text(text)],
        }
    }

    /// Create a user turn with an instruction and inline image data
    pub fn user_with_image(text: impl Into<String>, data: &[u8], mime_type: &str) -> Self {
        Self {
            role: Some(ROLE_USER.to_string()),
            parts: vec![Part::text(text), Part::inline(data, mime_type)],
        }
    }

    /// Create a system instruction (no role)
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
        }
    }

    /// Concatenated text of all text parts
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .concat()
    }
}

/// A single part of a turn: text or inline binary data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    /// Inline data part, base64 encoded
    pub fn inline(data: &[u8], mime_type: &str) -> Self {
        Self {
            text: None,
            inline_data: Some(Blob {
                mime_type: mime_type.to_string(),
                data: STANDARD.encode(data),
            }),
        }
    }
}

/// Base64 encoded binary payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

/// Request body for `generateContent`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
}

/// Response body of `generateContent`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
}

impl GenerateContentResponse {
    /// Display text: every text part of every candidate, in order.
    ///
    /// Returns `None` when the response carries no text at all.
    pub fn text(&self) -> Option<String> {
        let text = self
            .candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .map(Content::text)
            .collect::<Vec<_>>()
            .concat();

        if text.is_empty() { None } else { Some(text) }
    }

    /// Content of the first candidate, to be appended to the chat history
    pub fn first_content(&self) -> Option<&Content> {
        self.candidates.first().and_then(|c| c.content.as_ref())
    }

    /// Reason the prompt was blocked, if any
    pub fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
    #[serde(default)]
    pub total_token_count: u32,
}
