//! Gemini API client and types
//!
//! Supports both the generative-language API (API key) and Vertex AI (OAuth)

mod auth;
mod client;
mod types;

pub use auth::{AuthorizedUser, GOOGLE_TOKEN_URL, TokenSource};
pub use client::GeminiClient;
pub use types::*;
