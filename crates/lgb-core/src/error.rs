//! Error types for lgb-core

use thiserror::Error;

/// Main error type for lgb-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Gemini API error: {0}")]
    GeminiApi(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for lgb-core
pub type Result<T> = std::result::Result<T, Error>;
