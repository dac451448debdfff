//! エラー型定義 (lgb-line)

use thiserror::Error;

/// lgb-line のエラー型
#[derive(Error, Debug)]
pub enum LineError {
    #[error("LINE API error: {0}")]
    ApiError(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Core error: {0}")]
    Core(#[from] lgb_core::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Webhook error: {0}")]
    Webhook(String),
}

/// Result 型エイリアス
pub type Result<T> = std::result::Result<T, LineError>;
