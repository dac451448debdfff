//! lgb-line: LINE Gateway for Gemini
//!
//! LINE Messaging API の Webhook を受け取り、ユーザーごとの会話セッションを
//! 管理しながら Gemini へ転送して返信します。

pub mod api;
pub mod bot;
pub mod error;
pub mod handler;
pub mod router;
pub mod session;
pub mod types;
pub mod webhook;

#[cfg(test)]
mod testing;

pub use api::{LineApiClient, MessageBlob, MessagingApi};
pub use bot::LineBot;
pub use error::{LineError, Result};
pub use handler::{EventHandler, HandlerConfig};
pub use router::SessionRouter;
pub use session::{InMemorySessionStore, Session};
