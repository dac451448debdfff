//! lgb-core: LINE Gemini Bridge Core Library
//!
//! Gemini / Vertex AI との通信、設定、トピックフィルタ、
//! 会話バックエンドの抽象化を提供します。

pub mod backend;
pub mod config;
pub mod error;
pub mod llm;
pub mod topic;

pub use backend::{ConversationBackend, SessionHandle};
pub use config::{
    Config, GeminiConfig, IdentityPolicy, LineConfig, LlmProvider, ReplyMessages, RouterConfig,
    ServerConfig, VertexConfig,
};
pub use error::{Error, Result};
pub use llm::GeminiClient;
pub use topic::TopicFilter;
