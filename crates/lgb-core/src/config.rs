//! Configuration management
//!
//! 設定は以下の優先順位で読み込まれます:
//! 1. 環境変数
//! 2. line-gemini-bridge.toml 設定ファイル
//! 3. デフォルト値
//!
//! 設定ファイル内では `${VAR_NAME}` 形式で環境変数を展開できます。

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::topic::TopicFilter;

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "line-gemini-bridge.toml";

/// AI backend provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Gemini generative-language API (API key)
    #[default]
    Gemini,
    /// Vertex AI publisher model (OAuth credentials)
    Vertex,
}

impl LlmProvider {
    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "vertex" | "vertexai" | "vertex-ai" => Self::Vertex,
            _ => Self::Gemini,
        }
    }
}

/// Gemini model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// API key (Gemini provider only)
    #[serde(skip_serializing)]
    pub api_key: String,

    /// Model identifier
    pub model: String,

    /// API provider
    pub provider: LlmProvider,

    /// Base URL override (for testing or proxies)
    pub base_url: Option<String>,

    /// Instruction sent along with every image description request
    pub vision_prompt: String,

    /// Optional system instruction applied to every chat session
    pub system_instruction: Option<String>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            provider: LlmProvider::Gemini,
            base_url: None,
            vision_prompt: "Describe this image.".to_string(),
            system_instruction: None,
        }
    }
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

/// Vertex AI configuration (used when `gemini.provider = "vertex"`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VertexConfig {
    /// Google Cloud project id
    pub project_id: String,

    /// Region hosting the model
    pub location: String,

    /// Path to an `authorized_user` credentials file
    pub credentials_path: Option<String>,

    /// OAuth token endpoint override (for testing or proxies)
    pub token_url: Option<String>,
}

impl Default for VertexConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            location: "us-central1".to_string(),
            credentials_path: None,
            token_url: None,
        }
    }
}

/// LINE channel credentials
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LineConfig {
    /// Channel secret used for webhook signatures
    #[serde(skip_serializing)]
    pub channel_secret: String,

    /// Channel access token for the Messaging API
    #[serde(skip_serializing)]
    pub channel_access_token: String,
}

/// Webhook server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen port
    pub port: u16,

    /// Path receiving webhook callbacks
    pub webhook_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            webhook_path: "/callback".to_string(),
        }
    }
}

/// Which identifier an inbound event is keyed by
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdentityPolicy {
    /// The sending user, whatever chat the message came from
    #[default]
    Sender,
    /// The chat itself: group or room id, or the user in 1:1 chats
    Conversation,
}

impl IdentityPolicy {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "sender" | "user" => Some(Self::Sender),
            "conversation" | "chat" => Some(Self::Conversation),
            _ => None,
        }
    }
}

/// Canned replies sent without consulting the AI backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyMessages {
    /// Reply to the reset command
    pub greeting: String,
    /// Reply after a prompt prefix was stored
    pub prompt_saved: String,
    /// Reply to messages rejected by the topic filter
    pub off_topic: String,
    /// Reply when the backend call fails
    pub apology: String,
    /// Prefix of the reply when an image cannot be described; the error follows
    pub image_failure: String,
}

impl Default for ReplyMessages {
    fn default() -> Self {
        Self {
            greeting: "Nice to meet you! What would you like to know?".to_string(),
            prompt_saved: "Got it. I'll keep that in mind from now on.".to_string(),
            off_topic: "Sorry, I can only answer questions related to this topic.".to_string(),
            apology: "Sorry, I couldn't come up with an answer right now. Please try again later."
                .to_string(),
            image_failure: "Unable to recognize the image, please try again: ".to_string(),
        }
    }
}

/// Session router behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Exact text that resets the conversation
    pub reset_command: String,

    /// Prefix that stores the rest of the message as a prompt override
    pub prompt_command: String,

    /// Topic relevance filter
    pub topic: TopicFilter,

    /// Identity extraction policy
    pub identity: IdentityPolicy,

    /// Canned replies
    pub messages: ReplyMessages,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            reset_command: "reset".to_string(),
            prompt_command: "prompt:".to_string(),
            topic: TopicFilter::Disabled,
            identity: IdentityPolicy::Sender,
            messages: ReplyMessages::default(),
        }
    }
}

/// Main configuration for line-gemini-bridge
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub gemini: GeminiConfig,
    pub vertex: VertexConfig,
    pub line: LineConfig,
    pub server: ServerConfig,
    pub router: RouterConfig,
}

impl Config {
    /// 設定ファイルから環境変数を展開する
    ///
    /// `${VAR_NAME}` 形式の文字列を環境変数の値に置換します。
    /// 環境変数が存在しない場合は空文字列になります。
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::with_capacity(value.len());
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next(); // '{' を消費

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// TOML 文字列から設定を読み込む（環境変数の上書きなし）
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let expanded = Self::expand_env_vars(content);
        toml::from_str(&expanded).map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// TOML 設定ファイルから設定を読み込む
    ///
    /// 設定ファイル内の `${VAR_NAME}` は環境変数の値に置換され、
    /// その後、環境変数による上書きが適用されます。
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let mut cfg = Self::from_toml_str(&content)?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        cfg
    }

    /// 設定を読み込む
    ///
    /// 明示的なパスが指定されていればそれを使い、なければ
    /// `./line-gemini-bridge.toml`、それもなければ環境変数のみを使います。
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_toml_file(p),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_toml_file(DEFAULT_CONFIG_FILE)
            }
            None => Ok(Self::from_env()),
        }
    }

    /// 環境変数で設定を上書きする
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(&|name| std::env::var(name).ok());
    }

    /// `lookup` から得た値で設定を上書きする
    ///
    /// 空文字列の値は未設定として扱います。
    fn apply_overrides(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        if let Some(key) = first_of(lookup, &["GOOGLE_GEMINI_API_KEY", "GEMINI_API_KEY"]) {
            self.gemini.api_key = key;
        }
        if let Some(model) = first_of(lookup, &["GEMINI_MODEL"]) {
            self.gemini.model = model;
        }
        if let Some(provider) = first_of(lookup, &["GEMINI_PROVIDER"]) {
            self.gemini.provider = LlmProvider::parse(&provider);
        }
        if let Some(base_url) = first_of(lookup, &["GEMINI_BASE_URL"]) {
            self.gemini.base_url = Some(base_url);
        }

        // Vertex AI
        if let Some(project) = first_of(lookup, &["VERTEX_PROJECT_ID", "GOOGLE_CLOUD_PROJECT"]) {
            self.vertex.project_id = project;
        }
        if let Some(location) = first_of(lookup, &["VERTEX_LOCATION"]) {
            self.vertex.location = location;
        }
        if let Some(path) = first_of(lookup, &["GOOGLE_APPLICATION_CREDENTIALS"]) {
            self.vertex.credentials_path = Some(path);
        }

        // LINE
        if let Some(secret) = first_of(lookup, &["ChannelSecret", "LINE_CHANNEL_SECRET"]) {
            self.line.channel_secret = secret;
        }
        if let Some(token) = first_of(lookup, &["ChannelAccessToken", "LINE_CHANNEL_ACCESS_TOKEN"]) {
            self.line.channel_access_token = token;
        }

        // Server
        if let Some(port) = first_of(lookup, &["PORT"]) {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(_) => tracing::warn!("Ignoring invalid PORT value: {}", port),
            }
        }
        if let Some(path) = first_of(lookup, &["WEBHOOK_PATH"]) {
            self.server.webhook_path = path;
        }

        // Router
        if let Some(list) = first_of(lookup, &["TOPIC_KEYWORDS"]) {
            self.router.topic = TopicFilter::from_keyword_list(&list);
        }
        if let Some(policy) = first_of(lookup, &["IDENTITY_POLICY"]) {
            match IdentityPolicy::parse(&policy) {
                Some(p) => self.router.identity = p,
                None => tracing::warn!("Ignoring unknown IDENTITY_POLICY: {}", policy),
            }
        }
    }

    /// 起動に必要な設定が揃っているか検証する
    pub fn validate(&self) -> Result<()> {
        if self.line.channel_secret.is_empty() {
            return Err(Error::Config("LINE channel secret not set (ChannelSecret)".to_string()));
        }
        if self.line.channel_access_token.is_empty() {
            return Err(Error::Config(
                "LINE channel access token not set (ChannelAccessToken)".to_string(),
            ));
        }

        match self.gemini.provider {
            LlmProvider::Gemini => {
                if self.gemini.api_key.is_empty() {
                    return Err(Error::Config(
                        "Gemini API key not set (GOOGLE_GEMINI_API_KEY)".to_string(),
                    ));
                }
            }
            LlmProvider::Vertex => {
                if self.vertex.project_id.is_empty() {
                    return Err(Error::Config("Vertex project id not set".to_string()));
                }
                if self.vertex.credentials_path.is_none() {
                    return Err(Error::Config(
                        "Vertex credentials path not set (GOOGLE_APPLICATION_CREDENTIALS)"
                            .to_string(),
                    ));
                }
            }
        }

        if self.gemini.model.is_empty() {
            return Err(Error::Config("Model identifier must not be empty".to_string()));
        }
        if !self.server.webhook_path.starts_with('/') {
            return Err(Error::Config(format!(
                "Webhook path must start with '/': {}",
                self.server.webhook_path
            )));
        }
        if self.router.reset_command.is_empty() || self.router.prompt_command.is_empty() {
            return Err(Error::Config("Router commands must not be empty".to_string()));
        }

        Ok(())
    }
}

/// Return the first non-empty value among `names`
fn first_of(lookup: &dyn Fn(&str) -> Option<String>, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| lookup(name))
        .find(|value| !value.is_empty())
}
