//! LINE Bot implementation
//!
//! Main entry point for the LINE Gateway

use std::sync::Arc;

use tracing::info;

use lgb_core::{Config, ConversationBackend, GeminiClient};

use crate::api::{LineApiClient, MessagingApi};
use crate::error::{LineError, Result};
use crate::handler::{EventHandler, HandlerConfig};
use crate::router::SessionRouter;
use crate::webhook::{WebhookState, create_webhook_router};

/// LINE Bot bridging to Gemini
pub struct LineBot {
    config: Config,
    handler: Arc<EventHandler>,
}

impl LineBot {
    /// Create a new LINE bot with the Gemini backend and LINE API client
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let backend: Arc<dyn ConversationBackend> = Arc::new(GeminiClient::new(&config)?);
        let api: Arc<dyn MessagingApi> =
            Arc::new(LineApiClient::new(&config.line.channel_access_token)?);

        info!(
            "Using {:?} backend with model {}",
            config.gemini.provider, config.gemini.model
        );

        Self::with_components(config, backend, api)
    }

    /// Create with explicit backend and messaging components
    pub fn with_components(
        config: Config,
        backend: Arc<dyn ConversationBackend>,
        api: Arc<dyn MessagingApi>,
    ) -> Result<Self> {
        if config.line.channel_secret.is_empty() {
            return Err(LineError::Config("Channel secret not configured".to_string()));
        }

        let router = SessionRouter::new(Arc::clone(&backend), config.router.clone());
        let handler_config = HandlerConfig::from_router_config(&config.router);
        let handler = Arc::new(EventHandler::new(api, backend, router, handler_config));

        Ok(Self { config, handler })
    }

    /// Get the event handler
    pub fn handler(&self) -> Arc<EventHandler> {
        Arc::clone(&self.handler)
    }

    /// Build the webhook router without binding a socket
    pub fn router(&self) -> axum::Router {
        let state = WebhookState {
            channel_secret: self.config.line.channel_secret.clone(),
            handler: self.handler(),
        };
        create_webhook_router(state, &self.config.server.webhook_path)
    }

    /// Run the bot with shutdown signal
    pub async fn run(&self, mut shutdown: tokio::sync::broadcast::Receiver<()>) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.config.server.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| LineError::Webhook(e.to_string()))?;

        info!(
            "LINE webhook server listening on {}{}",
            addr, self.config.server.webhook_path
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                info!("LINE bot shutting down");
            })
            .await
            .map_err(|e| LineError::Webhook(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBackend, MockMessagingApi};

    fn create_test_config() -> Config {
        let mut config = Config::default();
        config.gemini.api_key = "test-key".to_string();
        config.line.channel_secret = "secret".to_string();
        config.line.channel_access_token = "token".to_string();
        config
    }

    #[test]
    fn test_bot_creation_fails_without_credentials() {
        let result = LineBot::new(Config::default());
        assert!(matches!(result, Err(LineError::Core(lgb_core::Error::Config(_)))));
    }

    #[test]
    fn test_bot_creation() {
        assert!(LineBot::new(create_test_config()).is_ok());
    }

    #[test]
    fn test_with_components_requires_secret() {
        let mut config = create_test_config();
        config.line.channel_secret.clear();

        let result = LineBot::with_components(
            config,
            Arc::new(MockBackend::default()),
            Arc::new(MockMessagingApi::default()),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_signal_stops_server() {
        let mut config = create_test_config();
        config.server.port = 0;

        let bot = LineBot::with_components(
            config,
            Arc::new(MockBackend::default()),
            Arc::new(MockMessagingApi::default()),
        )
        .unwrap();

        let (tx, rx) = tokio::sync::broadcast::channel(1);
        let server = tokio::spawn(async move { bot.run(rx).await });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        tx.send(()).unwrap();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
