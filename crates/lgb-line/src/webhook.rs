//! Webhook server for LINE Bot
//!
//! Handles incoming webhooks from LINE Messaging API

use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::error::{LineError, Result};
use crate::handler::EventHandler;
use crate::types::WebhookBody;

type HmacSha256 = Hmac<Sha256>;

/// Signature header set by the LINE platform
pub const SIGNATURE_HEADER: &str = "x-line-signature";

/// Webhook server state
#[derive(Clone)]
pub struct WebhookState {
    pub channel_secret: String,
    pub handler: Arc<EventHandler>,
}

/// Create webhook router
pub fn create_webhook_router(state: WebhookState, path: &str) -> Router {
    Router::new()
        .route(path, post(handle_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Handle incoming webhook
async fn handle_webhook(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        warn!("Missing {} header", SIGNATURE_HEADER);
        return StatusCode::BAD_REQUEST;
    };

    if let Err(e) = verify_signature(&state.channel_secret, &body, signature) {
        warn!("Rejecting webhook: {}", e);
        return StatusCode::BAD_REQUEST;
    }

    let webhook: WebhookBody = match serde_json::from_slice(&body) {
        Ok(webhook) => webhook,
        Err(e) => {
            error!("Failed to parse webhook body: {:?}", e);
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    debug!(
        "Received {} event(s) for destination: {}",
        webhook.events.len(),
        webhook.destination
    );

    for event in &webhook.events {
        debug!("Got {} event", event.kind());
        if let Err(e) = state.handler.process_event(event).await {
            error!("Error processing {} event: {}", event.kind(), e);
            // Continue processing other events
        }
    }

    StatusCode::OK
}

/// Verify LINE signature: base64(HMAC-SHA256(channel_secret, body))
pub fn verify_signature(channel_secret: &str, body: &[u8], signature: &str) -> Result<()> {
    let expected = STANDARD
        .decode(signature)
        .map_err(|_| LineError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes())
        .map_err(|_| LineError::InvalidSignature)?;
    mac.update(body);

    mac.verify_slice(&expected)
        .map_err(|_| LineError::InvalidSignature)
}
